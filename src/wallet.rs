use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Flat-file store of source account private keys, one per line.
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved secrets in file order. A missing file reads as empty.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("Failed to open key file {}", self.path.display()))?;
        read_secrets(std::io::BufReader::new(file))
    }

    pub fn save(&self, secrets: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = open_private(&self.path)
            .with_context(|| format!("Failed to create key file {}", self.path.display()))?;
        for secret in secrets {
            writeln!(file, "{}", secret)?;
        }
        Ok(())
    }

    /// Load saved secrets, or on first run read them from `input` until EOF
    /// and write them out for the next run.
    pub fn load_or_collect<R: BufRead>(&self, input: R) -> Result<Vec<String>> {
        let secrets = self.load()?;
        if !secrets.is_empty() {
            info!("Loaded {} source key(s) from {}", secrets.len(), self.path.display());
            return Ok(secrets);
        }

        println!("No keys found in {}.", self.path.display());
        println!("Paste source private keys, one per line, then press Ctrl-D:");
        let secrets = read_secrets(input)?;
        if secrets.is_empty() {
            bail!("No private keys provided");
        }

        self.save(&secrets)?;
        info!("Saved {} source key(s) to {}", secrets.len(), self.path.display());
        Ok(secrets)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

/// Trimmed, non-blank lines in order.
pub fn read_secrets<R: BufRead>(input: R) -> Result<Vec<String>> {
    let mut secrets = Vec::new();
    for line in input.lines() {
        let line = line.context("Failed to read key input")?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            secrets.push(trimmed.to_string());
        }
    }
    Ok(secrets)
}

/// Parse hex private keys (with or without `0x`). Errors name the 1-based entry.
pub fn parse_signers(secrets: &[String]) -> Result<Vec<PrivateKeySigner>> {
    secrets
        .iter()
        .enumerate()
        .map(|(i, secret)| {
            secret
                .parse::<PrivateKeySigner>()
                .with_context(|| format!("Invalid private key at entry {}", i + 1))
        })
        .collect()
}

/// Fresh random receivers; never persisted.
pub fn generate_receivers(count: usize) -> Vec<Address> {
    (0..count)
        .map(|_| PrivateKeySigner::random().address())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Cursor;

    const KEY_A: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const KEY_B: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

    fn temp_store(name: &str) -> KeyStore {
        let dir = std::env::temp_dir().join(format!("trans-bot-keys-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        KeyStore::new(dir.join("private_keys.txt"))
    }

    #[test]
    fn round_trip_preserves_order_and_drops_blank_lines() {
        let store = temp_store("roundtrip");
        let secrets = vec!["c".to_string(), "a".to_string(), "b".to_string(), "a".to_string()];
        store.save(&secrets).unwrap();

        let mut raw = fs::read_to_string(store.path()).unwrap();
        raw.push_str("\n\n   \n");
        fs::write(store.path(), raw).unwrap();

        assert_eq!(store.load().unwrap(), secrets);
        fs::remove_dir_all(store.path().parent().unwrap()).ok();
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = temp_store("missing");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn first_run_collects_from_input_and_persists() {
        let store = temp_store("collect");
        let input = Cursor::new(format!("  {}\n\n{}\n", KEY_A, KEY_B));

        let secrets = store.load_or_collect(input).unwrap();
        assert_eq!(secrets, vec![KEY_A.to_string(), KEY_B.to_string()]);

        // second run reads the file and ignores input
        let again = store.load_or_collect(Cursor::new("ignored\n")).unwrap();
        assert_eq!(again, secrets);
        fs::remove_dir_all(store.path().parent().unwrap()).ok();
    }

    #[test]
    fn empty_input_on_first_run_is_an_error() {
        let store = temp_store("empty");
        assert!(store.load_or_collect(Cursor::new("\n \n")).is_err());
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let store = temp_store("perms");
        store.save(&[KEY_A.to_string()]).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        fs::remove_dir_all(store.path().parent().unwrap()).ok();
    }

    #[test]
    fn parse_signers_accepts_prefixed_and_bare_hex() {
        let signers = parse_signers(&[KEY_A.to_string(), KEY_B.to_string()]).unwrap();
        assert_eq!(signers.len(), 2);
        assert_ne!(signers[0].address(), signers[1].address());
    }

    #[test]
    fn parse_signers_names_the_bad_entry() {
        let err = parse_signers(&[KEY_A.to_string(), "not-a-key".to_string()]).unwrap_err();
        assert!(err.to_string().contains("entry 2"), "{}", err);
    }

    #[test]
    fn receivers_are_fresh() {
        let receivers = generate_receivers(5);
        let unique: HashSet<_> = receivers.iter().collect();
        assert_eq!(receivers.len(), 5);
        assert_eq!(unique.len(), 5);
        assert!(generate_receivers(0).is_empty());
    }
}
