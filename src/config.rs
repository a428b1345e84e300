use anyhow::{bail, Context, Result};
use config::{Environment, File, FileFormat};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Public Sepolia endpoints used when no config file is present.
pub const DEFAULT_RPC_URLS: &[&str] = &[
    "https://ethereum-sepolia-rpc.publicnode.com",
    "https://sepolia.drpc.org",
    "https://rpc.sepolia.org",
];

pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

/// Prefix for environment overrides, e.g. `TRANSBOT_CHAIN_ID=1`.
const ENV_PREFIX: &str = "TRANSBOT";

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // RPC endpoint URLs, used round-robin
    pub rpc_urls: Vec<String>,
    // Chain id stamped on every transfer
    pub chain_id: u64,
    // Flat file holding one source private key per line
    pub keys_path: PathBuf,
    // Attempts per RPC operation before giving up
    pub retry_attempts: usize,
    // Fixed pause between attempts (seconds)
    pub retry_delay_secs: u64,
    // Pause after a failed transfer before moving on (seconds)
    pub failure_cooldown_secs: u64,
    // Block explorer base URL, e.g. https://sepolia.etherscan.io
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_urls: DEFAULT_RPC_URLS.iter().map(|url| url.to_string()).collect(),
            chain_id: DEFAULT_CHAIN_ID,
            keys_path: PathBuf::from("private_keys.txt"),
            retry_attempts: 3,
            retry_delay_secs: 5,
            failure_cooldown_secs: 30,
            explorer_url: None,
        }
    }
}

impl Config {
    /// Layer the JSON file (if it exists) and `TRANSBOT_*` env vars over the defaults.
    pub fn load(config_path: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(File::new(config_path, FileFormat::Json).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read config from {}", config_path))?
            .try_deserialize()
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = PathBuf::from(config_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config to {}", config_path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_urls.is_empty() {
            bail!("rpc_urls must contain at least one endpoint");
        }
        if self.retry_attempts == 0 {
            bail!("retry_attempts must be at least 1");
        }
        self.endpoints().map(|_| ())
    }

    /// Parsed endpoint list, in configured order.
    pub fn endpoints(&self) -> Result<Vec<Url>> {
        self.rpc_urls
            .iter()
            .map(|raw| Url::parse(raw).with_context(|| format!("Invalid RPC url: {}", raw)))
            .collect()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }

    /// Explorer link for a transaction hash, if an explorer is configured.
    pub fn tx_link(&self, hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), hash))
    }
}

/// A closed numeric range. `min > max` is accepted and treated as the swapped range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn low(&self) -> f64 {
        self.min.min(self.max)
    }

    pub fn high(&self) -> f64 {
        self.min.max(self.max)
    }

    /// Uniform draw over `[low, high]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (low, high) = (self.low(), self.high());
        if low == high {
            return low;
        }
        rng.gen_range(low..=high)
    }
}

/// Per-run transfer settings, collected from flags or prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferParams {
    // Amount range in whole ether
    pub amount: Span,
    // Delay range in minutes
    pub delay: Span,
    pub wallets_per_source: usize,
    pub tx_per_wallet: usize,
}

impl TransferParams {
    pub fn validate(&self) -> Result<()> {
        for (name, span) in [("amount", &self.amount), ("delay", &self.delay)] {
            if !span.min.is_finite() || !span.max.is_finite() {
                bail!("{} range must be finite, got {:?}", name, span);
            }
            if span.low() < 0.0 {
                bail!("{} range must not be negative, got {:?}", name, span);
            }
        }
        Ok(())
    }

    /// Draw a transfer amount in ether.
    pub fn sample_amount<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.amount.sample(rng)
    }

    /// Draw a post-transfer delay.
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        minutes_to_duration(self.delay.sample(rng))
    }
}

pub fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::from_millis((minutes * MS_PER_MINUTE) as u64)
}
