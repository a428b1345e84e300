use anyhow::{bail, Context, Result};
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::config::{Span, TransferParams};

/// Values supplied on the command line; anything missing is asked for.
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub min_delay: Option<f64>,
    pub max_delay: Option<f64>,
    pub wallets_per_source: Option<usize>,
    pub tx_per_wallet: Option<usize>,
}

/// Line-oriented prompts over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask until the answer parses as `T`. End of input is an error.
    pub fn ask<T>(&mut self, label: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        loop {
            write!(self.output, "{}: ", label)?;
            self.output.flush()?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .context("Failed to read from stdin")?;
            if read == 0 {
                bail!("Input closed while waiting for {}", label);
            }

            match line.trim().parse::<T>() {
                Ok(value) => return Ok(value),
                Err(e) => writeln!(self.output, "  invalid value ({}), try again", e)?,
            }
        }
    }

    fn value_or_ask<T>(&mut self, given: Option<T>, label: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match given {
            Some(value) => Ok(value),
            None => self.ask(label),
        }
    }

    /// Collect run parameters in the fixed prompt order.
    pub fn transfer_params(&mut self, given: &ParamOverrides) -> Result<TransferParams> {
        let min_amount = self.value_or_ask(given.min_amount, "Minimum amount (ETH)")?;
        let max_amount = self.value_or_ask(given.max_amount, "Maximum amount (ETH)")?;
        let min_delay = self.value_or_ask(given.min_delay, "Minimum delay (minutes)")?;
        let max_delay = self.value_or_ask(given.max_delay, "Maximum delay (minutes)")?;
        let wallets_per_source =
            self.value_or_ask(given.wallets_per_source, "Receiver wallets per source")?;
        let tx_per_wallet = self.value_or_ask(given.tx_per_wallet, "Transfers per receiver")?;

        let params = TransferParams {
            amount: Span::new(min_amount, max_amount),
            delay: Span::new(min_delay, max_delay),
            wallets_per_source,
            tx_per_wallet,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompts_in_order() {
        let input = Cursor::new("0.000001\n0.000002\n1\n3\n2\n5\n");
        let mut output = Vec::new();
        let params = Prompter::new(input, &mut output)
            .transfer_params(&ParamOverrides::default())
            .unwrap();

        assert_eq!(params.amount, Span::new(0.000001, 0.000002));
        assert_eq!(params.delay, Span::new(1.0, 3.0));
        assert_eq!(params.wallets_per_source, 2);
        assert_eq!(params.tx_per_wallet, 5);

        let shown = String::from_utf8(output).unwrap();
        let amount_at = shown.find("Minimum amount").unwrap();
        let tx_at = shown.find("Transfers per receiver").unwrap();
        assert!(amount_at < tx_at);
    }

    #[test]
    fn flags_skip_their_prompts() {
        let given = ParamOverrides {
            min_amount: Some(0.1),
            max_amount: Some(0.2),
            wallets_per_source: Some(4),
            ..Default::default()
        };
        let input = Cursor::new("0\n0\n1\n");
        let mut output = Vec::new();
        let params = Prompter::new(input, &mut output)
            .transfer_params(&given)
            .unwrap();

        assert_eq!(params.amount, Span::new(0.1, 0.2));
        assert_eq!(params.wallets_per_source, 4);
        assert_eq!(params.tx_per_wallet, 1);
        assert!(!String::from_utf8(output).unwrap().contains("Minimum amount"));
    }

    #[test]
    fn unparsable_answers_are_asked_again() {
        let input = Cursor::new("abc\n\n7\n");
        let mut output = Vec::new();
        let value: usize = Prompter::new(input, &mut output).ask("Count").unwrap();

        assert_eq!(value, 7);
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Count: ").count(), 3);
    }

    #[test]
    fn inverted_ranges_are_accepted() {
        let input = Cursor::new("0.00001\n0.000005\n5\n1\n1\n1\n");
        let params = Prompter::new(input, Vec::new())
            .transfer_params(&ParamOverrides::default())
            .unwrap();
        assert_eq!(params.amount.low(), 0.000005);
        assert_eq!(params.delay.high(), 5.0);
    }

    #[test]
    fn eof_is_an_error() {
        let result: Result<f64> = Prompter::new(Cursor::new(""), Vec::new()).ask("Minimum amount (ETH)");
        assert!(result.is_err());
    }
}
