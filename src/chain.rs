use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use url::Url;

/// A native-token transfer, built fresh for every send.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub from: &'a PrivateKeySigner,
    pub to: Address,
    pub value: U256,
    pub chain_id: u64,
}

/// The remote operations the bot needs from an EVM node.
// Only driven from the single scheduler task, so the futures need not be Send.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    async fn chain_id(&self, endpoint: &Url) -> Result<u64>;

    async fn balance(&self, endpoint: &Url, address: Address) -> Result<U256>;

    /// Broadcast the transfer and return its hash without waiting for inclusion.
    async fn send_transfer(&self, endpoint: &Url, request: &TransferRequest<'_>) -> Result<TxHash>;
}

impl<T: ChainClient> ChainClient for &T {
    async fn chain_id(&self, endpoint: &Url) -> Result<u64> {
        (**self).chain_id(endpoint).await
    }

    async fn balance(&self, endpoint: &Url, address: Address) -> Result<U256> {
        (**self).balance(endpoint, address).await
    }

    async fn send_transfer(&self, endpoint: &Url, request: &TransferRequest<'_>) -> Result<TxHash> {
        (**self).send_transfer(endpoint, request).await
    }
}

/// JSON-RPC over HTTP via alloy. A provider is built per call so that every
/// attempt can target a different endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlloyClient;

impl ChainClient for AlloyClient {
    async fn chain_id(&self, endpoint: &Url) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(endpoint.clone());
        Ok(provider.get_chain_id().await?)
    }

    async fn balance(&self, endpoint: &Url, address: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(endpoint.clone());
        Ok(provider.get_balance(address).await?)
    }

    async fn send_transfer(&self, endpoint: &Url, request: &TransferRequest<'_>) -> Result<TxHash> {
        let wallet = EthereumWallet::from(request.from.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .on_http(endpoint.clone());

        let tx = TransactionRequest::default()
            .with_from(request.from.address())
            .with_to(request.to)
            .with_value(request.value)
            .with_chain_id(request.chain_id);

        let pending = provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }
}

/// Whole-token amount to wei, rounded to 18 decimal places.
pub fn ether_to_wei(ether: f64) -> Result<U256> {
    let fixed = format!("{:.18}", ether);
    parse_ether(&fixed).with_context(|| format!("Invalid ether amount: {}", fixed))
}

pub fn wei_to_ether(wei: U256) -> String {
    format_ether(wei)
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use alloy::primitives::B256;
    use anyhow::anyhow;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct RecordedTransfer {
        pub endpoint: Url,
        pub from: Address,
        pub to: Address,
        pub value: U256,
        pub chain_id: u64,
    }

    #[derive(Default)]
    struct StubState {
        failing: HashSet<Url>,
        fail_transfers: bool,
        balance_calls: Vec<Address>,
        transfers: Vec<RecordedTransfer>,
    }

    /// In-memory node: every call succeeds unless told otherwise.
    #[derive(Default)]
    pub struct StubChain {
        state: Mutex<StubState>,
    }

    impl StubChain {
        pub const CHAIN_ID: u64 = 31337;
        pub const TX_HASH: B256 = B256::new([0xab; 32]);
        pub const BALANCE_WEI: u64 = 5_000_000_000_000_000;

        pub fn fail_endpoint(&self, url: &Url) {
            self.state.lock().unwrap().failing.insert(url.clone());
        }

        pub fn fail_transfers(&self) {
            self.state.lock().unwrap().fail_transfers = true;
        }

        pub fn balance_calls(&self) -> usize {
            self.state.lock().unwrap().balance_calls.len()
        }

        pub fn transfers(&self) -> Vec<RecordedTransfer> {
            self.state.lock().unwrap().transfers.clone()
        }

        fn check(&self, endpoint: &Url) -> Result<()> {
            if self.state.lock().unwrap().failing.contains(endpoint) {
                return Err(anyhow!("{} unreachable", endpoint));
            }
            Ok(())
        }
    }

    impl ChainClient for StubChain {
        async fn chain_id(&self, endpoint: &Url) -> Result<u64> {
            self.check(endpoint)?;
            Ok(Self::CHAIN_ID)
        }

        async fn balance(&self, endpoint: &Url, address: Address) -> Result<U256> {
            self.check(endpoint)?;
            self.state.lock().unwrap().balance_calls.push(address);
            Ok(U256::from(Self::BALANCE_WEI))
        }

        async fn send_transfer(&self, endpoint: &Url, request: &TransferRequest<'_>) -> Result<TxHash> {
            self.check(endpoint)?;
            let mut state = self.state.lock().unwrap();
            if state.fail_transfers {
                return Err(anyhow!("insufficient funds for gas * price + value"));
            }
            state.transfers.push(RecordedTransfer {
                endpoint: endpoint.clone(),
                from: request.from.address(),
                to: request.to,
                value: request.value,
                chain_id: request.chain_id,
            });
            Ok(Self::TX_HASH)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ether_to_wei_uses_eighteen_decimals() {
        assert_eq!(ether_to_wei(0.000001).unwrap(), U256::from(1_000_000_000_000u64));
        assert_eq!(ether_to_wei(1.5).unwrap(), U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(ether_to_wei(0.0).unwrap(), U256::ZERO);
    }

    #[test]
    fn ether_to_wei_rounds_at_the_eighteenth_decimal() {
        // 2e-6 is stored slightly below 0.000002
        assert_eq!(ether_to_wei(2e-6).unwrap(), U256::from(2_000_000_000_000u64));
        assert_eq!(ether_to_wei(0.1).unwrap(), U256::from(100_000_000_000_000_000u64));
    }

    #[test]
    fn wei_formats_as_ether() {
        let wei = U256::from(2_500_000_000_000_000u64);
        assert!(wei_to_ether(wei).starts_with("0.0025"));
    }
}
