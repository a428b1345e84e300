use alloy::primitives::{Address, TxHash, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::chain::{ether_to_wei, wei_to_ether, ChainClient, TransferRequest};
use crate::config::{Config, TransferParams};
use crate::display;
use crate::rpc_manager::{EndpointPool, EndpointReport, RetryPolicy, RpcManager};
use crate::wallet::generate_receivers;

/// What a successful send looked like, for display.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub source_index: usize,
    pub from: Address,
    pub to: Address,
    pub balance: U256,
    pub value: U256,
    pub hash: TxHash,
    pub next_delay: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Sequential transfer loop: sources -> fresh receivers -> transfers per receiver.
pub struct TransferService<C> {
    config: Config,
    sources: Vec<PrivateKeySigner>,
    rpc_manager: RpcManager,
    client: C,
    stop: watch::Receiver<bool>,
    stats: RunStats,
}

impl<C: ChainClient> TransferService<C> {
    pub fn new(
        config: Config,
        sources: Vec<PrivateKeySigner>,
        client: C,
        stop: watch::Receiver<bool>,
    ) -> Result<Self> {
        if sources.is_empty() {
            bail!("At least one source wallet is required");
        }

        let pool = EndpointPool::new(config.endpoints()?)?;
        let retry = RetryPolicy {
            attempts: config.retry_attempts,
            delay: config.retry_delay(),
        };

        Ok(Self {
            config,
            sources,
            rpc_manager: RpcManager::new(pool, retry),
            client,
            stop,
            stats: RunStats::default(),
        })
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Check all rpc endpoints and print a report
    pub async fn test_rpc_endpoints(&self) -> Vec<EndpointReport> {
        let reports = self.rpc_manager.check_endpoints(&self.client).await;
        println!("{}", display::endpoint_report(&reports, self.config.chain_id));

        if !reports.iter().any(|r| r.is_healthy(self.config.chain_id)) {
            warn!(
                "No endpoint answered with chain id {}; transfers will likely fail",
                self.config.chain_id
            );
        }
        reports
    }

    /// Print each source address with its current balance.
    pub async fn show_wallets(&mut self) {
        let client = &self.client;
        for (i, source) in self.sources.iter().enumerate() {
            let address = source.address();
            let balance = self
                .rpc_manager
                .call("get_balance", move |endpoint| async move {
                    client.balance(&endpoint, address).await
                })
                .await;

            match balance {
                Ok(wei) => println!("{}. {} - {} ETH", i + 1, address, wei_to_ether(wei)),
                Err(e) => println!("{}. {} - balance unavailable: {}", i + 1, address, e),
            }
        }
    }

    /// Run cycles until stopped, or until `max_cycles` complete.
    pub async fn start_transfers(
        &mut self,
        params: &TransferParams,
        max_cycles: Option<u64>,
    ) -> Result<RunStats> {
        if params.wallets_per_source == 0 || params.tx_per_wallet == 0 {
            bail!("Nothing to do: receivers per source and transfers per receiver must be non-zero");
        }

        info!(
            "Starting transfers from {} source wallet(s): {} receiver(s) each, {} transfer(s) per receiver",
            self.sources.len(),
            params.wallets_per_source,
            params.tx_per_wallet
        );
        info!(
            "Amount {}..{} ETH, delay {}..{} min, using {} RPC endpoint(s)",
            params.amount.low(),
            params.amount.high(),
            params.delay.low(),
            params.delay.high(),
            self.rpc_manager.endpoints().len()
        );

        loop {
            if !self.run_cycle(params).await {
                info!("Stop requested, leaving transfer loop");
                break;
            }
            if let Some(max) = max_cycles {
                if max > 0 && self.stats.cycles >= max {
                    info!("Completed {} cycle(s)", self.stats.cycles);
                    break;
                }
            }
        }

        Ok(self.stats)
    }

    /// One pass over every source. Returns false when a stop was requested.
    pub async fn run_cycle(&mut self, params: &TransferParams) -> bool {
        for source_index in 0..self.sources.len() {
            let receivers = generate_receivers(params.wallets_per_source);
            info!(
                "Source #{} {}: generated {} receiver(s)",
                source_index + 1,
                self.sources[source_index].address(),
                receivers.len()
            );

            for receiver in receivers {
                for n in 0..params.tx_per_wallet {
                    if self.stopped() {
                        return false;
                    }

                    let pause = match self.transfer_once(params, source_index, receiver).await {
                        Ok(receipt) => {
                            self.stats.sent += 1;
                            info!(
                                "Transfer {}/{} to {} sent: {}",
                                n + 1,
                                params.tx_per_wallet,
                                receiver,
                                receipt.hash
                            );
                            let link = self.config.tx_link(&receipt.hash.to_string());
                            println!("{}", display::transfer_box(&receipt, link));
                            receipt.next_delay
                        }
                        Err(e) => {
                            self.stats.failed += 1;
                            error!(
                                "Transfer {}/{} from source #{} to {} failed: {:#}",
                                n + 1,
                                params.tx_per_wallet,
                                source_index + 1,
                                receiver,
                                e
                            );
                            self.config.failure_cooldown()
                        }
                    };

                    if !self.pause(pause).await {
                        return false;
                    }
                }
            }
        }

        self.stats.cycles += 1;
        true
    }

    /// Balance query, random amount, send. The balance is shown, never checked.
    async fn transfer_once(
        &mut self,
        params: &TransferParams,
        source_index: usize,
        to: Address,
    ) -> Result<TransferReceipt> {
        let source = &self.sources[source_index];
        let client = &self.client;
        let from = source.address();

        let balance = self
            .rpc_manager
            .call("get_balance", move |endpoint| async move {
                client.balance(&endpoint, from).await
            })
            .await?;

        let (amount, next_delay) = {
            let mut rng = rand::thread_rng();
            (
                params.sample_amount(&mut rng),
                params.sample_delay(&mut rng),
            )
        };

        let request = TransferRequest {
            from: source,
            to,
            value: ether_to_wei(amount)?,
            chain_id: self.config.chain_id,
        };
        let request = &request;

        let hash = self
            .rpc_manager
            .call("send_transfer", move |endpoint| async move {
                client.send_transfer(&endpoint, request).await
            })
            .await?;

        Ok(TransferReceipt {
            source_index,
            from,
            to,
            balance,
            value: request.value,
            hash,
            next_delay,
        })
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Sleep for `duration` unless a stop arrives first. Returns false if stopped.
    async fn pause(&mut self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.stopped();
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        let stopped = tokio::select! {
            _ = &mut sleep => return true,
            res = self.stop.wait_for(|stop| *stop) => res.is_ok(),
        };
        if !stopped {
            // sender gone, no stop can arrive any more
            sleep.await;
        }
        !stopped
    }
}
