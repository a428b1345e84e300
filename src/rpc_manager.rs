use futures::future::join_all;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::chain::ChainClient;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no RPC endpoints configured")]
    NoEndpoints,
    #[error("{operation} failed after {attempts} attempt(s): {last_error:#}")]
    Exhausted {
        operation: String,
        attempts: usize,
        last_error: anyhow::Error,
    },
}

/// Fixed-size endpoint list with a wrapping cursor.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Url>,
    cursor: usize,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Url>) -> Result<Self, RpcError> {
        if endpoints.is_empty() {
            return Err(RpcError::NoEndpoints);
        }
        Ok(Self {
            endpoints,
            cursor: 0,
        })
    }

    /// Endpoint under the cursor; advances the cursor modulo the pool size.
    pub fn next_endpoint(&mut self) -> &Url {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        &self.endpoints[index]
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// total attempts, including the first
    pub attempts: usize,
    /// pause between consecutive attempts
    pub delay: Duration,
}

/// Result of checking one endpoint at startup
#[derive(Debug, Clone)]
pub struct EndpointReport {
    pub url: Url,
    pub elapsed: Duration,
    pub outcome: Result<u64, String>,
}

impl EndpointReport {
    pub fn is_healthy(&self, expected_chain_id: u64) -> bool {
        matches!(self.outcome, Ok(id) if id == expected_chain_id)
    }
}

/// RPC client manager: round-robin endpoint selection plus fixed-delay retry.
#[derive(Debug, Clone)]
pub struct RpcManager {
    pool: EndpointPool,
    retry: RetryPolicy,
}

impl RpcManager {
    pub fn new(pool: EndpointPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub fn endpoints(&self) -> &[Url] {
        self.pool.endpoints()
    }

    /// Run `op` against successive endpoints until it succeeds or the retry
    /// budget is spent. The last error is returned inside `RpcError::Exhausted`.
    pub async fn call<T, F, Fut>(&mut self, operation: &str, mut op: F) -> Result<T, RpcError>
    where
        F: FnMut(Url) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let endpoint = self.pool.next_endpoint().clone();
            debug!(%endpoint, attempt, "{}", operation);

            match op(endpoint.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(
                        %endpoint,
                        "{} failed (attempt {}/{}): {:#}, retrying in {:?}",
                        operation, attempt, attempts, e, self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    warn!(%endpoint, "{} failed (attempt {}/{}): {:#}", operation, attempt, attempts, e);
                    return Err(RpcError::Exhausted {
                        operation: operation.to_string(),
                        attempts,
                        last_error: e,
                    });
                }
            }
        }
    }

    /// Query every endpoint's chain id concurrently. Informational only; the
    /// rotation keeps using every endpoint regardless of the outcome.
    pub async fn check_endpoints<C: ChainClient>(&self, client: &C) -> Vec<EndpointReport> {
        let checks = self.pool.endpoints().iter().map(|url| async move {
            let start = Instant::now();
            let outcome = client.chain_id(url).await.map_err(|e| format!("{:#}", e));
            EndpointReport {
                url: url.clone(),
                elapsed: start.elapsed(),
                outcome,
            }
        });

        join_all(checks).await
    }
}
