use std::future::Future;
use std::time::Duration;

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use super::{Broadcaster, InscriptionSource, TransactionSource};
use crate::inscription::{Inscription, InscriptionId};
use crate::utxo::UtxoStatus;
use crate::{SwapError, SwapResult};

/// Exponential backoff applied to upstream calls failing with
/// [`SwapError::UpstreamUnavailable`]. Any other error is returned at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry, doubled after each failure
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Runs `call` until it succeeds, fails for good or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> SwapResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SwapResult<T>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match call().await {
                Err(SwapError::UpstreamUnavailable(reason)) if attempt < self.max_attempts => {
                    warn!(
                        "{operation} failed ({reason}), attempt {attempt}/{}, retrying in {backoff:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = self.next_backoff(backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn next_backoff(&self, backoff: Duration) -> Duration {
        backoff.saturating_mul(2).min(self.max_backoff)
    }
}

/// Wraps an upstream collaborator, retrying its calls under a [`RetryPolicy`].
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait::async_trait]
impl<S: TransactionSource> TransactionSource for Retrying<S> {
    async fn get_raw_transaction(&self, txid: &Txid) -> SwapResult<String> {
        self.policy
            .run("get_raw_transaction", || self.inner.get_raw_transaction(txid))
            .await
    }

    async fn get_transaction_status(&self, txid: &Txid) -> SwapResult<UtxoStatus> {
        self.policy
            .run("get_transaction_status", || {
                self.inner.get_transaction_status(txid)
            })
            .await
    }
}

#[async_trait::async_trait]
impl<S: InscriptionSource> InscriptionSource for Retrying<S> {
    async fn get_inscription(&self, id: &InscriptionId) -> SwapResult<Inscription> {
        self.policy
            .run("get_inscription", || self.inner.get_inscription(id))
            .await
    }
}

#[async_trait::async_trait]
impl<S: Broadcaster> Broadcaster for Retrying<S> {
    async fn send_raw_transaction(&self, tx_hex: &str) -> SwapResult<Txid> {
        self.policy
            .run("send_raw_transaction", || {
                self.inner.send_raw_transaction(tx_hex)
            })
            .await
    }
}
