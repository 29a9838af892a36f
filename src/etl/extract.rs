/// Extract Module
///
/// Handles fetching a block and its transactions from a `ChainReader`, retrying
/// transient RPC failures with linear backoff.
use crate::error::{Error, Result, RpcError};
use crate::models::{BlockInfo, TransactionInfo};
use crate::rpc::ChainReader;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Raw data fetched for a single block
#[derive(Debug, Clone)]
pub struct ExtractedBlock {
    pub block: BlockInfo,
    /// Fetched transactions, in the block's order
    pub transactions: Vec<TransactionInfo>,
    /// Transactions that could not be fetched
    pub skipped: usize,
}

/// Retry settings for RPC calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Base delay, multiplied by the retry number
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, retry_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt`, growing linearly and saturating
    pub fn backoff(&self, attempt: usize) -> Duration {
        self.retry_delay.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }

    /// Run `call` until it succeeds, fails permanently, or retries run out.
    ///
    /// On failure returns the last error with the number of attempts made.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, (RpcError, usize)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    tracing::warn!("{} failed, retrying ({}/{}): {}", what, attempt, self.max_retries, e);
                    sleep(self.backoff(attempt)).await;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

/// Fetch a block and every transaction it references.
///
/// A block the node does not have yields `BlockNotFound`. A transaction that
/// cannot be fetched is logged and counted in `skipped`; it never fails the block.
pub async fn extract_block<R>(reader: &R, number: u64, retry: &RetryPolicy) -> Result<ExtractedBlock>
where
    R: ChainReader + ?Sized,
{
    let block = match retry.run(&format!("getBlock({})", number), || reader.get_block(number)).await {
        Ok(Some(block)) => block,
        Ok(None) => return Err(Error::BlockNotFound(number)),
        Err((source, attempts)) => return Err(Error::RpcUnavailable { block: number, attempts, source }),
    };

    let mut transactions = Vec::with_capacity(block.transactions.len());
    let mut skipped = 0;

    for hash in &block.transactions {
        match retry.run(&format!("getTransaction({})", hash), || reader.get_transaction(hash)).await {
            Ok(Some(tx)) => transactions.push(tx),
            Ok(None) => {
                tracing::warn!("Transaction {} in block {} not found, skipping", hash, number);
                skipped += 1;
            }
            Err((e, attempts)) => {
                tracing::warn!(
                    "Failed to fetch transaction {} in block {} after {} attempts, skipping: {}",
                    hash,
                    number,
                    attempts,
                    e
                );
                skipped += 1;
            }
        }
    }

    tracing::debug!("Fetched block {} with {} transactions ({} skipped)", number, transactions.len(), skipped);

    Ok(ExtractedBlock { block, transactions, skipped })
}
