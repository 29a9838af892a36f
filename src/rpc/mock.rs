/// Scripted `ChainReader` for deterministic pipeline tests
use super::ChainReader;
use crate::error::RpcError;
use crate::models::{BlockInfo, TransactionInfo};
use async_trait::async_trait;
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockChainReader {
    blocks: HashMap<u64, BlockInfo>,
    transactions: HashMap<String, TransactionInfo>,
    /// Remaining transient failures per call key ("block:7", "tx:0xaa")
    failures: Mutex<HashMap<String, usize>>,
    /// Call keys that always fail with a non-transient error
    broken: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block whose transactions each carry `value_wei` and sit at `timestamp`
    pub fn with_block(mut self, number: u64, timestamp: u64, values_wei: &[u64]) -> Self {
        let mut hashes = Vec::new();
        for (index, value) in values_wei.iter().enumerate() {
            let hash = format!("0x{:x}{:04x}", number, index);
            self.transactions.insert(hash.clone(), transaction(&hash, number, index as u64, *value));
            hashes.push(hash);
        }
        self.blocks.insert(number, BlockInfo { number, timestamp, transactions: hashes });
        self
    }

    /// Replace a transaction body, keeping it referenced by its block
    pub fn with_transaction(mut self, hash: &str, tx: TransactionInfo) -> Self {
        self.transactions.insert(hash.to_string(), tx);
        self
    }

    pub fn without_transaction(mut self, hash: &str) -> Self {
        self.transactions.remove(hash);
        self
    }

    /// Fail the next `times` calls for `key` with a transient error
    pub fn failing(self, key: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(key.to_string(), times);
        self
    }

    /// Fail every call for `key` with a non-transient error
    pub fn broken(mut self, key: &str) -> Self {
        self.broken.push(key.to_string());
        self
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == key).count()
    }

    pub fn block_calls(&self) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.strip_prefix("block:"))
            .filter_map(|n| n.parse().ok())
            .collect()
    }

    fn check(&self, key: String) -> Result<(), RpcError> {
        self.calls.lock().unwrap().push(key.clone());

        if self.broken.contains(&key) {
            return Err(RpcError::InvalidResponse(format!("{} is broken", key)));
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RpcError::Unavailable(format!("{} temporarily unavailable", key)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn get_block(&self, number: u64) -> Result<Option<BlockInfo>, RpcError> {
        self.check(format!("block:{}", number))?;
        Ok(self.blocks.get(&number).cloned())
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, RpcError> {
        self.check(format!("tx:{}", hash))?;
        Ok(self.transactions.get(hash).cloned())
    }
}

/// Well-formed transfer of `value_wei` at 1 gwei
pub fn transaction(hash: &str, block: u64, index: u64, value_wei: u64) -> TransactionInfo {
    TransactionInfo {
        hash: Some(hash.to_string()),
        block_number: Some(block),
        transaction_index: Some(index),
        from: Some("0x00000000000000000000000000000000000000aa".to_string()),
        to: Some("0x00000000000000000000000000000000000000bb".to_string()),
        value: Some(BigUint::from(value_wei)),
        gas_price: Some(BigUint::from(1_000_000_000u64)),
        gas: Some(21_000),
    }
}
