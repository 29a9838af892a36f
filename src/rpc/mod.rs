/// RPC Client Module
///
/// This module defines the capability set the pipeline needs from a node
/// (`ChainReader`) and provides a JSON-RPC over HTTP implementation of it.
/// Amounts are always returned in base units; no conversion happens here.
mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpChainReader;

use crate::error::RpcError;
use crate::models::{BlockInfo, TransactionInfo};
use async_trait::async_trait;

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetch a block with its transaction hashes. `Ok(None)` when the node does
    /// not have the block (yet).
    async fn get_block(&self, number: u64) -> Result<Option<BlockInfo>, RpcError>;

    /// Fetch a transaction by hash. `Ok(None)` when the node does not know it.
    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, RpcError>;
}

