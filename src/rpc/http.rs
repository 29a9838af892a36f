use super::ChainReader;
use crate::error::RpcError;
use crate::models::{BlockInfo, TransactionInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON-RPC code used by most hosted providers for "request limit exceeded"
const LIMIT_EXCEEDED: i64 = -32005;

/// Ethereum JSON-RPC client over HTTP(S)
pub struct HttpChainReader {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl HttpChainReader {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("block-crawler/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, endpoint: endpoint.into(), next_id: AtomicU64::new(1) })
    }

    /// Get the endpoint URL this client talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| RpcError::Unavailable(e.to_string()))?;

        decode_response(status, &text)
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn get_block(&self, number: u64) -> Result<Option<BlockInfo>, RpcError> {
        tracing::debug!("Fetching block {}", number);
        self.call("eth_getBlockByNumber", json!([format!("{:#x}", number), false])).await
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, RpcError> {
        self.call("eth_getTransactionByHash", json!([hash])).await
    }
}

/// Map an HTTP response onto the RPC error taxonomy
fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<Option<T>, RpcError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RpcError::RateLimited);
    }
    if status.is_server_error() {
        return Err(RpcError::Unavailable(format!("http status {}", status)));
    }

    let envelope: RpcResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(RpcError::InvalidResponse(format!("http status {}", status)));
        }
        Err(e) => return Err(RpcError::InvalidResponse(e.to_string())),
    };

    if let Some(error) = envelope.error {
        if error.code == LIMIT_EXCEEDED || error.message.to_lowercase().contains("rate limit") {
            return Err(RpcError::RateLimited);
        }
        return Err(RpcError::Server { code: error.code, message: error.message });
    }

    Ok(envelope.result)
}
