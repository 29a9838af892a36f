/// Error Module
///
/// Error taxonomy shared by the ingestion pipeline and the query layer.
/// Skip-class variants (`BlockNotFound`, `MalformedTransaction`) are logged by
/// the pipeline and never abort a run; `StoreIo` always does.
use thiserror::Error;

/// Failures reported by a [`ChainReader`](crate::rpc::ChainReader) implementation
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("rpc endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by rpc endpoint")]
    RateLimited,

    #[error("rpc error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether the call is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Unavailable(_) | RpcError::RateLimited => true,
            // -32603 internal error is what most providers return on overload
            RpcError::Server { code, .. } => *code == -32603,
            RpcError::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("block {block} unavailable after {attempts} attempts: {source}")]
    RpcUnavailable {
        block: u64,
        attempts: usize,
        #[source]
        source: RpcError,
    },

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("malformed transaction {}: {reason}", .hash.as_deref().unwrap_or("<no hash>"))]
    MalformedTransaction { hash: Option<String>, reason: String },

    #[error("store error: {0}")]
    StoreIo(#[from] sqlx::Error),

    #[error("stored value {value:?} for block {block} is not a decimal")]
    InvalidStoredValue { block: u64, value: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Errors the pipeline logs and steps over instead of surfacing
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::BlockNotFound(_) | Error::MalformedTransaction { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
