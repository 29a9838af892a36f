/// CLI Module
///
/// Command-line interfaces of the two entry points using clap.
use crate::aggregate::VolumeQuery;
use crate::error::{Error, Result};
use crate::etl::extract::RetryPolicy;
use crate::models::{BlockRange, TimeWindow};
use crate::pipeline::{FailurePolicy, PipelineConfig};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Log directives used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

/// Block Crawler - ingest transactions of a block range into SQLite
#[derive(Parser, Debug)]
#[command(name = "block-crawler")]
#[command(author, version, about, long_about = None)]
pub struct IngestCli {
    /// JSON-RPC endpoint of the node (http:// or https://)
    #[arg(value_name = "RPC_ENDPOINT")]
    pub rpc_endpoint: String,

    /// SQLite database file, created if missing
    #[arg(value_name = "DB_PATH")]
    pub db_path: PathBuf,

    /// Inclusive block range, e.g. 18908800-18909050
    #[arg(value_name = "START-END")]
    pub block_range: BlockRange,

    /// Blocks collected before each database write
    #[arg(short = 'b', long, value_name = "BLOCKS", default_value = "1")]
    pub batch_size: usize,

    /// Retries for a failing RPC call
    #[arg(long, value_name = "COUNT", default_value = "3")]
    pub max_retries: usize,

    /// Base retry delay in milliseconds, grows linearly with each retry
    #[arg(long, value_name = "MS", default_value = "500")]
    pub retry_delay: u64,

    /// Pause between block fetches in milliseconds
    #[arg(long, value_name = "MS", default_value = "0")]
    pub rate_limit: u64,

    /// Blocks fetched concurrently
    #[arg(short = 'c', long, value_name = "N", default_value = "1")]
    pub concurrency: usize,

    /// Stop the whole run when a block still fails after all retries
    #[arg(long)]
    pub abort_on_error: bool,

    /// RPC request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value = "30")]
    pub rpc_timeout: u64,
}

impl IngestCli {
    /// Validate CLI arguments
    pub fn validate(&self) -> Result<()> {
        if !(self.rpc_endpoint.starts_with("http://") || self.rpc_endpoint.starts_with("https://")) {
            return Err(Error::InvalidArgument(format!(
                "RPC endpoint must start with http:// or https://, got {}",
                self.rpc_endpoint
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::InvalidArgument("Batch size must be greater than 0".to_string()));
        }

        if self.concurrency == 0 {
            return Err(Error::InvalidArgument("Concurrency must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            range: self.block_range,
            retry: RetryPolicy { max_retries: self.max_retries, retry_delay: Duration::from_millis(self.retry_delay) },
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            rate_limit: Duration::from_millis(self.rate_limit),
            failure_policy: if self.abort_on_error { FailurePolicy::Abort } else { FailurePolicy::Skip },
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout)
    }
}

/// Find the block with the largest transferred volume in a time window
#[derive(Parser, Debug)]
#[command(name = "query-block-timeframe")]
#[command(author, version, about, long_about = None)]
pub struct QueryCli {
    /// SQLite database file written by block-crawler
    #[arg(value_name = "DB_PATH")]
    pub db_path: PathBuf,

    /// Window start, Unix epoch seconds (inclusive)
    #[arg(value_name = "START_EPOCH")]
    pub start_epoch: i64,

    /// Window end, Unix epoch seconds (inclusive)
    #[arg(value_name = "END_EPOCH")]
    pub end_epoch: i64,

    /// Restrict to an inclusive block sub-range, e.g. 18908800-18909050
    #[arg(long, value_name = "START-END")]
    pub blocks: Option<BlockRange>,
}

impl QueryCli {
    pub fn volume_query(&self) -> VolumeQuery {
        VolumeQuery {
            blocks: self.blocks.unwrap_or_else(BlockRange::unbounded),
            window: TimeWindow::new(self.start_epoch, self.end_epoch),
        }
    }
}

/// Tracing filter shared by both binaries: `RUST_LOG`, else `DEFAULT_LOG_FILTER`
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Parse the process arguments, printing usage and exiting with status 1 on
/// any parse error (help and version exit with 0).
pub fn parse_or_exit<T: Parser>() -> T {
    match T::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_ingest_positional_arguments() {
        let cli =
            IngestCli::try_parse_from(["block-crawler", "https://node.example", "tx.db", "18908800-18909050"]).unwrap();

        assert_eq!(cli.rpc_endpoint, "https://node.example");
        assert_eq!(cli.db_path, PathBuf::from("tx.db"));
        assert_eq!(cli.block_range, BlockRange::new(18_908_800, 18_909_050));
        assert!(cli.validate().is_ok());

        let config = cli.pipeline_config();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
    }

    #[test]
    fn test_ingest_wrong_arity() {
        assert!(IngestCli::try_parse_from(["block-crawler", "https://node.example", "tx.db"]).is_err());
        assert!(IngestCli::try_parse_from(["block-crawler", "https://node.example", "tx.db", "1-2", "extra"]).is_err());
    }

    #[test]
    fn test_ingest_malformed_range() {
        let err = IngestCli::try_parse_from(["block-crawler", "https://node.example", "tx.db", "100"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_ingest_options() {
        let cli = IngestCli::try_parse_from([
            "block-crawler",
            "http://localhost:8545",
            "tx.db",
            "5-3",
            "--batch-size",
            "10",
            "--concurrency",
            "4",
            "--abort-on-error",
        ])
        .unwrap();

        let config = cli.pipeline_config();
        assert!(config.range.is_empty());
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_ingest_validation() {
        let cli = IngestCli::try_parse_from(["block-crawler", "node.example", "tx.db", "1-2"]).unwrap();
        assert_matches!(cli.validate(), Err(Error::InvalidArgument(_)));

        let cli = IngestCli::try_parse_from(["block-crawler", "http://node", "tx.db", "1-2", "-b", "0"]).unwrap();
        assert_matches!(cli.validate(), Err(Error::InvalidArgument(_)));
    }

    #[test]
    fn test_query_arguments() {
        let cli = QueryCli::try_parse_from(["query-block-timeframe", "tx.db", "1703980800", "1704067199"]).unwrap();
        let query = cli.volume_query();

        assert_eq!(query.window, TimeWindow::new(1_703_980_800, 1_704_067_199));
        assert_eq!(query.blocks, BlockRange::unbounded());

        let cli = QueryCli::try_parse_from(["query-block-timeframe", "tx.db", "0", "10", "--blocks", "100-101"]).unwrap();
        assert_eq!(cli.volume_query().blocks, BlockRange::new(100, 101));
    }

    #[test]
    fn test_default_log_filter_is_info() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        assert_eq!(filter.max_level_hint(), Some(tracing_subscriber::filter::LevelFilter::INFO));
    }

    #[test]
    fn test_query_wrong_arity() {
        assert!(QueryCli::try_parse_from(["query-block-timeframe", "tx.db", "0"]).is_err());
        assert!(QueryCli::try_parse_from(["query-block-timeframe", "tx.db", "0", "1", "2"]).is_err());
        assert!(QueryCli::try_parse_from(["query-block-timeframe", "tx.db", "zero", "1"]).is_err());
    }
}
