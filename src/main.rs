/// Block Crawler
///
/// Ingests every transaction of an inclusive block range into a SQLite database.
use anyhow::{Context, Result};
use block_crawler::cli::{self, IngestCli};
use block_crawler::db::Database;
use block_crawler::pipeline::{self, Pipeline};
use block_crawler::rpc::HttpChainReader;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "Usage: block-crawler <RPC_ENDPOINT> <DB_PATH> <START>-<END>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt().with_env_filter(cli::log_filter()).init();

    let cli: IngestCli = cli::parse_or_exit();
    if let Err(e) = cli.validate() {
        eprintln!("{}\n{}", e, USAGE);
        std::process::exit(1);
    }

    println!("🚀 Starting Block Crawler...");

    println!("\n💾 Opening SQLite database {}...", cli.db_path.display());
    let database = Database::open(&cli.db_path).await.context("Failed to open SQLite database")?;
    database.test_connection().await.context("Database connection test failed")?;
    database.ensure_schema().await.context("Failed to create transactions table")?;
    println!("✅ Database ready");

    let reader = HttpChainReader::new(cli.rpc_endpoint.clone(), cli.rpc_timeout()).context("Failed to create RPC client")?;
    println!("🔗 RPC endpoint: {}", reader.endpoint());
    println!("📍 Block range: {} ({} blocks)", cli.block_range, format_number(cli.block_range.len()));

    // Stop between blocks on Ctrl-C; committed batches stay valid
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl-C, stopping after blocks in flight");
            on_signal.cancel();
        }
    });

    let pipeline = Pipeline::new(reader, database.clone(), cli.pipeline_config());
    let result = pipeline.run(cancel).await;
    database.close().await;

    let stats = result.context("Pipeline execution failed")?;
    pipeline::print_final_stats(&stats);

    println!("\n✨ Ingestion complete!");

    Ok(())
}

/// Format a number with thousand separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(251), "251");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
