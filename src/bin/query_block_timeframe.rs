/// Query Block Timeframe
///
/// Prints the block with the largest transferred volume inside a time window.
use anyhow::{Context, Result};
use block_crawler::aggregate::{Aggregator, QueryOutcome};
use block_crawler::cli::{self, QueryCli};
use block_crawler::db::Database;
use chrono::{DateTime, Utc};

const TABLE_MISSING: &str = "The 'transactions' table does not exist in the database.";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt().with_env_filter(cli::log_filter()).init();

    let cli: QueryCli = cli::parse_or_exit();
    let query = cli.volume_query();

    tracing::info!(
        "Querying blocks {} between {} and {}",
        query.blocks,
        format_epoch(query.window.start),
        format_epoch(query.window.end)
    );

    // A missing file has no table; do not create one just to look
    if !cli.db_path.exists() {
        println!("{}", TABLE_MISSING);
        return Ok(());
    }

    let database = Database::open_existing(&cli.db_path).await.context("Failed to open SQLite database")?;
    let outcome = Aggregator::new(&database).max_volume_block(query).await;
    database.close().await;

    match outcome.context("Volume query failed")? {
        QueryOutcome::Found(block) => println!(
            "Block Number: {}, Total Volume Transferred: {}",
            block.block_number,
            block.total_value.to_plain_string()
        ),
        QueryOutcome::NoData => println!("No data found for the specified time range."),
        QueryOutcome::TableMissing => println!("{}", TABLE_MISSING),
    }

    Ok(())
}

fn format_epoch(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
