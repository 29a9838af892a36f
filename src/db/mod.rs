/// Database Module
///
/// This module handles all SQLite operations including:
/// - Connection pool lifecycle (open / close)
/// - Schema creation for the `transactions` table
/// - Idempotent inserts keyed by transaction hash
/// - The block volume aggregation
use crate::error::{Error, Result};
use crate::models::{BlockRange, MaxVolumeBlock, TimeWindow, TransactionRecord};
use bigdecimal::BigDecimal;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, SqliteExecutor};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const CREATE_TRANSACTIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS transactions (
        block_number INTEGER,
        transaction_index INTEGER,
        hash TEXT PRIMARY KEY,
        from_address TEXT,
        to_address TEXT,
        value TEXT,
        gas_price TEXT,
        gas_used INTEGER,
        timestamp INTEGER
    )
"#;

const CREATE_BLOCK_TIME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_block_time ON transactions (block_number, timestamp)";

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Row shape of the `transactions` table
#[derive(Debug, Clone, sqlx::FromRow)]
struct TransactionRow {
    block_number: i64,
    transaction_index: i64,
    hash: String,
    from_address: String,
    to_address: Option<String>,
    value: String,
    gas_price: String,
    gas_used: i64,
    timestamp: i64,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = Error;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let block_number = row.block_number as u64;
        Ok(TransactionRecord {
            block_number,
            transaction_index: row.transaction_index as u64,
            value: parse_stored_decimal(block_number, row.value)?,
            gas_price: parse_stored_decimal(block_number, row.gas_price)?,
            hash: row.hash,
            from_address: row.from_address,
            to_address: row.to_address,
            gas_used: row.gas_used as u64,
            timestamp: row.timestamp as u64,
        })
    }
}

impl Database {
    /// Open (creating if needed) the SQLite file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        Self::connect(options).await
    }

    /// Open an existing SQLite file read-only; never creates one
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(path.as_ref()).create_if_missing(false).read_only(true);

        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection; the handle is unusable afterwards
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the transactions table if absent. Safe on every startup.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TRANSACTIONS).execute(&self.pool).await?;
        sqlx::query(CREATE_BLOCK_TIME_INDEX).execute(&self.pool).await?;

        tracing::debug!("Transactions schema ready");
        Ok(())
    }

    pub async fn table_exists(&self) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'transactions')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Insert a record unless its hash is already stored.
    ///
    /// Returns whether a row was written.
    pub async fn insert_if_absent(&self, record: &TransactionRecord) -> Result<bool> {
        Ok(insert_record(&self.pool, record).await? == 1)
    }

    /// Insert many records in a single transaction, skipping known hashes.
    ///
    /// Either every new row is committed or none is. Returns the number of rows
    /// actually inserted.
    pub async fn insert_batch(&self, records: &[TransactionRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in records {
            inserted += insert_record(&mut *tx, record).await?;
        }

        tx.commit().await?;

        tracing::debug!("Batch inserted {} of {} records", inserted, records.len());
        Ok(inserted)
    }

    /// Number of stored transactions
    pub async fn count(&self) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions").fetch_one(&self.pool).await?;

        Ok(count as u64)
    }

    pub async fn fetch_record(&self, hash: &str) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT block_number, transaction_index, hash, from_address, to_address, value, gas_price, gas_used, \
             timestamp FROM transactions WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRecord::try_from).transpose()
    }

    /// Block with the largest summed `value` among rows inside both ranges.
    ///
    /// Values are summed exactly. Ties go to the lowest block number.
    pub async fn query_max_volume_block(
        &self,
        blocks: BlockRange,
        window: TimeWindow,
    ) -> Result<Option<MaxVolumeBlock>> {
        if blocks.is_empty() || window.is_empty() {
            return Ok(None);
        }

        let mut rows = sqlx::query(
            "SELECT block_number, value FROM transactions WHERE block_number BETWEEN ? AND ? AND timestamp BETWEEN ? \
             AND ? ORDER BY block_number",
        )
        .bind(clamp_to_sql(blocks.start))
        .bind(clamp_to_sql(blocks.end))
        .bind(window.start)
        .bind(window.end)
        .fetch(&self.pool);

        let mut totals: BTreeMap<u64, BigDecimal> = BTreeMap::new();
        while let Some(row) = rows.try_next().await? {
            let block_number = row.try_get::<i64, _>("block_number")? as u64;
            let value = parse_stored_decimal(block_number, row.try_get("value")?)?;
            *totals.entry(block_number).or_default() += value;
        }

        let mut best: Option<MaxVolumeBlock> = None;
        for (block_number, total_value) in totals {
            if best.as_ref().map_or(true, |b| total_value > b.total_value) {
                best = Some(MaxVolumeBlock { block_number, total_value });
            }
        }

        Ok(best)
    }
}

async fn insert_record<'e, E>(executor: E, record: &TransactionRecord) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO transactions (
            block_number,
            transaction_index,
            hash,
            from_address,
            to_address,
            value,
            gas_price,
            gas_used,
            timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(to_sql("block_number", record.block_number)?)
    .bind(to_sql("transaction_index", record.transaction_index)?)
    .bind(record.hash.as_str())
    .bind(record.from_address.as_str())
    .bind(record.to_address.as_deref())
    .bind(record.value.to_plain_string())
    .bind(record.gas_price.to_plain_string())
    .bind(to_sql("gas_used", record.gas_used)?)
    .bind(to_sql("timestamp", record.timestamp)?)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// SQLite integers are signed 64-bit
fn to_sql(field: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidArgument(format!("{} {} exceeds the SQLite integer range", field, value)))
}

fn clamp_to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_stored_decimal(block: u64, value: String) -> Result<BigDecimal> {
    BigDecimal::from_str(&value).map_err(|_| Error::InvalidStoredValue { block, value })
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::Database;
    use crate::models::TransactionRecord;
    use bigdecimal::BigDecimal;
    use tempfile::TempDir;

    /// Fresh database with the schema in a temporary directory
    pub async fn open_temp() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("transactions.db")).await.unwrap();
        database.ensure_schema().await.unwrap();
        (dir, database)
    }

    pub fn record(hash: &str, block_number: u64, value: i64) -> TransactionRecord {
        record_at(hash, block_number, value, 1000)
    }

    pub fn record_at(hash: &str, block_number: u64, value: i64, timestamp: u64) -> TransactionRecord {
        TransactionRecord {
            block_number,
            transaction_index: 0,
            hash: hash.to_string(),
            from_address: "0xaa".to_string(),
            to_address: Some("0xbb".to_string()),
            value: BigDecimal::from(value),
            gas_price: BigDecimal::from(1),
            gas_used: 21_000,
            timestamp,
        }
    }
}
