/// Pipeline Module
///
/// Orchestrates the complete ETL pipeline over a block range: Extract → Transform → Load
/// with retry logic, skip-or-abort failure handling, cancellation and statistics tracking.
use crate::db::Database;
use crate::error::Result;
use crate::etl::{
    extract::{extract_block, RetryPolicy},
    load::RecordBatch,
    transform::TransactionExtractor,
};
use crate::models::{BlockRange, TransactionRecord};
use crate::rpc::ChainReader;
use futures::{future, stream, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Error messages kept in `PipelineStats::errors`; the rest are only counted
pub const MAX_RECORDED_ERRORS: usize = 5;

/// Pipeline execution statistics
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub blocks_attempted: u64,
    pub blocks_succeeded: u64,
    pub blocks_missing: u64,
    pub blocks_failed: u64,
    pub transactions_processed: u64,
    pub transactions_skipped: u64,
    pub transactions_inserted: u64,
    pub elapsed_time: Duration,
    /// Stopped by the cancellation token before the end of the range
    pub cancelled: bool,
    /// All errors seen, including those not kept in `errors`
    pub error_count: u64,
    /// The first `MAX_RECORDED_ERRORS` errors
    pub errors: Vec<PipelineError>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, error: PipelineError) {
        self.error_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(error);
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.blocks_attempted == 0 {
            0.0
        } else {
            (self.blocks_succeeded as f64 / self.blocks_attempted as f64) * 100.0
        }
    }

    pub fn blocks_per_second(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.blocks_succeeded as f64 / secs
        }
    }

    pub fn transactions_per_second(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.transactions_inserted as f64 / secs
        }
    }
}

/// Pipeline error with context
#[derive(Debug, Clone)]
pub struct PipelineError {
    pub stage: PipelineStage,
    pub block: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Extract,
    Transform,
    Load,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Extract => write!(f, "Extract"),
            PipelineStage::Transform => write!(f, "Transform"),
            PipelineStage::Load => write!(f, "Load"),
        }
    }
}

/// What to do with a block whose retries are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the block as failed and continue with the next one
    #[default]
    Skip,
    /// Commit what has been collected and stop the run with the error
    Abort,
}

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub range: BlockRange,
    pub retry: RetryPolicy,
    /// Blocks collected before a store write
    pub batch_size: usize,
    /// Blocks fetched concurrently; 1 processes strictly one block at a time
    pub concurrency: usize,
    /// Pause before each block fetch after the first
    pub rate_limit: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            range: BlockRange::new(0, 0),
            retry: RetryPolicy::default(),
            batch_size: 1,
            concurrency: 1,
            rate_limit: Duration::ZERO,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

/// Spaces block fetch starts by at least `interval`, across all in-flight blocks
struct Throttle {
    interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self { interval, last_start: Mutex::new(None) }
    }

    /// Wait for this fetch's turn. The lock is held while sleeping so waiters
    /// are released one interval apart.
    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut last_start = self.last_start.lock().await;
        if let Some(deadline) = last_start.and_then(|last| last.checked_add(self.interval)) {
            tokio::time::sleep_until(deadline.into()).await;
        }
        *last_start = Some(Instant::now());
    }
}

/// Records produced by one block
#[derive(Debug)]
struct ProcessedBlock {
    records: Vec<TransactionRecord>,
    skipped: u64,
    malformed: Vec<String>,
}

/// Main ETL Pipeline
pub struct Pipeline<R> {
    reader: R,
    database: Database,
    extractor: TransactionExtractor,
    config: PipelineConfig,
}

impl<R: ChainReader> Pipeline<R> {
    /// Create a new pipeline instance
    pub fn new(reader: R, database: Database, config: PipelineConfig) -> Self {
        Self { reader, database, extractor: TransactionExtractor::default(), config }
    }

    pub fn with_extractor(mut self, extractor: TransactionExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Run the pipeline for the configured block range.
    ///
    /// `cancel` is checked before each block is started; records of finished
    /// blocks are committed before returning. Store failures and, under
    /// `FailurePolicy::Abort`, exhausted retries end the run with an error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let mut stats = PipelineStats::new();
        let range = self.config.range;

        tracing::info!("Starting pipeline for blocks {} ({} blocks)", range, range.len());

        let mut batch = RecordBatch::new(self.config.batch_size);
        let throttle = Throttle::new(self.config.rate_limit);
        let throttle = &throttle;
        let cancelled = cancel.clone();

        let mut blocks = stream::iter(range.iter())
            .take_while(move |_| future::ready(!cancelled.is_cancelled()))
            .map(move |number| async move { (number, self.process_block(number, throttle).await) })
            .buffered(self.config.concurrency.max(1));

        while let Some((number, result)) = blocks.next().await {
            stats.blocks_attempted += 1;

            match result {
                Ok(processed) => {
                    stats.blocks_succeeded += 1;
                    stats.transactions_processed += processed.records.len() as u64;
                    stats.transactions_skipped += processed.skipped;
                    for message in processed.malformed {
                        stats.record_error(PipelineError { stage: PipelineStage::Transform, block: Some(number), message });
                    }
                    batch.push_block(processed.records);
                }
                Err(e) if e.is_skippable() => {
                    stats.blocks_missing += 1;
                    tracing::info!("Skipping block {}: {}", number, e);
                }
                Err(e) => {
                    stats.blocks_failed += 1;
                    stats.record_error(PipelineError {
                        stage: PipelineStage::Extract,
                        block: Some(number),
                        message: e.to_string(),
                    });

                    match self.config.failure_policy {
                        FailurePolicy::Skip => tracing::warn!("Skipping block {}: {}", number, e),
                        FailurePolicy::Abort => {
                            tracing::error!("Aborting run at block {}: {}", number, e);
                            self.load(&mut batch, &mut stats).await?;
                            return Err(e);
                        }
                    }
                }
            }

            if batch.is_full() {
                self.load(&mut batch, &mut stats).await?;
            }
        }

        self.load(&mut batch, &mut stats).await?;

        if cancel.is_cancelled() && stats.blocks_attempted < range.len() {
            stats.cancelled = true;
            tracing::warn!("Pipeline cancelled after {} of {} blocks", stats.blocks_attempted, range.len());
        }

        stats.elapsed_time = start_time.elapsed();
        tracing::info!(
            "Pipeline finished: {} blocks attempted, {} rows inserted",
            stats.blocks_attempted,
            stats.transactions_inserted
        );

        Ok(stats)
    }

    /// Extract and transform a single block
    async fn process_block(&self, number: u64, throttle: &Throttle) -> Result<ProcessedBlock> {
        throttle.wait().await;

        let extracted = extract_block(&self.reader, number, &self.config.retry).await?;

        let mut records = Vec::with_capacity(extracted.transactions.len());
        let mut malformed = Vec::new();

        for tx in &extracted.transactions {
            match self.extractor.extract(&extracted.block, tx) {
                Ok(record) => records.push(record),
                Err(e) if e.is_skippable() => {
                    tracing::warn!("Skipping transaction in block {}: {}", number, e);
                    malformed.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ProcessedBlock { skipped: (extracted.skipped + malformed.len()) as u64, records, malformed })
    }

    /// Write the pending batch; a store failure is fatal for the run
    async fn load(&self, batch: &mut RecordBatch, stats: &mut PipelineStats) -> Result<()> {
        match batch.flush(&self.database).await {
            Ok(inserted) => {
                stats.transactions_inserted += inserted;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to store {} records: {}", batch.len(), e);
                stats.record_error(PipelineError { stage: PipelineStage::Load, block: None, message: e.to_string() });
                Err(e)
            }
        }
    }
}

/// Print final statistics
pub fn print_final_stats(stats: &PipelineStats) {
    println!("\n📊 Pipeline Statistics:");
    println!("   ⏱️  Total time: {:.2}s", stats.elapsed_time.as_secs_f64());
    println!(
        "   📦 Blocks: {} attempted, {} succeeded, {} missing, {} failed",
        stats.blocks_attempted, stats.blocks_succeeded, stats.blocks_missing, stats.blocks_failed
    );
    println!("   ✅ Success rate: {:.1}%", stats.success_rate());
    println!("   📝 Transactions processed: {} ({} skipped)", stats.transactions_processed, stats.transactions_skipped);
    println!("   💾 Rows inserted: {}", stats.transactions_inserted);
    println!("   ⚡ Speed: {:.2} blocks/sec", stats.blocks_per_second());
    println!("   ⚡ Throughput: {:.0} txs/sec", stats.transactions_per_second());

    if stats.cancelled {
        println!("   🛑 Cancelled before the end of the range");
    }

    if stats.error_count > 0 {
        println!("\n❌ Errors encountered: {}", stats.error_count);
        for (i, error) in stats.errors.iter().enumerate() {
            println!("   {}. [{}] Block {:?}: {}", i + 1, error.stage, error.block, error.message);
        }
        let unlisted = stats.error_count - stats.errors.len() as u64;
        if unlisted > 0 {
            println!("   ... and {} more errors", unlisted);
        }
    }
}
