/// Load Module
///
/// Accumulates normalized records block by block and writes them to the store
/// in one transaction once enough blocks have been collected.
use crate::db::Database;
use crate::error::Result;
use crate::models::TransactionRecord;

#[derive(Debug)]
pub struct RecordBatch {
    records: Vec<TransactionRecord>,
    blocks: usize,
    flush_every: usize,
}

impl RecordBatch {
    /// Batch that reports full after `flush_every` blocks (at least one)
    pub fn new(flush_every: usize) -> Self {
        Self { records: Vec::new(), blocks: 0, flush_every: flush_every.max(1) }
    }

    /// Add the records of one processed block
    pub fn push_block(&mut self, records: Vec<TransactionRecord>) {
        self.records.extend(records);
        self.blocks += 1;
    }

    pub fn is_full(&self) -> bool {
        self.blocks >= self.flush_every
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist the pending records and clear the batch.
    ///
    /// Returns the number of rows actually inserted; duplicates count as zero.
    /// On error the pending records are kept.
    pub async fn flush(&mut self, database: &Database) -> Result<u64> {
        if self.records.is_empty() {
            self.blocks = 0;
            return Ok(0);
        }

        let inserted = database.insert_batch(&self.records).await?;
        tracing::debug!(
            "Flushed {} blocks: {} records, {} new rows",
            self.blocks,
            self.records.len(),
            inserted
        );

        self.records.clear();
        self.blocks = 0;
        Ok(inserted)
    }
}
