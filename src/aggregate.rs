/// Aggregate Module
///
/// The query layer: finds the block with the highest transferred volume inside
/// a caller-supplied block sub-range and time window.
use crate::db::Database;
use crate::error::Result;
use crate::models::{BlockRange, MaxVolumeBlock, TimeWindow};

/// Parameters of the volume query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeQuery {
    pub blocks: BlockRange,
    pub window: TimeWindow,
}

/// Result of a volume query. Only store failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Found(MaxVolumeBlock),
    NoData,
    TableMissing,
}

pub struct Aggregator<'a> {
    database: &'a Database,
}

impl<'a> Aggregator<'a> {
    pub fn new(database: &'a Database) -> Self {
        Self { database }
    }

    pub async fn max_volume_block(&self, query: VolumeQuery) -> Result<QueryOutcome> {
        if !self.database.table_exists().await? {
            tracing::warn!("transactions table does not exist");
            return Ok(QueryOutcome::TableMissing);
        }

        let outcome = match self.database.query_max_volume_block(query.blocks, query.window).await? {
            Some(block) => QueryOutcome::Found(block),
            None => QueryOutcome::NoData,
        };

        tracing::debug!("Volume query over blocks {} and window {:?}: {:?}", query.blocks, query.window, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{open_temp, record_at};
    use bigdecimal::BigDecimal;

    #[tokio::test]
    async fn test_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("empty.db")).await.unwrap();

        let query = VolumeQuery { blocks: BlockRange::unbounded(), window: TimeWindow::new(0, 2000) };
        let outcome = Aggregator::new(&database).max_volume_block(query).await.unwrap();

        assert_eq!(outcome, QueryOutcome::TableMissing);
    }

    #[tokio::test]
    async fn test_no_data() {
        let (_dir, database) = open_temp().await;

        let query = VolumeQuery { blocks: BlockRange::new(100, 200), window: TimeWindow::new(0, 2000) };
        let outcome = Aggregator::new(&database).max_volume_block(query).await.unwrap();

        assert_eq!(outcome, QueryOutcome::NoData);
    }

    #[tokio::test]
    async fn test_caller_supplied_sub_range() {
        let (_dir, database) = open_temp().await;
        database
            .insert_batch(&[record_at("0xa", 100, 5, 1000), record_at("0xb", 100, 3, 1000), record_at("0xc", 101, 50, 1000)])
            .await
            .unwrap();
        let aggregator = Aggregator::new(&database);
        let window = TimeWindow::new(0, 2000);

        let excluded = aggregator.max_volume_block(VolumeQuery { blocks: BlockRange::new(100, 100), window }).await.unwrap();
        assert_eq!(
            excluded,
            QueryOutcome::Found(MaxVolumeBlock { block_number: 100, total_value: BigDecimal::from(8) })
        );

        let included = aggregator.max_volume_block(VolumeQuery { blocks: BlockRange::new(100, 101), window }).await.unwrap();
        assert_eq!(
            included,
            QueryOutcome::Found(MaxVolumeBlock { block_number: 101, total_value: BigDecimal::from(50) })
        );
    }
}
