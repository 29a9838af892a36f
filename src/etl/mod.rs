/// ETL Module
///
/// The per-block stages of the ingestion pipeline:
/// - Extract: Fetch a block and its transactions from the node
/// - Transform: Validate and normalize transactions into store records
/// - Load: Batch records into the transactions table
pub mod extract;
pub mod load;
pub mod transform;
