/// Block Crawler
///
/// Walks a block range of an EVM chain, normalizes every transaction and stores
/// it in a local SQLite table, then answers volume queries over the stored rows.
pub mod aggregate;
pub mod cli;
pub mod db;
pub mod error;
pub mod etl;
pub mod models;
pub mod pipeline;
pub mod rpc;

pub use error::{Error, Result};
