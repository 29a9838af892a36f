/// Data Models Module
///
/// This module defines the core data structures used throughout the application.
/// Raw chain types (`BlockInfo`, `TransactionInfo`) mirror what the node returns in
/// base units; `TransactionRecord` is the normalized row persisted to the store.
use bigdecimal::BigDecimal;
use num_bigint::BigUint;
use serde::Deserialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Block header data needed for ingestion, as returned by the node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockInfo {
    #[serde(deserialize_with = "quantity::u64")]
    pub number: u64,
    #[serde(deserialize_with = "quantity::u64")]
    pub timestamp: u64,
    /// Transaction hashes in the block's native order
    #[serde(default)]
    pub transactions: Vec<String>,
}

/// Raw transaction as returned by the node, amounts in base units.
///
/// Every field is optional at this boundary; the transform stage decides which
/// ones are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "quantity::opt_u64")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt_u64")]
    pub transaction_index: Option<u64>,
    pub from: Option<String>,
    /// `None` for contract creation
    pub to: Option<String>,
    #[serde(default, deserialize_with = "quantity::opt_big")]
    pub value: Option<BigUint>,
    #[serde(default, deserialize_with = "quantity::opt_big")]
    pub gas_price: Option<BigUint>,
    /// Gas limit supplied by the sender
    #[serde(default, deserialize_with = "quantity::opt_u64")]
    pub gas: Option<u64>,
}

/// Normalized transaction row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub block_number: u64,
    pub transaction_index: u64,
    pub hash: String,
    pub from_address: String,
    pub to_address: Option<String>,
    /// Ether-scaled
    pub value: BigDecimal,
    /// Gwei-scaled
    pub gas_price: BigDecimal,
    /// Holds the transaction's gas limit, see DESIGN.md
    pub gas_used: u64,
    pub timestamp: u64,
}

/// Winner of the volume aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxVolumeBlock {
    pub block_number: u64,
    pub total_value: BigDecimal,
}

/// Inclusive window of Unix timestamps (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Inclusive block range written as `<start>-<end>`.
///
/// `start > end` is a valid, empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Range covering every block number
    pub fn unbounded() -> Self {
        Self { start: 0, end: u64::MAX }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of blocks in the range
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    pub fn iter(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for BlockRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) =
            s.split_once('-').ok_or_else(|| format!("expected <start>-<end>, got {:?}", s))?;
        let start = start.trim().parse::<u64>().map_err(|e| format!("invalid start block {:?}: {}", start, e))?;
        let end = end.trim().parse::<u64>().map_err(|e| format!("invalid end block {:?}: {}", end, e))?;

        Ok(Self { start, end })
    }
}

/// Hex quantity decoding for JSON-RPC payloads ("0x1b4")
pub(crate) mod quantity {
    use num_bigint::BigUint;
    use serde::{de::Error as _, Deserialize, Deserializer};

    fn digits(s: &str) -> Result<&str, String> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| format!("quantity {:?} is missing the 0x prefix", s))?;
        if digits.is_empty() {
            return Err(format!("quantity {:?} has no digits", s));
        }
        Ok(digits)
    }

    pub fn parse_u64(s: &str) -> Result<u64, String> {
        u64::from_str_radix(digits(s)?, 16).map_err(|e| format!("quantity {:?}: {}", s, e))
    }

    pub fn parse_big(s: &str) -> Result<BigUint, String> {
        BigUint::parse_bytes(digits(s)?.as_bytes(), 16).ok_or_else(|| format!("quantity {:?} is not hex", s))
    }

    pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_u64(&s).map_err(D::Error::custom)
    }

    pub fn opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Option::<String>::deserialize(deserializer)?.map(|s| parse_u64(&s).map_err(D::Error::custom)).transpose()
    }

    pub fn opt_big<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BigUint>, D::Error> {
        Option::<String>::deserialize(deserializer)?.map(|s| parse_big(&s).map_err(D::Error::custom)).transpose()
    }
}
