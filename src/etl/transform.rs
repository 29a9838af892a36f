/// Transform Module
///
/// Maps raw chain data onto normalized `TransactionRecord`s. Amounts are scaled
/// from base units with exact decimal arithmetic; floats never touch a value.
use crate::error::{Error, Result};
use crate::models::{BlockInfo, TransactionInfo, TransactionRecord};
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint};

/// wei -> ether
pub const ETHER_DECIMALS: u32 = 18;
/// wei -> gwei
pub const GWEI_DECIMALS: u32 = 9;

/// Scale an integer amount of base units down by `10^decimals`
pub fn scale_base_units(amount: &BigUint, decimals: u32) -> BigDecimal {
    BigDecimal::new(BigInt::from(amount.clone()), i64::from(decimals)).normalized()
}

/// Builds store records from a block and its transactions
#[derive(Debug, Clone, Copy)]
pub struct TransactionExtractor {
    value_decimals: u32,
    gas_price_decimals: u32,
}

impl Default for TransactionExtractor {
    fn default() -> Self {
        Self { value_decimals: ETHER_DECIMALS, gas_price_decimals: GWEI_DECIMALS }
    }
}

impl TransactionExtractor {
    pub fn new(value_decimals: u32, gas_price_decimals: u32) -> Self {
        Self { value_decimals, gas_price_decimals }
    }

    /// Normalize one transaction of `block`.
    ///
    /// Fails with `MalformedTransaction` when a required field is absent or the
    /// transaction claims to live in another block.
    pub fn extract(&self, block: &BlockInfo, tx: &TransactionInfo) -> Result<TransactionRecord> {
        let hash = tx.hash.clone().ok_or_else(|| malformed(None, "missing hash"))?;
        let missing = |field: &str| malformed(Some(hash.as_str()), &format!("missing {}", field));

        if let Some(number) = tx.block_number {
            if number != block.number {
                return Err(malformed(
                    Some(hash.as_str()),
                    &format!("reported in block {} but listed in block {}", number, block.number),
                ));
            }
        }

        let transaction_index = tx.transaction_index.ok_or_else(|| missing("transactionIndex"))?;
        let from_address = tx.from.clone().ok_or_else(|| missing("from"))?;
        let value = tx.value.as_ref().ok_or_else(|| missing("value"))?;
        let gas_price = tx.gas_price.as_ref().ok_or_else(|| missing("gasPrice"))?;
        let gas = tx.gas.ok_or_else(|| missing("gas"))?;

        Ok(TransactionRecord {
            block_number: block.number,
            transaction_index,
            hash,
            from_address,
            to_address: tx.to.clone(),
            value: scale_base_units(value, self.value_decimals),
            gas_price: scale_base_units(gas_price, self.gas_price_decimals),
            gas_used: gas,
            timestamp: block.timestamp,
        })
    }
}

fn malformed(hash: Option<&str>, reason: &str) -> Error {
    Error::MalformedTransaction { hash: hash.map(str::to_string), reason: reason.to_string() }
}
