use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::digest::Digest;
use crate::error::{MerkleError, Result};

/// One allow-list entry: who receives tokens and how many.
///
/// Both fields are held in canonical form; construct through [`Record::new`]
/// or [`Record::from_json_value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    address: String,
    amount: String,
}

impl Record {
    /// Builds a record, normalizing both fields.
    ///
    /// # Arguments
    /// * `address` - Recipient identifier, surrounding whitespace is dropped
    /// * `amount` - Non-negative decimal integer, leading zeros are dropped
    ///
    /// # Errors
    /// Returns `Encoding` if the address is empty or the amount is not a
    /// decimal integer
    pub fn new(address: &str, amount: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(MerkleError::Encoding("address is empty".into()));
        }
        Ok(Self {
            address: address.to_string(),
            amount: canonical_amount(amount)?,
        })
    }

    /// Builds a record from a loosely typed JSON row such as
    /// `{"address": "0x..", "amount": 105}`. Any other key is rejected so
    /// that distinct rows never collapse into one leaf.
    pub fn from_json_value(row: &Value) -> Result<Self> {
        let obj = row
            .as_object()
            .ok_or_else(|| MerkleError::Encoding("record must be a JSON object".into()))?;
        if let Some(key) = obj.keys().find(|k| *k != "address" && *k != "amount") {
            return Err(MerkleError::Encoding(format!("unexpected field `{}`", key)));
        }
        let address = match obj.get("address") {
            Some(Value::String(s)) => s.as_str(),
            Some(_) => return Err(MerkleError::Encoding("address must be a string".into())),
            None => return Err(MerkleError::Encoding("missing field `address`".into())),
        };
        let amount = match obj.get("amount") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    v.to_string()
                } else {
                    return Err(MerkleError::Encoding(format!(
                        "amount {} is not a non-negative integer",
                        n
                    )));
                }
            }
            Some(_) => {
                return Err(MerkleError::Encoding(
                    "amount must be a string or number".into(),
                ))
            }
            None => return Err(MerkleError::Encoding("missing field `amount`".into())),
        };
        Self::new(address, &amount)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// Compact JSON `{"address":"..","amount":".."}` with fixed key order.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MerkleError::Encoding(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Record::from_json_value(&value).map_err(serde::de::Error::custom)
    }
}

fn canonical_amount(amount: &str) -> Result<String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(MerkleError::Encoding("amount is empty".into()));
    }
    if !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MerkleError::Encoding(format!(
            "amount '{}' is not a decimal integer",
            amount
        )));
    }
    let stripped = amount.trim_start_matches('0');
    Ok(if stripped.is_empty() { "0" } else { stripped }.to_string())
}

/// Turns one record into its leaf digest.
pub trait LeafHasher: Send + Sync {
    fn hash(&self, record: &Record) -> Result<Digest>;
}

/// Keccak256 over the record's canonical JSON bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256LeafHasher;

impl LeafHasher for Keccak256LeafHasher {
    fn hash(&self, record: &Record) -> Result<Digest> {
        Ok(Digest::keccak256(record.canonical_bytes()?))
    }
}

/// Hashes every record, preserving input order.
pub fn hash_records<H: LeafHasher + ?Sized>(hasher: &H, records: &[Record]) -> Result<Vec<Digest>> {
    #[cfg(feature = "parallel")]
    let leaves = records.par_iter().map(|r| hasher.hash(r)).collect();
    #[cfg(not(feature = "parallel"))]
    let leaves = records.iter().map(|r| hasher.hash(r)).collect();
    leaves
}
