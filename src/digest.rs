use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest as _, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::error::{MerkleError, Result};

/// Width in bytes of every node in the tree.
pub const DIGEST_LEN: usize = 32;

/// A 32-byte Keccak256 output stored at every tree node.
///
/// Ordering is plain byte order, which is what pair and leaf sorting use.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub const ZERO: Digest = Digest([0u8; DIGEST_LEN]);

    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; DIGEST_LEN] {
        self.0
    }

    /// Keccak256 of arbitrary bytes.
    pub fn keccak256(data: impl AsRef<[u8]>) -> Self {
        Self(Keccak256::digest(data.as_ref()).into())
    }

    /// Parses a digest from a hex string.
    ///
    /// # Arguments
    /// * `hex_str` - 64 hex characters, with or without "0x" prefix
    ///
    /// # Errors
    /// Returns `InvalidProofFormat` if the string is not exactly 32 bytes of hex
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim();
        let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if cleaned.len() != DIGEST_LEN * 2 {
            return Err(MerkleError::InvalidProofFormat(format!(
                "expected {} hex chars, got {}",
                DIGEST_LEN * 2,
                cleaned.len()
            )));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(cleaned, &mut bytes).map_err(|e| {
            MerkleError::InvalidProofFormat(format!("invalid hex encoding: {}", e))
        })?;
        Ok(Self(bytes))
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Keccak256 over two digests concatenated in the order given.
pub fn keccak256_pair(left: &Digest, right: &Digest) -> Digest {
    let hash = Keccak256::new()
        .chain_update(left.0)
        .chain_update(right.0)
        .finalize();
    Digest(hash.into())
}

/// Hashes two children into their parent.
///
/// With `sort_pairs` the smaller digest goes first, so the result does not
/// depend on which side each child sits on.
pub fn hash_pair(left: &Digest, right: &Digest, sort_pairs: bool) -> Digest {
    if sort_pairs && right < left {
        keccak256_pair(right, left)
    } else {
        keccak256_pair(left, right)
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Digest {
    type Err = MerkleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(0x{})", hex::encode(self.0))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(de::Error::custom)
    }
}
