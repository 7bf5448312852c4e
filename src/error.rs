use thiserror::Error;

use crate::digest::Digest;

/// Failures reported by tree construction, proof generation and proof parsing.
///
/// A proof that simply does not match a root is not an error; verification
/// returns `false` for that case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// The record could not be turned into canonical bytes.
    #[error("record encoding failed: {0}")]
    Encoding(String),

    /// A tree needs at least one leaf.
    #[error("cannot build a Merkle tree from zero leaves")]
    EmptyInput,

    /// The requested leaf is not part of layer 0.
    #[error("leaf {0} not found in tree")]
    LeafNotFound(Digest),

    /// A proof was requested for a leaf position past the end of layer 0.
    #[error("leaf index {index} is out of bounds for tree with {leaf_count} leaves")]
    LeafIndexOutOfBounds { index: usize, leaf_count: usize },

    /// The proof (or a digest supplied with it) is structurally malformed.
    #[error("invalid proof format: {0}")]
    InvalidProofFormat(String),
}

pub type Result<T> = std::result::Result<T, MerkleError>;
