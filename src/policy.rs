use serde::{Deserialize, Serialize};

use crate::error::{MerkleError, Result};

/// What to do with the last node of a layer that has an odd number of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddNodePolicy {
    /// Carry the lone node to the next layer unchanged.
    #[default]
    Promote,
    /// Hash the lone node with itself.
    Duplicate,
}

/// Tree shape rules shared by the builder and the verifier.
///
/// The default matches merkletreejs with `sortPairs: true` plus sorted
/// leaves, so the root depends only on the multiset of leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerklePolicy {
    pub sort_leaves: bool,
    pub sort_pairs: bool,
    pub odd_node: OddNodePolicy,
}

impl Default for MerklePolicy {
    fn default() -> Self {
        Self {
            sort_leaves: true,
            sort_pairs: true,
            odd_node: OddNodePolicy::Promote,
        }
    }
}

impl MerklePolicy {
    /// Positional tree: leaves keep insertion order and pairs are hashed
    /// left-to-right. Proofs need their position flags to verify.
    pub fn ordered() -> Self {
        Self {
            sort_leaves: false,
            sort_pairs: false,
            odd_node: OddNodePolicy::Promote,
        }
    }

    pub fn with_odd_node(mut self, odd_node: OddNodePolicy) -> Self {
        self.odd_node = odd_node;
        self
    }

    /// Loads a policy from a JSON document. Missing fields fall back to the
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MerkleError::Encoding(format!("invalid policy document: {}", e)))
    }
}
