use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::digest::{hash_pair, Digest};
use crate::error::{MerkleError, Result};
use crate::policy::MerklePolicy;

/// Side on which a proof sibling sits relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Right => "right",
        }
    }
}

/// One step of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofNode {
    pub sibling: Digest,
    pub position: Position,
}

impl ProofNode {
    pub fn new(sibling: Digest, position: Position) -> Self {
        Self { sibling, position }
    }
}

/// Sibling path from a leaf up to the root, leaf side first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof {
    nodes: Vec<ProofNode>,
}

impl Proof {
    pub fn new(nodes: Vec<ProofNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[ProofNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bare `0x`-prefixed sibling list. Positions are dropped, so the result
    /// only verifies under a sorted-pairs policy.
    pub fn to_hex(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.sibling.to_hex()).collect()
    }

    /// Parses a proof serialized as `[{"sibling": "0x..", "position": "left"}, ..]`.
    ///
    /// # Errors
    /// Returns `InvalidProofFormat` on any malformed entry
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MerkleError::InvalidProofFormat(e.to_string()))
    }

    /// Same shape [`Proof::from_json`] reads.
    pub fn to_json(&self) -> String {
        // hex digits and position names never need JSON escaping
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|n| {
                format!(
                    r#"{{"sibling":"{}","position":"{}"}}"#,
                    n.sibling.to_hex(),
                    n.position.as_str()
                )
            })
            .collect();
        format!("[{}]", nodes.join(","))
    }

    /// Recomputes the root implied by this proof for `leaf`.
    pub fn compute_root(&self, leaf: &Digest, policy: &MerklePolicy) -> Digest {
        self.nodes
            .iter()
            .fold(*leaf, |running, node| match node.position {
                Position::Left => hash_pair(&node.sibling, &running, policy.sort_pairs),
                Position::Right => hash_pair(&running, &node.sibling, policy.sort_pairs),
            })
    }
}

/// Returns true iff `proof` leads from `leaf` to `root` under `policy`.
///
/// A wrong proof, leaf or root yields `false`, never an error.
///
/// `leaf` must come from a [`LeafHasher`](crate::record::LeafHasher) run by
/// the caller. With sorted pairs an internal node together with the upper
/// part of a proof also reaches the root, so a bare digest handed over by
/// someone else proves nothing about membership.
pub fn verify(proof: &Proof, leaf: &Digest, root: &Digest, policy: &MerklePolicy) -> bool {
    let computed = proof.compute_root(leaf, policy);
    let valid = computed == *root;
    if !valid {
        debug!(%leaf, %root, %computed, "Merkle proof did not match root");
    }
    valid
}

/// Verifies a bare hex sibling list, as produced by [`Proof::to_hex`].
///
/// # Errors
/// Returns `InvalidProofFormat` if any digest string is malformed, or if the
/// policy does not sort pairs (bare lists carry no positions)
pub fn verify_hex<S: AsRef<str>>(
    proof: &[S],
    leaf: &str,
    root: &str,
    policy: &MerklePolicy,
) -> Result<bool> {
    if !policy.sort_pairs {
        return Err(MerkleError::InvalidProofFormat(
            "hex proofs carry no positions; policy must sort pairs".into(),
        ));
    }
    let nodes = proof
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Digest::from_hex(s.as_ref())
                .map(|sibling| ProofNode::new(sibling, Position::Right))
                .map_err(|e| MerkleError::InvalidProofFormat(format!("proof entry {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    let leaf = Digest::from_hex(leaf)?;
    let root = Digest::from_hex(root)?;
    Ok(verify(&Proof::new(nodes), &leaf, &root, policy))
}

/// Verifies many `(proof, leaf)` pairs against one root, preserving order.
pub fn verify_batch(items: &[(Proof, Digest)], root: &Digest, policy: &MerklePolicy) -> Vec<bool> {
    #[cfg(feature = "parallel")]
    let results = items
        .par_iter()
        .map(|(proof, leaf)| verify(proof, leaf, root, policy))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results = items
        .iter()
        .map(|(proof, leaf)| verify(proof, leaf, root, policy))
        .collect();
    results
}
