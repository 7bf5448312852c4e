use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::digest::{hash_pair, Digest};
use crate::error::{MerkleError, Result};
use crate::policy::{MerklePolicy, OddNodePolicy};
use crate::proof::{verify, Position, Proof, ProofNode};
use crate::record::{hash_records, LeafHasher, Record};

/// A fully built, immutable Merkle tree.
///
/// `layers[0]` holds the leaves (sorted when the policy asks for it) and the
/// last layer holds exactly one digest, the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    layers: Vec<Vec<Digest>>,
    policy: MerklePolicy,
}

fn parent_layer(level: &[Digest], policy: &MerklePolicy) -> Vec<Digest> {
    let combine = |chunk: &[Digest]| match chunk {
        [left, right] => hash_pair(left, right, policy.sort_pairs),
        [lone] => match policy.odd_node {
            OddNodePolicy::Promote => *lone,
            OddNodePolicy::Duplicate => hash_pair(lone, lone, policy.sort_pairs),
        },
        _ => unreachable!("chunks(2) yields one or two nodes"),
    };

    #[cfg(feature = "parallel")]
    let next = level.par_chunks(2).map(combine).collect();
    #[cfg(not(feature = "parallel"))]
    let next = level.chunks(2).map(combine).collect();
    next
}

impl MerkleTree {
    /// Builds the tree bottom-up from leaf digests.
    ///
    /// # Errors
    /// Returns `EmptyInput` if `leaves` is empty
    pub fn build(leaves: &[Digest], policy: MerklePolicy) -> Result<Self> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let mut level = leaves.to_vec();
        if policy.sort_leaves {
            level.sort_unstable();
        }

        let mut layers = vec![level];
        while let Some(level) = layers.last().filter(|level| level.len() > 1) {
            let next_level = parent_layer(level, &policy);
            trace!(
                layer = layers.len(),
                nodes = next_level.len(),
                "built tree layer"
            );
            layers.push(next_level);
        }

        let tree = Self { layers, policy };
        debug!(
            leaves = tree.leaf_count(),
            depth = tree.depth(),
            root = %tree.root(),
            "built Merkle tree"
        );
        Ok(tree)
    }

    /// Hashes `records` with `hasher`, then builds the tree.
    pub fn from_records<H: LeafHasher + ?Sized>(
        records: &[Record],
        hasher: &H,
        policy: MerklePolicy,
    ) -> Result<Self> {
        let leaves = hash_records(hasher, records)?;
        Self::build(&leaves, policy)
    }

    pub fn root(&self) -> Digest {
        // build() never produces an empty top layer
        self.layers
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn hex_root(&self) -> String {
        self.root().to_hex()
    }

    pub fn layers(&self) -> &[Vec<Digest>] {
        &self.layers
    }

    pub fn leaves(&self) -> &[Digest] {
        &self.layers[0]
    }

    pub fn hex_leaves(&self) -> Vec<String> {
        self.leaves().iter().map(Digest::to_hex).collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of hashing layers above the leaves; 0 for a single-leaf tree.
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn policy(&self) -> &MerklePolicy {
        &self.policy
    }

    /// Position of the first occurrence of `leaf` in layer 0.
    pub fn leaf_index(&self, leaf: &Digest) -> Option<usize> {
        self.leaves().iter().position(|l| l == leaf)
    }

    /// Inclusion proof for `leaf`. Duplicated leaves are proven at their first
    /// position.
    ///
    /// # Errors
    /// Returns `LeafNotFound` if `leaf` is not in layer 0
    pub fn prove(&self, leaf: &Digest) -> Result<Proof> {
        let index = self
            .leaf_index(leaf)
            .ok_or(MerkleError::LeafNotFound(*leaf))?;
        self.prove_index(index)
    }

    /// Inclusion proof for the leaf at `leaf_index` in layer 0.
    ///
    /// # Errors
    /// Returns `LeafIndexOutOfBounds` if the index is past the last leaf
    pub fn prove_index(&self, leaf_index: usize) -> Result<Proof> {
        if leaf_index >= self.leaf_count() {
            return Err(MerkleError::LeafIndexOutOfBounds {
                index: leaf_index,
                leaf_count: self.leaf_count(),
            });
        }

        let mut nodes = Vec::with_capacity(self.depth());
        let mut current_index = leaf_index;

        for level in &self.layers[..self.layers.len() - 1] {
            let sibling_index = current_index ^ 1;
            if let Some(sibling) = level.get(sibling_index) {
                let position = if current_index % 2 == 0 {
                    Position::Right
                } else {
                    Position::Left
                };
                nodes.push(ProofNode::new(*sibling, position));
            } else if self.policy.odd_node == OddNodePolicy::Duplicate {
                nodes.push(ProofNode::new(level[current_index], Position::Right));
            }
            current_index /= 2;
        }

        debug!(leaf_index, proof_len = nodes.len(), "generated Merkle proof");
        Ok(Proof::new(nodes))
    }

    /// `0x`-prefixed sibling list for `leaf`.
    pub fn hex_proof(&self, leaf: &Digest) -> Result<Vec<String>> {
        Ok(self.prove(leaf)?.to_hex())
    }

    /// One proof per layer-0 position, in leaf order.
    pub fn proofs(&self) -> Result<Vec<Proof>> {
        #[cfg(feature = "parallel")]
        let proofs = (0..self.leaf_count())
            .into_par_iter()
            .map(|i| self.prove_index(i))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let proofs = (0..self.leaf_count()).map(|i| self.prove_index(i)).collect();
        proofs
    }

    /// Checks `proof` for `leaf` against this tree's root and policy.
    pub fn verify(&self, proof: &Proof, leaf: &Digest) -> bool {
        verify(proof, leaf, &self.root(), &self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::keccak256_pair;

    fn leaves(n: u8) -> Vec<Digest> {
        (1..=n).map(|i| Digest::from_bytes([i; 32])).collect()
    }

    #[test]
    fn test_build_empty() {
        let result = MerkleTree::build(&[], MerklePolicy::default());
        assert!(matches!(result, Err(MerkleError::EmptyInput)));
    }

    #[test]
    fn test_build_single_leaf() {
        let tree = MerkleTree::build(&leaves(1), MerklePolicy::default()).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), Digest::from_bytes([1u8; 32]));
        let proof = tree.prove(&tree.root()).unwrap();
        assert!(proof.is_empty());
        assert!(tree.verify(&proof, &tree.root()));
    }

    #[test]
    fn test_build_two_leaves() {
        let input = leaves(2);
        let tree = MerkleTree::build(&input, MerklePolicy::default()).unwrap();
        assert_eq!(tree.root(), keccak256_pair(&input[0], &input[1]));
    }

    #[test]
    fn test_layer_sizes() {
        let tree = MerkleTree::build(&leaves(5), MerklePolicy::default()).unwrap();
        let sizes: Vec<usize> = tree.layers().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 3, 2, 1]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_odd_node_promoted_unchanged() {
        let input = leaves(3);
        let tree = MerkleTree::build(&input, MerklePolicy::default()).unwrap();
        assert_eq!(tree.layers()[1][1], input[2]);
        let expected = hash_pair(&keccak256_pair(&input[0], &input[1]), &input[2], true);
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_odd_node_duplicated() {
        let input = leaves(3);
        let policy = MerklePolicy::default().with_odd_node(OddNodePolicy::Duplicate);
        let tree = MerkleTree::build(&input, policy).unwrap();
        assert_eq!(tree.layers()[1][1], keccak256_pair(&input[2], &input[2]));

        let promoted = MerkleTree::build(&input, MerklePolicy::default()).unwrap();
        assert_ne!(tree.root(), promoted.root());
    }

    #[test]
    fn test_prove_skips_promoted_layer() {
        let input = leaves(3);
        let tree = MerkleTree::build(&input, MerklePolicy::default()).unwrap();
        let proof = tree.prove(&input[2]).unwrap();
        assert_eq!(proof.len(), 1);
        assert_eq!(proof.nodes()[0].sibling, tree.layers()[1][0]);
        assert!(tree.verify(&proof, &input[2]));
    }

    #[test]
    fn test_prove_duplicate_policy_includes_self() {
        let input = leaves(3);
        let policy = MerklePolicy::default().with_odd_node(OddNodePolicy::Duplicate);
        let tree = MerkleTree::build(&input, policy).unwrap();
        let proof = tree.prove(&input[2]).unwrap();
        assert_eq!(proof.len(), 2);
        assert_eq!(proof.nodes()[0].sibling, input[2]);
        assert!(tree.verify(&proof, &input[2]));
    }

    #[test]
    fn test_prove_leaf_not_found() {
        let tree = MerkleTree::build(&leaves(4), MerklePolicy::default()).unwrap();
        let missing = Digest::from_bytes([9u8; 32]);
        assert_eq!(tree.prove(&missing), Err(MerkleError::LeafNotFound(missing)));
    }

    #[test]
    fn test_prove_index_out_of_bounds() {
        let tree = MerkleTree::build(&leaves(2), MerklePolicy::default()).unwrap();
        assert_eq!(
            tree.prove_index(5),
            Err(MerkleError::LeafIndexOutOfBounds {
                index: 5,
                leaf_count: 2
            })
        );
    }

    #[test]
    fn test_duplicate_leaf_proves_first_position() {
        let mut input = leaves(3);
        input.push(input[0]);
        let tree = MerkleTree::build(&input, MerklePolicy::default()).unwrap();
        assert_eq!(tree.leaf_index(&input[0]), Some(0));
        let proof = tree.prove(&input[0]).unwrap();
        assert_eq!(proof, tree.prove_index(0).unwrap());
        assert!(tree.verify(&proof, &input[0]));
    }

    #[test]
    fn test_sorted_root_ignores_insertion_order() {
        let input = leaves(7);
        let mut reversed = input.clone();
        reversed.reverse();
        let a = MerkleTree::build(&input, MerklePolicy::default()).unwrap();
        let b = MerkleTree::build(&reversed, MerklePolicy::default()).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_ordered_policy_keeps_insertion_order() {
        let input = leaves(4);
        let mut swapped = input.clone();
        swapped.swap(0, 3);
        let a = MerkleTree::build(&input, MerklePolicy::ordered()).unwrap();
        let b = MerkleTree::build(&swapped, MerklePolicy::ordered()).unwrap();
        assert_eq!(a.leaves(), input.as_slice());
        assert_ne!(a.root(), b.root());
        for (i, proof) in b.proofs().unwrap().iter().enumerate() {
            assert!(b.verify(proof, &swapped[i]));
        }
    }

    #[test]
    fn test_proofs_cover_every_leaf() {
        let tree = MerkleTree::build(&leaves(9), MerklePolicy::default()).unwrap();
        let proofs = tree.proofs().unwrap();
        assert_eq!(proofs.len(), 9);
        for (leaf, proof) in tree.leaves().iter().zip(&proofs) {
            assert!(tree.verify(proof, leaf));
        }
    }

    #[test]
    fn test_hex_accessors() {
        let tree = MerkleTree::build(&leaves(2), MerklePolicy::default()).unwrap();
        assert_eq!(tree.hex_root(), tree.root().to_hex());
        assert_eq!(tree.hex_leaves().len(), 2);
        let hex_proof = tree.hex_proof(&tree.leaves()[0]).unwrap();
        assert_eq!(hex_proof, vec![tree.leaves()[1].to_hex()]);
    }
}
