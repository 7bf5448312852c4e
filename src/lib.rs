//! Keccak256 Merkle trees for airdrop allow-lists.
//!
//! Records are hashed into leaves, the leaves are built into a static tree
//! whose root gets published, and each claimant is handed an inclusion proof
//! that anyone can check against that root. Tree shape is fixed by a
//! [`MerklePolicy`] which must be the same on the building and verifying side.
#![forbid(unsafe_code)]

pub mod digest;
pub mod error;
pub mod policy;
pub mod proof;
pub mod record;
pub mod tree;

pub use digest::{hash_pair, keccak256_pair, Digest, DIGEST_LEN};
pub use error::{MerkleError, Result};
pub use policy::{MerklePolicy, OddNodePolicy};
pub use proof::{verify, verify_batch, verify_hex, Position, Proof, ProofNode};
pub use record::{hash_records, Keccak256LeafHasher, LeafHasher, Record};
pub use tree::MerkleTree;
