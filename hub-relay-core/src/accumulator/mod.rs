//! Bundle accumulator.
//!
//! Bundles are committed as a keccak256 Merkle tree over their message ids in
//! insertion order. A bundle of `n` leaves uses a tree of depth
//! `ceil(log2(n))`; positions past the last leaf hold zero subtrees, so an odd
//! node is always paired with the zero hash of its height. A single-leaf
//! bundle has depth 0 and its root is the leaf itself.

use once_cell::sync::Lazy;
use sha3::{Digest, Keccak256};

use crate::H256;

/// Merkle tree, proofs and verification
pub mod merkle;

pub use merkle::*;

/// Maximum depth of a bundle tree. Bundles hold at most `2^TREE_DEPTH` leaves.
pub const TREE_DEPTH: usize = 32;

pub(crate) const EMPTY_SLICE: &[H256] = &[];

/// Hash the concatenation of two words
pub fn hash_concat(left: impl AsRef<[u8]>, right: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(
        Keccak256::new()
            .chain_update(left.as_ref())
            .chain_update(right.as_ref())
            .finalize()
            .as_slice(),
    )
}

/// `ZERO_HASHES[h]` is the root of a zero subtree of height `h`.
pub static ZERO_HASHES: Lazy<[H256; TREE_DEPTH + 1]> = Lazy::new(|| {
    let mut hashes = [H256::zero(); TREE_DEPTH + 1];
    for i in 0..TREE_DEPTH {
        hashes[i + 1] = hash_concat(hashes[i], hashes[i]);
    }
    hashes
});

/// Zero nodes to act as "synthetic" left and right subtrees of other zero nodes.
pub static ZERO_NODES: Lazy<Vec<MerkleTree>> =
    Lazy::new(|| (0..=TREE_DEPTH).map(MerkleTree::Zero).collect());

/// Depth of the tree committing to `total_leaves` leaves.
pub fn tree_depth(total_leaves: usize) -> usize {
    if total_leaves <= 1 {
        0
    } else {
        (usize::BITS - (total_leaves - 1).leading_zeros()) as usize
    }
}
