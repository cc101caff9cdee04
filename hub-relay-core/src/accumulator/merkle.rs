use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    accumulator::{hash_concat, tree_depth, EMPTY_SLICE, TREE_DEPTH, ZERO_HASHES, ZERO_NODES},
    H256,
};

// Some code has been derived from
// https://github.com/sigp/lighthouse/blob/c6baa0eed131c5e8ecc5860778ffc7d4a4c18d2d/consensus/merkle_proof/src/lib.rs#L25
// It has been modified as follows:
//    - variable depth sized to the bundle
//    - use keccak256
//    - remove push-based insertion, bundles are built in one shot
//
// Copyright 2018 Sigma Prime Pty Ltd
// Licensed under the Apache License, Version 2.0
// (http://www.apache.org/licenses/LICENSE-2.0).

/// Right-sparse Merkle tree.
///
/// Efficiently represents a Merkle tree of fixed depth where only the first N
/// indices are populated by non-zero leaves.
#[derive(Debug, PartialEq)]
pub enum MerkleTree {
    /// Leaf node with the hash of its content.
    Leaf(H256),
    /// Internal node with hash, left subtree and right subtree.
    Node(H256, Box<Self>, Box<Self>),
    /// Zero subtree of a given depth.
    ///
    /// It represents a Merkle tree of 2^depth zero leaves.
    Zero(usize),
}

/// Error type for merkle tree ops.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum MerkleTreeError {
    /// A bundle must hold at least one message
    #[error("Cannot build a bundle tree without leaves")]
    Empty,
    /// No more space in the tree
    #[error("Bundle of {0} leaves exceeds the maximum tree size")]
    TooManyLeaves(usize),
    /// Requested a proof for a position past the last leaf
    #[error("Requested proof for index {index}. Tree has: {total_leaves}")]
    IndexOutOfBounds {
        /// The index requested
        index: usize,
        /// The number of leaves
        total_leaves: usize,
    },
    /// MerkleTree is invalid
    #[error("MerkleTree is invalid")]
    Invalid,
}

impl MerkleTree {
    /// Retrieve the root hash of this Merkle tree.
    pub fn hash(&self) -> H256 {
        match *self {
            MerkleTree::Leaf(h) => h,
            MerkleTree::Node(h, _, _) => h,
            MerkleTree::Zero(depth) => ZERO_HASHES[depth],
        }
    }

    /// Create a new Merkle tree from a list of leaves and a fixed depth.
    pub fn create(leaves: &[H256], depth: usize) -> Self {
        use MerkleTree::*;

        if leaves.is_empty() {
            return Zero(depth);
        }

        match depth {
            0 => {
                debug_assert_eq!(leaves.len(), 1);
                Leaf(leaves[0])
            }
            _ => {
                // Split leaves into left and right subtrees
                let subtree_capacity = 2usize.pow(depth as u32 - 1);
                let (left_leaves, right_leaves) = if leaves.len() <= subtree_capacity {
                    (leaves, EMPTY_SLICE)
                } else {
                    leaves.split_at(subtree_capacity)
                };

                let left_subtree = MerkleTree::create(left_leaves, depth - 1);
                let right_subtree = MerkleTree::create(right_leaves, depth - 1);
                let hash = hash_concat(left_subtree.hash(), right_subtree.hash());

                Node(hash, Box::new(left_subtree), Box::new(right_subtree))
            }
        }
    }

    /// Get a reference to the left and right subtrees if they exist.
    pub fn left_and_right_branches(&self) -> Option<(&Self, &Self)> {
        match *self {
            MerkleTree::Leaf(_) | MerkleTree::Zero(0) => None,
            MerkleTree::Node(_, ref l, ref r) => Some((l, r)),
            MerkleTree::Zero(depth) => Some((&ZERO_NODES[depth - 1], &ZERO_NODES[depth - 1])),
        }
    }

    /// Is this Merkle tree a leaf?
    pub fn is_leaf(&self) -> bool {
        matches!(self, MerkleTree::Leaf(_))
    }

    /// Return the leaf at `index` and a Merkle proof of its inclusion.
    ///
    /// The Merkle proof is in "bottom-up" order, starting with a leaf node
    /// and moving up the tree. Its length will be exactly equal to `depth`.
    pub fn generate_proof(
        &self,
        index: usize,
        depth: usize,
    ) -> Result<(H256, Vec<H256>), MerkleTreeError> {
        let mut proof = Vec::with_capacity(depth);
        let mut current_node = self;
        let mut current_depth = depth;
        while current_depth > 0 {
            let ith_bit = (index >> (current_depth - 1)) & 0x01;
            let (left, right) = current_node
                .left_and_right_branches()
                .ok_or(MerkleTreeError::Invalid)?;

            // Go right, include the left branch in the proof.
            if ith_bit == 1 {
                proof.push(left.hash());
                current_node = right;
            } else {
                proof.push(right.hash());
                current_node = left;
            }
            current_depth -= 1;
        }

        if !current_node.is_leaf() {
            return Err(MerkleTreeError::Invalid);
        }

        // Put proof in bottom-up order.
        proof.reverse();

        Ok((current_node.hash(), proof))
    }
}

/// An inclusion proof for one message of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// Sibling hashes, bottom-up
    pub siblings: Vec<H256>,
    /// Position of the leaf in the bundle
    pub tree_index: usize,
    /// Number of leaves in the bundle
    pub total_leaves: usize,
}

impl MerkleProof {
    /// Fold `leaf` with the siblings. `None` if the proof is malformed for
    /// its declared bundle size.
    pub fn root_for(&self, leaf: H256) -> Option<H256> {
        if self.total_leaves == 0
            || self.tree_index >= self.total_leaves
            || self.siblings.len() != tree_depth(self.total_leaves)
        {
            return None;
        }
        Some(merkle_root_from_branch(leaf, &self.siblings, self.tree_index))
    }
}

/// A committed bundle tree able to produce proofs for each of its leaves.
#[derive(Debug)]
pub struct BundleTree {
    count: usize,
    depth: usize,
    tree: MerkleTree,
}

impl BundleTree {
    /// Build the tree over `leaves` in order.
    pub fn new(leaves: &[H256]) -> Result<Self, MerkleTreeError> {
        if leaves.is_empty() {
            return Err(MerkleTreeError::Empty);
        }
        let depth = tree_depth(leaves.len());
        if depth > TREE_DEPTH {
            return Err(MerkleTreeError::TooManyLeaves(leaves.len()));
        }
        Ok(Self {
            count: leaves.len(),
            depth,
            tree: MerkleTree::create(leaves, depth),
        })
    }

    /// Return the root hash of the tree
    pub fn root(&self) -> H256 {
        self.tree.hash()
    }

    /// Return the number of leaves in the tree
    pub fn count(&self) -> usize {
        self.count
    }

    /// Return the depth of the tree
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Create a proof of the leaf at `index`.
    pub fn prove(&self, index: usize) -> Result<MerkleProof, MerkleTreeError> {
        if index >= self.count {
            return Err(MerkleTreeError::IndexOutOfBounds {
                index,
                total_leaves: self.count,
            });
        }
        let (_, siblings) = self.tree.generate_proof(index, self.depth)?;
        Ok(MerkleProof {
            siblings,
            tree_index: index,
            total_leaves: self.count,
        })
    }
}

/// Compute the root committing to `message_ids` in order.
pub fn bundle_root(message_ids: &[H256]) -> Result<H256, MerkleTreeError> {
    Ok(BundleTree::new(message_ids)?.root())
}

/// Produce the inclusion proof for `message_ids[index]`.
pub fn generate_proof(message_ids: &[H256], index: usize) -> Result<MerkleProof, MerkleTreeError> {
    BundleTree::new(message_ids)?.prove(index)
}

/// Verify that `leaf` is included under `root`.
pub fn verify(root: H256, leaf: H256, proof: &MerkleProof) -> bool {
    proof.root_for(leaf) == Some(root)
}

/// Compute a root hash from a leaf and a bottom-up branch. The tree depth is
/// the length of the branch.
pub fn merkle_root_from_branch(leaf: H256, branch: &[H256], index: usize) -> H256 {
    let mut current = leaf;

    for (i, next) in branch.iter().enumerate() {
        let ith_bit = (index >> i) & 0x01;
        if ith_bit == 1 {
            current = hash_concat(next, current);
        } else {
            current = hash_concat(current, next);
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u64) -> Vec<H256> {
        (1..=n).map(H256::from_low_u64_be).collect()
    }

    #[test]
    fn create_small_example() {
        // Construct a small merkle tree manually and check that it's consistent with
        // the MerkleTree type.
        let leaf_b00 = H256::from([0xAA; 32]);
        let leaf_b01 = H256::from([0xBB; 32]);
        let leaf_b10 = H256::from([0xCC; 32]);
        let leaf_b11 = H256::from([0xDD; 32]);

        let node_b0x = hash_concat(leaf_b00, leaf_b01);
        let node_b1x = hash_concat(leaf_b10, leaf_b11);

        let root = hash_concat(node_b0x, node_b1x);

        assert_eq!(
            bundle_root(&[leaf_b00, leaf_b01, leaf_b10, leaf_b11]).unwrap(),
            root
        );
    }

    #[test]
    fn odd_leaf_pairs_with_zero_hash() {
        let a = H256::from([0xAA; 32]);
        let b = H256::from([0xBB; 32]);
        let c = H256::from([0xCC; 32]);

        let expected = hash_concat(hash_concat(a, b), hash_concat(c, H256::zero()));
        assert_eq!(bundle_root(&[a, b, c]).unwrap(), expected);

        // five leaves: right half is (e, 0, 0, 0)
        let d = H256::from([0xDD; 32]);
        let e = H256::from([0xEE; 32]);
        let left = hash_concat(hash_concat(a, b), hash_concat(c, d));
        let right = hash_concat(hash_concat(e, H256::zero()), ZERO_HASHES[1]);
        assert_eq!(
            bundle_root(&[a, b, c, d, e]).unwrap(),
            hash_concat(left, right)
        );
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = H256::from([0xD6; 32]);
        assert_eq!(bundle_root(&[leaf]).unwrap(), leaf);

        let proof = generate_proof(&[leaf], 0).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(verify(leaf, leaf, &proof));
        assert!(!verify(H256::from([0xD7; 32]), leaf, &proof));
    }

    #[test]
    fn empty_bundle_has_no_root() {
        assert_eq!(bundle_root(&[]), Err(MerkleTreeError::Empty));
    }

    #[test]
    fn verify_small_example() {
        let leaf_b00 = H256::from([0xAA; 32]);
        let leaf_b01 = H256::from([0xBB; 32]);
        let leaf_b10 = H256::from([0xCC; 32]);
        let leaf_b11 = H256::from([0xDD; 32]);

        let node_b0x = hash_concat(leaf_b00, leaf_b01);
        let node_b1x = hash_concat(leaf_b10, leaf_b11);
        let root = hash_concat(node_b0x, node_b1x);

        let proof = |siblings: Vec<H256>, tree_index| MerkleProof {
            siblings,
            tree_index,
            total_leaves: 4,
        };

        assert!(verify(root, leaf_b00, &proof(vec![leaf_b01, node_b1x], 0b00)));
        assert!(verify(root, leaf_b01, &proof(vec![leaf_b00, node_b1x], 0b01)));
        assert!(verify(root, leaf_b10, &proof(vec![leaf_b11, node_b0x], 0b10)));
        assert!(verify(root, leaf_b11, &proof(vec![leaf_b10, node_b0x], 0b11)));

        // Ensure that incorrect proofs fail
        // Zero-length proof
        assert!(!verify(root, leaf_b01, &proof(vec![], 0b01)));
        // Proof in reverse order
        assert!(!verify(root, leaf_b01, &proof(vec![node_b1x, leaf_b00], 0b01)));
        // Proof too short
        assert!(!verify(root, leaf_b01, &proof(vec![leaf_b00], 0b01)));
        // Wrong index
        assert!(!verify(root, leaf_b01, &proof(vec![leaf_b00, node_b1x], 0b10)));
        // Index past the bundle
        assert!(!verify(root, leaf_b01, &proof(vec![leaf_b00, node_b1x], 4)));
        // Wrong root
        assert!(!verify(node_b1x, leaf_b01, &proof(vec![leaf_b00, node_b1x], 0b01)));
    }

    #[test]
    fn proves_every_member_for_many_sizes() {
        for n in 1..=33 {
            let ids = leaves(n);
            let tree = BundleTree::new(&ids).unwrap();
            assert_eq!(tree.depth(), tree_depth(n as usize));
            for (i, id) in ids.iter().enumerate() {
                let proof = tree.prove(i).unwrap();
                assert_eq!(proof.siblings.len(), tree.depth());
                assert!(verify(tree.root(), *id, &proof), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn rejects_non_members() {
        let ids = leaves(7);
        let tree = BundleTree::new(&ids).unwrap();
        let outsider = H256::repeat_byte(0x42);
        for i in 0..ids.len() {
            let proof = tree.prove(i).unwrap();
            assert!(!verify(tree.root(), outsider, &proof));
        }
        // the zero padding is not a provable member either
        let padding = MerkleProof {
            siblings: tree.prove(6).unwrap().siblings,
            tree_index: 7,
            total_leaves: 7,
        };
        assert!(!verify(tree.root(), H256::zero(), &padding));
    }

    #[test]
    fn rejects_proof_for_missing_index() {
        let tree = BundleTree::new(&leaves(3)).unwrap();
        assert_eq!(
            tree.prove(3),
            Err(MerkleTreeError::IndexOutOfBounds {
                index: 3,
                total_leaves: 3
            })
        );
    }

    #[test]
    fn order_changes_the_root() {
        let ids = leaves(4);
        let mut reordered = ids.clone();
        reordered.swap(0, 1);

        let root = bundle_root(&ids).unwrap();
        let other_root = bundle_root(&reordered).unwrap();
        assert_ne!(root, other_root);

        let proof = generate_proof(&ids, 0).unwrap();
        assert!(verify(root, ids[0], &proof));
        assert!(!verify(other_root, ids[0], &proof));
    }

    #[test]
    fn total_leaves_must_match_depth() {
        let ids = leaves(4);
        let root = bundle_root(&ids).unwrap();
        let mut proof = generate_proof(&ids, 1).unwrap();
        proof.total_leaves = 5;
        assert!(!verify(root, ids[1], &proof));
        proof.total_leaves = 3;
        assert!(verify(root, ids[1], &proof));
    }
}
