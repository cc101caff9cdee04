use ethers_core::{
    abi::{encode, Token},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

use crate::{
    accumulator::MerkleProof,
    utils::{h256_to_u256, u256_to_h256},
    ChainId, CommitmentPayload, H256, U256,
};

/// The id of the first bundle sent from `from_chain_id` to `to_chain_id`.
pub fn initial_bundle_nonce(from_chain_id: ChainId, to_chain_id: ChainId) -> H256 {
    keccak256(encode(&[
        Token::Uint(U256::from(from_chain_id)),
        Token::Uint(U256::from(to_chain_id)),
    ]))
    .into()
}

/// The id following `nonce` on the same lane.
pub fn next_bundle_nonce(nonce: H256) -> H256 {
    let (next, _) = h256_to_u256(nonce).overflowing_add(U256::one());
    u256_to_h256(next)
}

/// A bundle still accepting messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBundle {
    /// Id the bundle will be committed under
    pub bundle_id: H256,
    /// Destination of every message in the bundle
    pub to_chain_id: ChainId,
    /// Message ids in insertion order
    pub message_ids: Vec<H256>,
    /// Fees attached to the messages so far
    pub fees: U256,
    /// Time the first message was appended
    pub opened_at: u64,
}

impl PendingBundle {
    /// An empty bundle opened at `now`
    pub fn open(bundle_id: H256, to_chain_id: ChainId, now: u64) -> Self {
        Self {
            bundle_id,
            to_chain_id,
            message_ids: vec![],
            fees: U256::zero(),
            opened_at: now,
        }
    }

    /// Number of messages in the bundle
    pub fn len(&self) -> usize {
        self.message_ids.len()
    }

    /// True if no message was appended yet
    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }

    /// Tree index the next appended message will get
    pub fn next_index(&self) -> usize {
        self.message_ids.len()
    }
}

/// A frozen bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Bundle id, the `bundle_nonce` of every message it holds
    pub bundle_id: H256,
    /// Origin chain
    pub from_chain_id: ChainId,
    /// Destination chain
    pub to_chain_id: ChainId,
    /// Message ids in insertion order
    pub message_ids: Vec<H256>,
    /// Merkle root over `message_ids`
    pub bundle_root: H256,
    /// Sum of the message fees
    pub bundle_fees: U256,
    /// Time the bundle was committed
    pub commit_time: u64,
}

impl Bundle {
    /// The payload carried to the hub for this bundle
    pub fn commitment(&self) -> CommitmentPayload {
        CommitmentPayload {
            from_chain_id: self.from_chain_id,
            to_chain_id: self.to_chain_id,
            bundle_id: self.bundle_id,
            bundle_root: self.bundle_root,
            bundle_fees: self.bundle_fees,
            commit_time: self.commit_time,
        }
    }

    /// Position of `message_id` in the bundle
    pub fn position(&self, message_id: H256) -> Option<usize> {
        self.message_ids.iter().position(|id| *id == message_id)
    }
}

/// Proof that a message belongs to a committed bundle, as submitted to
/// `relay_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleProof {
    /// The bundle holding the message
    pub bundle_id: H256,
    /// Position of the message in the bundle
    pub tree_index: usize,
    /// Sibling hashes, bottom-up
    pub siblings: Vec<H256>,
    /// Number of messages in the bundle
    pub total_leaves: usize,
}

impl BundleProof {
    /// Build from a Merkle proof of the bundle `bundle_id`.
    pub fn new(bundle_id: H256, proof: MerkleProof) -> Self {
        Self {
            bundle_id,
            tree_index: proof.tree_index,
            siblings: proof.siblings,
            total_leaves: proof.total_leaves,
        }
    }

    /// The inclusion part of the proof
    pub fn merkle_proof(&self) -> MerkleProof {
        MerkleProof {
            siblings: self.siblings.clone(),
            tree_index: self.tree_index,
            total_leaves: self.total_leaves,
        }
    }
}
