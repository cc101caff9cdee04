use serde::{Deserialize, Serialize};

use crate::{Address, ChainId, H256, U256};

/// Observable state transitions of a node, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum RelayEvent {
    /// A message was accepted for delivery
    MessageSent {
        /// Id of the message
        message_id: H256,
        /// Sender on this chain
        from: Address,
        /// Destination chain
        to_chain_id: ChainId,
        /// Target on the destination chain
        to: Address,
    },
    /// A message was appended to a pending bundle
    MessageBundled {
        /// Bundle the message went into
        bundle_id: H256,
        /// Position in that bundle
        tree_index: usize,
        /// Id of the message
        message_id: H256,
    },
    /// A bundle was frozen and its commitment dispatched
    BundleCommitted {
        /// Bundle id
        bundle_id: H256,
        /// Merkle root
        bundle_root: H256,
        /// Fees collected by the bundle
        bundle_fees: U256,
        /// Destination chain
        to_chain_id: ChainId,
        /// Commit time
        commit_time: u64,
    },
    /// The hub accepted a commitment from a spoke
    CommitmentReceived {
        /// Origin chain
        from_chain_id: ChainId,
        /// Destination chain
        to_chain_id: ChainId,
        /// Bundle id
        bundle_id: H256,
        /// Merkle root
        bundle_root: H256,
        /// Fees carried with the commitment
        transport_fee: U256,
        /// First time it may be relayed
        relay_window_start: u64,
    },
    /// A relayer moved a commitment forward
    CommitmentRelayed {
        /// Origin chain
        from_chain_id: ChainId,
        /// Destination chain
        to_chain_id: ChainId,
        /// Bundle id
        bundle_id: H256,
        /// Fees carried with the commitment
        transport_fee: U256,
        /// What the relayer was paid
        relayer_reward: U256,
        /// First time it could be relayed
        relay_window_start: u64,
        /// Who relayed it
        relayer: Address,
    },
    /// A relayed commitment was handed to the destination spoke's connector
    CommitmentForwarded {
        /// Origin chain
        from_chain_id: ChainId,
        /// Destination chain
        to_chain_id: ChainId,
        /// Bundle id
        bundle_id: H256,
        /// Merkle root
        bundle_root: H256,
    },
    /// A bundle root became usable for message delivery on this chain
    CommitmentProven {
        /// Origin chain
        from_chain_id: ChainId,
        /// Bundle id
        bundle_id: H256,
        /// Merkle root
        bundle_root: H256,
    },
    /// A message was executed on this chain
    MessageRelayed {
        /// Id of the message
        message_id: H256,
        /// Origin chain
        from_chain_id: ChainId,
        /// Sender on the origin chain
        from: Address,
        /// Target on this chain
        to: Address,
    },
}

impl RelayEvent {
    /// Short name of the event, e.g. `CommitmentProven`
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::MessageSent { .. } => "MessageSent",
            RelayEvent::MessageBundled { .. } => "MessageBundled",
            RelayEvent::BundleCommitted { .. } => "BundleCommitted",
            RelayEvent::CommitmentReceived { .. } => "CommitmentReceived",
            RelayEvent::CommitmentRelayed { .. } => "CommitmentRelayed",
            RelayEvent::CommitmentForwarded { .. } => "CommitmentForwarded",
            RelayEvent::CommitmentProven { .. } => "CommitmentProven",
            RelayEvent::MessageRelayed { .. } => "MessageRelayed",
        }
    }
}
