use std::error::Error as StdError;

use crate::{accumulator::MerkleTreeError, Address, ChainId, H256, U256};

/// The result of a relay operation on a single chain.
pub type RelayResult<T> = Result<T, RelayError>;

/// Boxed error returned by external collaborators (connectors, receivers).
pub type CollaboratorError = Box<dyn StdError + Send + Sync>;

/// Errors surfaced by the relay engine.
///
/// Every variant is local to the call that produced it: no state is mutated
/// when an operation returns an error.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No route from this chain to the destination
    #[error("InvalidRoute({0})")]
    InvalidRoute(ChainId),
    /// The chain is not part of this deployment
    #[error("UnsupportedChainId({0})")]
    UnsupportedChainId(ChainId),
    /// Merkle inclusion proof does not fold to the proven bundle root
    #[error("ProofInvalid: message {message_id:?} is not included under root {bundle_root:?}")]
    ProofInvalid {
        /// The recomputed message id
        message_id: H256,
        /// The proven bundle root the proof was checked against
        bundle_root: H256,
    },
    /// The message was already delivered
    #[error("AlreadyDelivered({0:?})")]
    AlreadyDelivered(H256),
    /// The commitment's exit time has not passed yet
    #[error("RelayWindowNotElapsed: relay window starts at {relay_window_start}, now is {now}")]
    RelayWindowNotElapsed {
        /// First timestamp at which relaying is allowed
        relay_window_start: u64,
        /// The time of the attempt
        now: u64,
    },
    /// The commitment was already relayed by someone
    #[error("AlreadyRelayed({0:?})")]
    AlreadyRelayed(H256),
    /// No commitment is known for the bundle
    #[error("UnknownCommitment({0:?})")]
    UnknownCommitment(H256),
    /// A commitment for the bundle exists with different contents
    #[error("ConflictingCommitment({0:?})")]
    ConflictingCommitment(H256),
    /// The bundle root has not been proven on this chain
    #[error("BundleNotProven({0:?})")]
    BundleNotProven(H256),
    /// A commitment arrived from a chain that does not own its origin
    #[error("InvalidSender: expected chain {expected}, got {actual}")]
    InvalidSender {
        /// The chain the connector is bound to
        expected: ChainId,
        /// The origin claimed by the payload
        actual: ChainId,
    },
    /// The fee attached to a message is below the configured message fee
    #[error("InsufficientFee: required {required}, provided {actual}")]
    InsufficientFee {
        /// Configured message fee
        required: U256,
        /// Attached value
        actual: U256,
    },
    /// There is nothing to commit for the destination
    #[error("NoPendingBundle({0})")]
    NoPendingBundle(ChainId),
    /// No receiver is registered at the target address
    #[error("UnknownRecipient({0:?})")]
    UnknownRecipient(Address),
    /// The target rejected the call
    #[error("Receiver failed handling message {message_id:?}: {source}")]
    ReceiverFailed {
        /// The message being delivered
        message_id: H256,
        /// The receiver's error
        source: CollaboratorError,
    },
    /// Bubbled up from the bundle accumulator
    #[error(transparent)]
    Merkle(#[from] MerkleTreeError),
    /// IO error from Read/Write usage while decoding a payload
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// The underlying transport refused the payload
    #[error("Connector error: {0}")]
    Connector(CollaboratorError),
}

impl RelayError {
    /// Create a connector error from any other existing error
    pub fn from_connector_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Connector(Box::new(err))
    }

    /// True when the same call may succeed later without any other party
    /// acting first, e.g. once the relay window opens.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::RelayWindowNotElapsed { .. }
                | RelayError::BundleNotProven(_)
                | RelayError::Connector(_)
        )
    }

    /// True when the error proves the requested effect already happened.
    pub fn is_already_done(&self) -> bool {
        matches!(
            self,
            RelayError::AlreadyDelivered(_) | RelayError::AlreadyRelayed(_)
        )
    }
}
