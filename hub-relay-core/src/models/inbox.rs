use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    accumulator::verify, message_id, utils::fmt_bytes, Address, BundleProof, ChainId,
    CommitmentKey, CrossChainContext, MessageReceiver, RelayError, RelayResult, H256,
};

/// Proven bundle roots and delivery records of one chain.
///
/// A message is executed only if its bundle root was proven here, its proof
/// folds to that root and it was never delivered before.
#[derive(Debug)]
pub struct Inbox {
    chain_id: ChainId,
    bridge: Address,
    proven: BTreeMap<CommitmentKey, H256>,
    delivered: HashSet<H256>,
    receivers: HashMap<Address, Arc<dyn MessageReceiver>>,
}

impl Inbox {
    /// An empty inbox for `chain_id`. `bridge` is the caller receivers see.
    pub fn new(chain_id: ChainId, bridge: Address) -> Self {
        Self {
            chain_id,
            bridge,
            proven: BTreeMap::new(),
            delivered: HashSet::new(),
            receivers: HashMap::new(),
        }
    }

    /// Register the contract living at `address`
    pub fn register_receiver(&mut self, address: Address, receiver: Arc<dyn MessageReceiver>) {
        self.receivers.insert(address, receiver);
    }

    /// Make `bundle_root` usable for deliveries of the bundle `key`.
    ///
    /// Returns `false` if the same root was already proven. A different root
    /// for a known bundle is rejected.
    pub fn prove_bundle(&mut self, key: CommitmentKey, bundle_root: H256) -> RelayResult<bool> {
        if key.to_chain_id != self.chain_id {
            return Err(RelayError::InvalidRoute(key.to_chain_id));
        }
        match self.proven.get(&key) {
            Some(root) if *root == bundle_root => {
                debug!(%key, "Bundle already proven");
                Ok(false)
            }
            Some(root) => {
                warn!(
                    %key,
                    proven = %fmt_bytes(root.as_bytes()),
                    offered = %fmt_bytes(bundle_root.as_bytes()),
                    "Refusing to overwrite a proven bundle root"
                );
                Err(RelayError::ConflictingCommitment(key.bundle_id))
            }
            None => {
                self.proven.insert(key, bundle_root);
                info!(%key, root = %fmt_bytes(bundle_root.as_bytes()), "Proved bundle");
                Ok(true)
            }
        }
    }

    /// The proven root of a bundle, if any
    pub fn proven_root(
        &self,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
        bundle_id: H256,
    ) -> Option<H256> {
        self.proven
            .get(&CommitmentKey {
                from_chain_id,
                to_chain_id,
                bundle_id,
            })
            .copied()
    }

    /// True if the message was executed here
    pub fn is_delivered(&self, message_id: H256) -> bool {
        self.delivered.contains(&message_id)
    }

    /// Number of executed messages
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    /// Verify and execute a message. Returns its id.
    ///
    /// The delivery record is only kept if the receiver succeeds.
    pub fn relay_message(
        &mut self,
        from_chain_id: ChainId,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: &[u8],
        proof: &BundleProof,
    ) -> RelayResult<H256> {
        if to_chain_id != self.chain_id {
            return Err(RelayError::InvalidRoute(to_chain_id));
        }

        let bundle_root = self
            .proven_root(from_chain_id, to_chain_id, proof.bundle_id)
            .ok_or(RelayError::BundleNotProven(proof.bundle_id))?;

        let message_id = message_id(
            proof.bundle_id,
            proof.tree_index,
            from_chain_id,
            from,
            to_chain_id,
            to,
            data,
        );

        if !verify(bundle_root, message_id, &proof.merkle_proof()) {
            return Err(RelayError::ProofInvalid {
                message_id,
                bundle_root,
            });
        }

        if self.delivered.contains(&message_id) {
            return Err(RelayError::AlreadyDelivered(message_id));
        }

        let receiver = self
            .receivers
            .get(&to)
            .cloned()
            .ok_or(RelayError::UnknownRecipient(to))?;

        self.delivered.insert(message_id);

        let ctx = CrossChainContext {
            msg_sender: self.bridge,
            x_domain_sender: from,
            x_domain_chain_id: from_chain_id,
        };
        if let Err(source) = receiver.receive_message(&ctx, data) {
            self.delivered.remove(&message_id);
            warn!(
                message_id = %fmt_bytes(message_id.as_bytes()),
                error = %source,
                "Receiver rejected message"
            );
            return Err(RelayError::ReceiverFailed { message_id, source });
        }

        Ok(message_id)
    }
}
