use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    accumulator::{bundle_root, BundleTree},
    initial_bundle_nonce, next_bundle_nonce, Address, Bundle, BundleProof, ChainId, Message,
    PendingBundle, RelayError, RelayResult, H256, U256,
};

/// When bundles get committed and what a message costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPolicy {
    /// A bundle is committed as soon as it holds this many messages
    pub max_bundle_messages: usize,
    /// A bundle older than this is committed by `commit_expired`
    pub max_bundle_age: Option<u64>,
    /// Minimum fee attached to each message
    pub message_fee: U256,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_bundle_messages: 8,
            max_bundle_age: None,
            message_fee: U256::zero(),
        }
    }
}

/// Outbound bundles of one chain, one lane per destination.
#[derive(Debug, Clone)]
pub struct Outbox {
    chain_id: ChainId,
    policy: BatchPolicy,
    nonces: BTreeMap<ChainId, H256>,
    pending: BTreeMap<ChainId, PendingBundle>,
    committed: BTreeMap<H256, Bundle>,
    // message id -> id of the committed bundle holding it
    bundle_index: HashMap<H256, H256>,
}

impl Outbox {
    /// An empty outbox for `chain_id`
    pub fn new(chain_id: ChainId, policy: BatchPolicy) -> Self {
        Self {
            chain_id,
            policy,
            nonces: BTreeMap::new(),
            pending: BTreeMap::new(),
            committed: BTreeMap::new(),
            bundle_index: HashMap::new(),
        }
    }

    /// Active batching policy
    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// The id the next bundle to `to_chain_id` will carry
    pub fn next_bundle_id(&self, to_chain_id: ChainId) -> H256 {
        self.nonces
            .get(&to_chain_id)
            .copied()
            .unwrap_or_else(|| initial_bundle_nonce(self.chain_id, to_chain_id))
    }

    /// The open bundle to `to_chain_id`
    pub fn pending(&self, to_chain_id: ChainId) -> Option<&PendingBundle> {
        self.pending.get(&to_chain_id)
    }

    /// A committed bundle by id
    pub fn bundle(&self, bundle_id: H256) -> Option<&Bundle> {
        self.committed.get(&bundle_id)
    }

    /// All committed bundles
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.committed.values()
    }

    /// The committed bundle holding `message_id`
    pub fn bundle_of(&self, message_id: H256) -> Option<&Bundle> {
        self.bundle_index
            .get(&message_id)
            .and_then(|bundle_id| self.committed.get(bundle_id))
    }

    /// Append a message to the open bundle for its destination.
    ///
    /// The caller is responsible for validating the route.
    pub fn append(
        &mut self,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: Vec<u8>,
        fee: U256,
        now: u64,
    ) -> RelayResult<Message> {
        if fee < self.policy.message_fee {
            return Err(RelayError::InsufficientFee {
                required: self.policy.message_fee,
                actual: fee,
            });
        }

        let bundle_id = self.next_bundle_id(to_chain_id);
        let pending = self
            .pending
            .entry(to_chain_id)
            .or_insert_with(|| PendingBundle::open(bundle_id, to_chain_id, now));

        let message = Message::new(
            pending.bundle_id,
            pending.next_index(),
            self.chain_id,
            from,
            to_chain_id,
            to,
            data,
        );
        pending.message_ids.push(message.id());
        pending.fees = pending.fees.saturating_add(fee);

        debug!(
            to_chain_id,
            tree_index = message.tree_index,
            pending = pending.len(),
            "Appended message to bundle"
        );
        Ok(message)
    }

    /// True if the open bundle to `to_chain_id` reached the size limit
    pub fn is_full(&self, to_chain_id: ChainId) -> bool {
        self.pending
            .get(&to_chain_id)
            .map(|p| p.len() >= self.policy.max_bundle_messages)
            .unwrap_or(false)
    }

    /// Destinations whose open bundle is older than the age limit
    pub fn expired(&self, now: u64) -> Vec<ChainId> {
        let Some(max_age) = self.policy.max_bundle_age else {
            return vec![];
        };
        self.pending
            .values()
            .filter(|p| !p.is_empty() && now.saturating_sub(p.opened_at) >= max_age)
            .map(|p| p.to_chain_id)
            .collect()
    }

    /// The bundle committing the open lane to `to_chain_id` at `now`.
    ///
    /// Does not modify the outbox; call `mark_committed` once the commitment
    /// was handed to the transport.
    pub fn seal(&self, to_chain_id: ChainId, now: u64) -> RelayResult<Bundle> {
        let pending = self
            .pending
            .get(&to_chain_id)
            .filter(|p| !p.is_empty())
            .ok_or(RelayError::NoPendingBundle(to_chain_id))?;

        Ok(Bundle {
            bundle_id: pending.bundle_id,
            from_chain_id: self.chain_id,
            to_chain_id,
            message_ids: pending.message_ids.clone(),
            bundle_root: bundle_root(&pending.message_ids)?,
            bundle_fees: pending.fees,
            commit_time: now,
        })
    }

    /// Close the lane of `bundle` and advance its nonce.
    pub fn mark_committed(&mut self, bundle: Bundle) {
        self.pending.remove(&bundle.to_chain_id);
        self.nonces
            .insert(bundle.to_chain_id, next_bundle_nonce(bundle.bundle_id));
        self.bundle_index.extend(
            bundle
                .message_ids
                .iter()
                .map(|message_id| (*message_id, bundle.bundle_id)),
        );
        self.committed.insert(bundle.bundle_id, bundle);
    }

    /// Inclusion proof of `message_id` in the committed bundle `bundle_id`
    pub fn prove(&self, bundle_id: H256, message_id: H256) -> RelayResult<BundleProof> {
        let bundle = self
            .committed
            .get(&bundle_id)
            .ok_or(RelayError::UnknownCommitment(bundle_id))?;
        let index = bundle
            .position(message_id)
            .ok_or(RelayError::UnknownCommitment(bundle_id))?;
        let proof = BundleTree::new(&bundle.message_ids)?.prove(index)?;
        Ok(BundleProof::new(bundle_id, proof))
    }
}
