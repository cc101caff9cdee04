use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use derive_new::new;
use eyre::{Result, WrapErr};
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, warn};

use hub_relay_base::{HubSettings, Settings, SpokeSettings};
use hub_relay_core::{
    models::{HubNode, Inbox, Outbox, SpokeNode},
    utils::parse_address,
    Address, Bundle, BundleProof, ChainId, CommitmentKey, ConnectorReceiver, MessageReceiver,
    RelayError, RelayEvent, RelayResult, H256, U256,
};

use crate::mocks::{InMemoryConnector, InMemoryFeeVault, RecordingReceiver};

/// Operations shared by the hub and the spokes, as the harness drives them.
pub trait ChainNode: ConnectorReceiver {
    /// This chain
    fn chain_id(&self) -> ChainId;

    /// Outbound bundles
    fn outbox(&self) -> &Outbox;

    /// Proven roots and deliveries
    fn inbox(&self) -> &Inbox;

    /// Send a cross-chain call
    fn send_message(
        &mut self,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: Vec<u8>,
        fee: U256,
        now: u64,
    ) -> RelayResult<H256>;

    /// Commit the open bundle to `to_chain_id`
    fn commit_bundle(&mut self, to_chain_id: ChainId, now: u64) -> RelayResult<Bundle>;

    /// Commit every open bundle past the age limit
    fn commit_expired(&mut self, now: u64) -> RelayResult<Vec<Bundle>>;

    /// Execute a message of a proven bundle
    fn relay_message(
        &mut self,
        from_chain_id: ChainId,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: &[u8],
        proof: &BundleProof,
    ) -> RelayResult<H256>;

    /// Register a contract on this chain
    fn register_receiver(&mut self, address: Address, receiver: Arc<dyn MessageReceiver>);

    /// Take the events emitted so far
    fn drain_events(&mut self) -> Vec<RelayEvent>;
}

macro_rules! impl_chain_node {
    ($node:ident) => {
        impl ChainNode for $node {
            fn chain_id(&self) -> ChainId {
                $node::chain_id(self)
            }

            fn outbox(&self) -> &Outbox {
                $node::outbox(self)
            }

            fn inbox(&self) -> &Inbox {
                $node::inbox(self)
            }

            fn send_message(
                &mut self,
                from: Address,
                to_chain_id: ChainId,
                to: Address,
                data: Vec<u8>,
                fee: U256,
                now: u64,
            ) -> RelayResult<H256> {
                $node::send_message(self, from, to_chain_id, to, data, fee, now)
            }

            fn commit_bundle(&mut self, to_chain_id: ChainId, now: u64) -> RelayResult<Bundle> {
                $node::commit_bundle(self, to_chain_id, now)
            }

            fn commit_expired(&mut self, now: u64) -> RelayResult<Vec<Bundle>> {
                $node::commit_expired(self, now)
            }

            fn relay_message(
                &mut self,
                from_chain_id: ChainId,
                from: Address,
                to_chain_id: ChainId,
                to: Address,
                data: &[u8],
                proof: &BundleProof,
            ) -> RelayResult<H256> {
                $node::relay_message(self, from_chain_id, from, to_chain_id, to, data, proof)
            }

            fn register_receiver(&mut self, address: Address, receiver: Arc<dyn MessageReceiver>) {
                $node::register_receiver(self, address, receiver)
            }

            fn drain_events(&mut self) -> Vec<RelayEvent> {
                $node::drain_events(self)
            }
        }
    };
}

impl_chain_node!(HubNode);
impl_chain_node!(SpokeNode);

/// The address of the bridge contract on `chain_id`, i.e. the `msg_sender`
/// receivers observe.
pub fn bridge_address(chain_id: ChainId) -> Address {
    Address::from_low_u64_be(chain_id)
}

/// A message as handed to `send_message`, kept to rebuild proofs later
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct SentMessage {
    /// Origin chain
    pub from_chain_id: ChainId,
    /// Sender
    pub from: Address,
    /// Destination chain
    pub to_chain_id: ChainId,
    /// Target
    pub to: Address,
    /// Call data
    pub data: Vec<u8>,
}

/// An event as observed by the harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Chain that emitted the event
    pub chain_id: ChainId,
    /// Harness time of emission
    pub time: u64,
    /// The event
    #[serde(flatten)]
    pub event: RelayEvent,
}

/// One hub and its spokes wired with in-memory connectors.
///
/// Payloads stay queued on their link until `deliver` is called, so tests
/// control exactly when the transport makes progress. With `auto_execute`,
/// every message of a bundle is executed as soon as the bundle is proven on
/// its destination.
#[derive(Debug)]
pub struct Network {
    hub: HubNode,
    spokes: BTreeMap<ChainId, SpokeNode>,
    links: BTreeMap<(ChainId, ChainId), InMemoryConnector>,
    fees: InMemoryFeeVault,
    messages: HashMap<H256, SentMessage>,
    clock: u64,
    auto_execute: bool,
    journal: Vec<JournalEntry>,
}

impl Network {
    /// Wire a hub and its spokes. Every spoke can reach every other spoke
    /// through the hub.
    pub fn new(
        hub: &HubSettings,
        spokes: &[SpokeSettings],
        auto_execute: bool,
        treasury: Address,
    ) -> Self {
        let hub_chain_id = hub.chain_id;
        let fees = InMemoryFeeVault::new(U256::from(hub.target_balance), treasury);
        let mut hub_node = HubNode::new(
            hub_chain_id,
            bridge_address(hub_chain_id),
            hub.batch.policy(),
            hub.fee_config(),
            Box::new(fees.clone()),
        );

        let mut links = BTreeMap::new();
        let mut spoke_nodes = BTreeMap::new();
        for spoke in spokes {
            let up = InMemoryConnector::new(spoke.chain_id, hub_chain_id);
            let down = InMemoryConnector::new(hub_chain_id, spoke.chain_id);
            hub_node.set_spoke_connector(spoke.chain_id, Box::new(down.clone()), spoke.exit_time);
            let node = SpokeNode::new(
                spoke.chain_id,
                bridge_address(spoke.chain_id),
                spoke.batch.policy(),
                Box::new(up.clone()),
            );
            links.insert((spoke.chain_id, hub_chain_id), up);
            links.insert((hub_chain_id, spoke.chain_id), down);
            spoke_nodes.insert(spoke.chain_id, node);
        }

        let spoke_ids: Vec<ChainId> = spoke_nodes.keys().copied().collect();
        for pair in spoke_ids.iter().permutations(2) {
            if let Some(node) = spoke_nodes.get_mut(pair[0]) {
                node.connect_spoke(*pair[1]);
            }
        }

        info!(
            hub_chain_id,
            spokes = ?spoke_ids,
            auto_execute,
            "Wired in-memory network"
        );

        Self {
            hub: hub_node,
            spokes: spoke_nodes,
            links,
            fees,
            messages: HashMap::new(),
            clock: 0,
            auto_execute,
            journal: vec![],
        }
    }

    /// Wire the deployment described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let treasury = match &settings.hub.excess_fees_recipient {
            Some(recipient) => parse_address(recipient)
                .wrap_err_with(|| format!("Invalid excess_fees_recipient {recipient:?}"))?,
            None => Address::zero(),
        };
        let spokes: Vec<SpokeSettings> = settings.spokes.values().cloned().collect();
        Ok(Self::new(
            &settings.hub,
            &spokes,
            settings.harness.auto_execute,
            treasury,
        ))
    }

    /// The hub node
    pub fn hub(&self) -> &HubNode {
        &self.hub
    }

    /// The hub node, mutably
    pub fn hub_mut(&mut self) -> &mut HubNode {
        &mut self.hub
    }

    /// A spoke node
    pub fn spoke(&self, chain_id: ChainId) -> Option<&SpokeNode> {
        self.spokes.get(&chain_id)
    }

    /// A spoke node, mutably
    pub fn spoke_mut(&mut self, chain_id: ChainId) -> Option<&mut SpokeNode> {
        self.spokes.get_mut(&chain_id)
    }

    /// Any node by chain id
    pub fn node(&self, chain_id: ChainId) -> RelayResult<&dyn ChainNode> {
        if chain_id == self.hub.chain_id() {
            return Ok(&self.hub);
        }
        self.spokes
            .get(&chain_id)
            .map(|node| node as &dyn ChainNode)
            .ok_or(RelayError::UnsupportedChainId(chain_id))
    }

    fn node_mut(&mut self, chain_id: ChainId) -> RelayResult<&mut dyn ChainNode> {
        if chain_id == self.hub.chain_id() {
            return Ok(&mut self.hub);
        }
        self.spokes
            .get_mut(&chain_id)
            .map(|node| node as &mut dyn ChainNode)
            .ok_or(RelayError::UnsupportedChainId(chain_id))
    }

    /// The hub's fee vault
    pub fn fees(&self) -> &InMemoryFeeVault {
        &self.fees
    }

    /// The link carrying payloads from `from_chain_id` to `to_chain_id`
    pub fn link(&self, from_chain_id: ChainId, to_chain_id: ChainId) -> Option<&InMemoryConnector> {
        self.links.get(&(from_chain_id, to_chain_id))
    }

    /// Current harness time
    pub fn now(&self) -> u64 {
        self.clock
    }

    /// Move the clock forward
    pub fn advance(&mut self, seconds: u64) {
        self.clock = self.clock.saturating_add(seconds);
    }

    /// Move the clock to `time` unless it is already past it
    pub fn advance_to(&mut self, time: u64) {
        self.clock = self.clock.max(time);
    }

    /// Switch automatic execution of proven bundles
    pub fn set_auto_execute(&mut self, auto_execute: bool) {
        self.auto_execute = auto_execute;
    }

    /// Every event in emission order
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Events named `name`, e.g. `CommitmentProven`, in emission order
    pub fn events_named(&self, name: &str) -> Vec<&JournalEntry> {
        self.journal
            .iter()
            .filter(|entry| entry.event.name() == name)
            .collect()
    }

    /// Journal position of the first `name` event emitted on `chain_id`
    pub fn position_of(&self, chain_id: ChainId, name: &str) -> Option<usize> {
        self.journal
            .iter()
            .position(|entry| entry.chain_id == chain_id && entry.event.name() == name)
    }

    /// Deploy a recording receiver at `address` on `chain_id`
    pub fn register_receiver(
        &mut self,
        chain_id: ChainId,
        address: Address,
    ) -> RelayResult<Arc<RecordingReceiver>> {
        let receiver = Arc::new(RecordingReceiver::new());
        self.register_receiver_with(chain_id, address, receiver.clone())?;
        Ok(receiver)
    }

    /// Deploy `receiver` at `address` on `chain_id`
    pub fn register_receiver_with(
        &mut self,
        chain_id: ChainId,
        address: Address,
        receiver: Arc<dyn MessageReceiver>,
    ) -> RelayResult<()> {
        self.node_mut(chain_id)?.register_receiver(address, receiver);
        Ok(())
    }

    /// Send a call from `from_chain_id`
    pub fn send_message(
        &mut self,
        from_chain_id: ChainId,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: &[u8],
        fee: U256,
    ) -> RelayResult<H256> {
        let now = self.clock;
        let result =
            self.node_mut(from_chain_id)?
                .send_message(from, to_chain_id, to, data.to_vec(), fee, now);
        if let Ok(message_id) = result {
            self.messages.insert(
                message_id,
                SentMessage::new(from_chain_id, from, to_chain_id, to, data.to_vec()),
            );
        }
        self.settle();
        result
    }

    /// A message previously sent through the harness
    pub fn sent_message(&self, message_id: H256) -> Option<&SentMessage> {
        self.messages.get(&message_id)
    }

    /// Commit the open bundle of the `from_chain_id` -> `to_chain_id` lane
    pub fn commit(&mut self, from_chain_id: ChainId, to_chain_id: ChainId) -> RelayResult<Bundle> {
        let now = self.clock;
        let result = self
            .node_mut(from_chain_id)?
            .commit_bundle(to_chain_id, now);
        self.settle();
        result
    }

    /// Commit every expired bundle on every chain
    pub fn commit_expired(&mut self) -> RelayResult<Vec<Bundle>> {
        let now = self.clock;
        let chain_ids: Vec<ChainId> = std::iter::once(self.hub.chain_id())
            .chain(self.spokes.keys().copied())
            .collect();
        let mut committed = vec![];
        for chain_id in chain_ids {
            let result = self.node_mut(chain_id)?.commit_expired(now);
            self.settle();
            committed.extend(result?);
        }
        Ok(committed)
    }

    /// Deliver everything queued from `from_chain_id` to `to_chain_id`.
    /// Returns the number of payloads handled, or the first delivery error.
    pub fn deliver(&mut self, from_chain_id: ChainId, to_chain_id: ChainId) -> RelayResult<usize> {
        let link = self
            .links
            .get(&(from_chain_id, to_chain_id))
            .cloned()
            .ok_or(RelayError::InvalidRoute(to_chain_id))?;

        let now = self.clock;
        let mut first_error = None;
        let envelopes = link.take_pending();
        let count = envelopes.len();
        for envelope in envelopes {
            let result = self.node_mut(to_chain_id)?.on_message_received(
                envelope.source_chain_id,
                &envelope.payload,
                now,
            );
            if let Err(error) = result {
                warn!(%error, from_chain_id, to_chain_id, "Delivery rejected");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            self.settle();
        }

        info!(from_chain_id, to_chain_id, count, "Delivered payloads");
        match first_error {
            Some(error) => Err(error),
            None => Ok(count),
        }
    }

    /// Hand an arbitrary payload to `to_chain_id` as if the connector from
    /// `source_chain_id` delivered it.
    pub fn inject(
        &mut self,
        source_chain_id: ChainId,
        to_chain_id: ChainId,
        payload: &[u8],
    ) -> RelayResult<()> {
        let now = self.clock;
        let result = self
            .node_mut(to_chain_id)?
            .on_message_received(source_chain_id, payload, now);
        self.settle();
        result
    }

    /// Relay a commitment held by the hub on behalf of `relayer`
    pub fn relay_commitment(
        &mut self,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
        bundle_id: H256,
        relayer: Address,
    ) -> RelayResult<U256> {
        let now = self.clock;
        let result = self
            .hub
            .relay_commitment(from_chain_id, to_chain_id, bundle_id, relayer, now);
        self.settle();
        result
    }

    /// Relay every commitment whose window is open, as a relayer bot would
    pub fn relay_ready(&mut self, relayer: Address) -> Vec<(CommitmentKey, RelayResult<U256>)> {
        self.hub
            .relayable_commitments(self.clock)
            .into_iter()
            .map(|key| {
                let result = self.relay_commitment(
                    key.from_chain_id,
                    key.to_chain_id,
                    key.bundle_id,
                    relayer,
                );
                (key, result)
            })
            .collect()
    }

    /// Proof of a message sent through the harness. Fails with
    /// `UnknownCommitment` until its bundle is committed.
    pub fn proof_for(&self, message_id: H256) -> RelayResult<BundleProof> {
        let message = self
            .messages
            .get(&message_id)
            .ok_or(RelayError::UnknownCommitment(message_id))?;
        let outbox = self.node(message.from_chain_id)?.outbox();
        let bundle = outbox
            .bundle_of(message_id)
            .ok_or(RelayError::UnknownCommitment(message_id))?;
        outbox.prove(bundle.bundle_id, message_id)
    }

    /// Execute a message sent through the harness on its destination
    pub fn relay_message(&mut self, message_id: H256) -> RelayResult<H256> {
        let result = self.execute(message_id);
        self.settle();
        result
    }

    /// Execute a call with caller supplied contents and proof
    pub fn relay_message_with(
        &mut self,
        from_chain_id: ChainId,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: &[u8],
        proof: &BundleProof,
    ) -> RelayResult<H256> {
        let result = self
            .node_mut(to_chain_id)?
            .relay_message(from_chain_id, from, to_chain_id, to, data, proof);
        self.settle();
        result
    }

    /// Commit a lane and carry the bundle all the way to its destination,
    /// waiting out the exit time. Returns the bundle.
    pub fn transport(
        &mut self,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
        relayer: Address,
    ) -> RelayResult<Bundle> {
        let hub_chain_id = self.hub.chain_id();
        let bundle = self.commit(from_chain_id, to_chain_id)?;

        if from_chain_id == hub_chain_id {
            self.deliver(hub_chain_id, to_chain_id)?;
            return Ok(bundle);
        }

        self.deliver(from_chain_id, hub_chain_id)?;
        let relay_window_start = self
            .hub
            .commitment(&bundle.commitment().key())
            .map(|c| c.relay_window_start)
            .ok_or(RelayError::UnknownCommitment(bundle.bundle_id))?;
        self.advance_to(relay_window_start);
        self.relay_commitment(from_chain_id, to_chain_id, bundle.bundle_id, relayer)?;

        if to_chain_id != hub_chain_id {
            self.deliver(hub_chain_id, to_chain_id)?;
        }
        Ok(bundle)
    }

    /// Sweep hub fees above the target balance to the treasury
    pub fn withdraw_excess_fees(&mut self) -> U256 {
        self.hub.withdraw_excess_fees()
    }

    fn execute(&mut self, message_id: H256) -> RelayResult<H256> {
        let message = self
            .messages
            .get(&message_id)
            .cloned()
            .ok_or(RelayError::UnknownCommitment(message_id))?;
        let proof = self.proof_for(message_id)?;
        self.node_mut(message.to_chain_id)?.relay_message(
            message.from_chain_id,
            message.from,
            message.to_chain_id,
            message.to,
            &message.data,
            &proof,
        )
    }

    fn drain_events(&mut self) -> Vec<JournalEntry> {
        let time = self.clock;
        let hub_chain_id = self.hub.chain_id();
        let hub_events = self.hub.drain_events().into_iter().map(|event| JournalEntry {
            chain_id: hub_chain_id,
            time,
            event,
        });
        let spoke_events = self.spokes.iter_mut().flat_map(|(chain_id, node)| {
            let chain_id = *chain_id;
            node.drain_events()
                .into_iter()
                .map(move |event| JournalEntry {
                    chain_id,
                    time,
                    event,
                })
        });
        hub_events.chain(spoke_events).collect()
    }

    /// Move node events to the journal, executing freshly proven bundles in
    /// auto-execute mode.
    fn settle(&mut self) {
        let drained = self.drain_events();
        let proven: Vec<(ChainId, ChainId, H256)> = drained
            .iter()
            .filter_map(|entry| match entry.event {
                RelayEvent::CommitmentProven {
                    from_chain_id,
                    bundle_id,
                    ..
                } => Some((entry.chain_id, from_chain_id, bundle_id)),
                _ => None,
            })
            .collect();
        self.journal.extend(drained);

        if !self.auto_execute || proven.is_empty() {
            return;
        }

        for (chain_id, from_chain_id, bundle_id) in proven {
            let message_ids = match self
                .node(from_chain_id)
                .ok()
                .and_then(|node| node.outbox().bundle(bundle_id))
            {
                Some(bundle) => bundle.message_ids.clone(),
                None => continue,
            };
            for message_id in message_ids {
                if let Err(error) = self.execute(message_id) {
                    warn!(%error, chain_id, "Auto-execution failed");
                }
            }
        }
        let executed = self.drain_events();
        self.journal.extend(executed);
    }
}
