use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    models::{BatchPolicy, Inbox, Outbox},
    utils::fmt_bytes,
    Address, Bundle, BundleProof, ChainId, CommitmentPayload, Connector, ConnectorReceiver,
    Decode, Encode, MessageReceiver, RelayError, RelayEvent, RelayResult, RouteTable,
    TransportPath, H256, U256,
};

/// A chain connected to the hub.
///
/// Outbound messages are bundled per destination and every bundle commitment
/// goes to the hub. Inbound bundle roots are accepted from the hub only.
#[derive(Debug)]
pub struct SpokeNode {
    chain_id: ChainId,
    routes: RouteTable,
    outbox: Outbox,
    inbox: Inbox,
    hub_connector: Box<dyn Connector>,
    events: Vec<RelayEvent>,
}

impl SpokeNode {
    /// A spoke for `chain_id` talking to the hub at the other end of
    /// `hub_connector`. `bridge` is the address receivers see as caller.
    pub fn new(
        chain_id: ChainId,
        bridge: Address,
        policy: BatchPolicy,
        hub_connector: Box<dyn Connector>,
    ) -> Self {
        let hub_chain_id = hub_connector.counterpart_chain_id();
        Self {
            chain_id,
            routes: RouteTable::for_spoke(chain_id, hub_chain_id),
            outbox: Outbox::new(chain_id, policy),
            inbox: Inbox::new(chain_id, bridge),
            hub_connector,
            events: vec![],
        }
    }

    /// This chain
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// The hub chain
    pub fn hub_chain_id(&self) -> ChainId {
        self.routes.hub_chain_id()
    }

    /// Routing table
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Mutable routing table, for administration
    pub fn routes_mut(&mut self) -> &mut RouteTable {
        &mut self.routes
    }

    /// Allow messages to and from another spoke, through the hub
    pub fn connect_spoke(&mut self, spoke_chain_id: ChainId) {
        self.routes.set_route(spoke_chain_id, TransportPath::ViaHub);
    }

    /// Outbound bundles
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Proven roots and deliveries
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Register a contract on this chain
    pub fn register_receiver(&mut self, address: Address, receiver: Arc<dyn MessageReceiver>) {
        self.inbox.register_receiver(address, receiver);
    }

    /// Events emitted so far
    pub fn events(&self) -> &[RelayEvent] {
        &self.events
    }

    /// Take the events emitted so far
    pub fn drain_events(&mut self) -> Vec<RelayEvent> {
        std::mem::take(&mut self.events)
    }

    /// Send a cross-chain call. Returns the message id.
    ///
    /// The bundle is committed right away once it is full. A failed
    /// auto-commit leaves the bundle open; the message itself is accepted.
    #[instrument(skip(self, data), fields(chain_id = self.chain_id))]
    pub fn send_message(
        &mut self,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: Vec<u8>,
        fee: U256,
        now: u64,
    ) -> RelayResult<H256> {
        self.routes
            .resolve_transport_path(self.chain_id, to_chain_id)?;

        let message = self.outbox.append(from, to_chain_id, to, data, fee, now)?;
        let message_id = message.id();

        self.events.push(RelayEvent::MessageSent {
            message_id,
            from,
            to_chain_id,
            to,
        });
        self.events.push(RelayEvent::MessageBundled {
            bundle_id: message.bundle_nonce,
            tree_index: message.tree_index,
            message_id,
        });
        info!(message_id = %fmt_bytes(message_id.as_bytes()), "Message sent");

        if self.outbox.is_full(to_chain_id) {
            if let Err(error) = self.commit_bundle(to_chain_id, now) {
                warn!(%error, to_chain_id, "Failed to auto-commit full bundle");
            }
        }

        Ok(message_id)
    }

    /// Freeze the open bundle to `to_chain_id` and send its commitment to the
    /// hub.
    #[instrument(err, skip(self), fields(chain_id = self.chain_id))]
    pub fn commit_bundle(&mut self, to_chain_id: ChainId, now: u64) -> RelayResult<Bundle> {
        let bundle = self.outbox.seal(to_chain_id, now)?;
        self.hub_connector
            .dispatch_message(self.hub_chain_id(), bundle.commitment().to_vec())?;

        self.events.push(RelayEvent::BundleCommitted {
            bundle_id: bundle.bundle_id,
            bundle_root: bundle.bundle_root,
            bundle_fees: bundle.bundle_fees,
            to_chain_id,
            commit_time: now,
        });
        info!(
            bundle_id = %fmt_bytes(bundle.bundle_id.as_bytes()),
            root = %fmt_bytes(bundle.bundle_root.as_bytes()),
            messages = bundle.message_ids.len(),
            "Committed bundle"
        );
        self.outbox.mark_committed(bundle.clone());
        Ok(bundle)
    }

    /// Commit every open bundle older than the configured age
    pub fn commit_expired(&mut self, now: u64) -> RelayResult<Vec<Bundle>> {
        self.outbox
            .expired(now)
            .into_iter()
            .map(|to_chain_id| self.commit_bundle(to_chain_id, now))
            .collect()
    }

    /// Execute a message of a proven bundle on this chain.
    #[instrument(skip(self, data, proof), fields(chain_id = self.chain_id))]
    pub fn relay_message(
        &mut self,
        from_chain_id: ChainId,
        from: Address,
        to_chain_id: ChainId,
        to: Address,
        data: &[u8],
        proof: &BundleProof,
    ) -> RelayResult<H256> {
        let message_id =
            self.inbox
                .relay_message(from_chain_id, from, to_chain_id, to, data, proof)?;
        self.events.push(RelayEvent::MessageRelayed {
            message_id,
            from_chain_id,
            from,
            to,
        });
        info!(message_id = %fmt_bytes(message_id.as_bytes()), "Message relayed");
        Ok(message_id)
    }

    /// Accept a bundle root relayed by the hub.
    pub fn receive_commitment(
        &mut self,
        source_chain_id: ChainId,
        payload: CommitmentPayload,
    ) -> RelayResult<()> {
        let hub_chain_id = self.hub_chain_id();
        if source_chain_id != hub_chain_id {
            return Err(RelayError::InvalidSender {
                expected: hub_chain_id,
                actual: source_chain_id,
            });
        }
        if payload.to_chain_id != self.chain_id {
            return Err(RelayError::InvalidRoute(payload.to_chain_id));
        }
        self.routes
            .resolve_transport_path(payload.from_chain_id, self.chain_id)?;

        if self.inbox.prove_bundle(payload.key(), payload.bundle_root)? {
            self.events.push(RelayEvent::CommitmentProven {
                from_chain_id: payload.from_chain_id,
                bundle_id: payload.bundle_id,
                bundle_root: payload.bundle_root,
            });
        }
        Ok(())
    }
}

impl ConnectorReceiver for SpokeNode {
    #[instrument(err, skip(self, payload), fields(chain_id = self.chain_id))]
    fn on_message_received(
        &mut self,
        source_chain_id: ChainId,
        payload: &[u8],
        _now: u64,
    ) -> RelayResult<()> {
        let payload = CommitmentPayload::read_from(&mut &payload[..])?;
        self.receive_commitment(source_chain_id, payload)
    }
}
