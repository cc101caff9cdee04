use std::{collections::BTreeMap, sync::Arc};

use ethers_core::types::U512;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    models::{BatchPolicy, Inbox, Outbox},
    utils::fmt_bytes,
    Address, Bundle, BundleProof, ChainId, Commitment, CommitmentKey, CommitmentPayload,
    CommitmentStatus, Connector, ConnectorReceiver, Decode, Encode, FeeDistributor,
    MessageReceiver, RelayError, RelayEvent, RelayResult, RouteTable, TransportPath, BASIS_POINTS,
    H256, U256,
};

/// Relayer economics of the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    /// Seconds after the relay window opens until the full fee is paid
    pub relay_window: u64,
    /// Absolute cap on a relayer reward
    pub max_bundle_fee: U256,
    /// Cap on a relayer reward, in basis points of the bundle fees. Values
    /// above `BASIS_POINTS` do not raise the reward past the fees.
    pub max_bundle_fee_bps: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            relay_window: 0,
            max_bundle_fee: U256::MAX,
            max_bundle_fee_bps: BASIS_POINTS,
        }
    }
}

impl FeeConfig {
    /// What relaying a commitment carrying `fees` pays at `now`.
    ///
    /// The reward grows linearly from zero at `relay_window_start` to the full
    /// fee one relay window later, and never exceeds either cap.
    pub fn relayer_reward(&self, fees: U256, relay_window_start: u64, now: u64) -> U256 {
        let base = if self.relay_window == 0 {
            fees
        } else {
            let elapsed = now.saturating_sub(relay_window_start).min(self.relay_window);
            let scaled: U512 = fees.full_mul(U256::from(elapsed)) / U512::from(self.relay_window);
            U256::try_from(scaled).unwrap_or(fees)
        };
        base.min(self.max_bundle_fee)
            .min(mul_bps(fees, self.max_bundle_fee_bps))
    }
}

fn mul_bps(amount: U256, bps: u32) -> U256 {
    let scale = U256::from(BASIS_POINTS);
    let bps = U256::from(bps.min(BASIS_POINTS));
    // split to stay within 256 bits
    (amount / scale) * bps + (amount % scale) * bps / scale
}

#[derive(Debug)]
struct SpokeLink {
    connector: Box<dyn Connector>,
    exit_time: u64,
}

/// The hub chain.
///
/// Records spoke commitments, releases them to relayers once their exit time
/// passed and either proves them locally or forwards them to the destination
/// spoke.
#[derive(Debug)]
pub struct HubNode {
    chain_id: ChainId,
    routes: RouteTable,
    spokes: BTreeMap<ChainId, SpokeLink>,
    fee_config: FeeConfig,
    fee_distributor: Box<dyn FeeDistributor>,
    commitments: BTreeMap<CommitmentKey, Commitment>,
    outbox: Outbox,
    inbox: Inbox,
    events: Vec<RelayEvent>,
}

impl HubNode {
    /// Instantiate a hub without spokes.
    pub fn new(
        chain_id: ChainId,
        bridge: Address,
        policy: BatchPolicy,
        fee_config: FeeConfig,
        fee_distributor: Box<dyn FeeDistributor>,
    ) -> Self {
        Self {
            chain_id,
            routes: RouteTable::for_hub(chain_id),
            spokes: BTreeMap::new(),
            fee_config,
            fee_distributor,
            commitments: BTreeMap::new(),
            outbox: Outbox::new(chain_id, policy),
            inbox: Inbox::new(chain_id, bridge),
            events: vec![],
        }
    }

    /// This chain
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Relayer economics
    pub fn fee_config(&self) -> &FeeConfig {
        &self.fee_config
    }

    /// Routing table
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Outbound bundles originated on the hub
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Proven roots and deliveries on the hub
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Events emitted so far
    pub fn events(&self) -> &[RelayEvent] {
        &self.events
    }

    /// Take the events emitted so far
    pub fn drain_events(&mut self) -> Vec<RelayEvent> {
        std::mem::take(&mut self.events)
    }

    /// Register a contract on the hub chain
    pub fn register_receiver(&mut self, address: Address, receiver: Arc<dyn MessageReceiver>) {
        self.inbox.register_receiver(address, receiver);
    }

    /// Connect a spoke, or replace its connector and exit time.
    pub fn set_spoke_connector(
        &mut self,
        spoke_chain_id: ChainId,
        connector: Box<dyn Connector>,
        exit_time: u64,
    ) {
        if connector.counterpart_chain_id() != spoke_chain_id {
            warn!(
                spoke_chain_id,
                counterpart = connector.counterpart_chain_id(),
                "Connector counterpart does not match the spoke"
            );
        }
        self.routes.set_route(spoke_chain_id, TransportPath::Direct);
        self.spokes.insert(
            spoke_chain_id,
            SpokeLink {
                connector,
                exit_time,
            },
        );
        info!(spoke_chain_id, exit_time, "Connected spoke");
    }

    /// Exit time of a connected spoke
    pub fn spoke_exit_time(&self, spoke_chain_id: ChainId) -> RelayResult<u64> {
        self.spokes
            .get(&spoke_chain_id)
            .map(|link| link.exit_time)
            .ok_or(RelayError::UnsupportedChainId(spoke_chain_id))
    }

    /// Connected spokes
    pub fn spoke_chain_ids(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.spokes.keys().copied()
    }

    /// A commitment record
    pub fn commitment(&self, key: &CommitmentKey) -> Option<&Commitment> {
        self.commitments.get(key)
    }

    /// All commitment records
    pub fn commitments(&self) -> impl Iterator<Item = &Commitment> {
        self.commitments.values()
    }

    /// Commitments a relay at `now` would succeed on
    pub fn relayable_commitments(&self, now: u64) -> Vec<CommitmentKey> {
        self.commitments
            .values()
            .filter(|c| c.is_relayable(now))
            .map(Commitment::key)
            .collect()
    }

    /// Record a commitment delivered by the connector of `source_chain_id`.
    pub fn receive_commitment(
        &mut self,
        source_chain_id: ChainId,
        payload: CommitmentPayload,
    ) -> RelayResult<()> {
        let exit_time = self.spoke_exit_time(source_chain_id)?;
        if payload.from_chain_id != source_chain_id {
            return Err(RelayError::InvalidSender {
                expected: source_chain_id,
                actual: payload.from_chain_id,
            });
        }
        self.routes
            .resolve_transport_path(payload.from_chain_id, payload.to_chain_id)?;

        let key = payload.key();
        if let Some(existing) = self.commitments.get(&key) {
            if existing.payload == payload {
                debug!(%key, "Ignoring duplicate commitment");
                return Ok(());
            }
            warn!(%key, "Commitment conflicts with a recorded one");
            return Err(RelayError::ConflictingCommitment(payload.bundle_id));
        }

        let commitment = Commitment::pending(payload, exit_time);
        self.fee_distributor.record_fee(payload.bundle_fees);
        self.events.push(RelayEvent::CommitmentReceived {
            from_chain_id: payload.from_chain_id,
            to_chain_id: payload.to_chain_id,
            bundle_id: payload.bundle_id,
            bundle_root: payload.bundle_root,
            transport_fee: payload.bundle_fees,
            relay_window_start: commitment.relay_window_start,
        });
        info!(
            %key,
            relay_window_start = commitment.relay_window_start,
            fees = %payload.bundle_fees,
            "Received commitment"
        );
        self.commitments.insert(key, commitment);
        Ok(())
    }

    /// Move a commitment to its destination and pay `relayer`. Returns the
    /// reward paid.
    #[instrument(err, skip(self), fields(chain_id = self.chain_id))]
    pub fn relay_commitment(
        &mut self,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
        bundle_id: H256,
        relayer: Address,
        now: u64,
    ) -> RelayResult<U256> {
        let key = CommitmentKey {
            from_chain_id,
            to_chain_id,
            bundle_id,
        };
        let commitment = self
            .commitments
            .get(&key)
            .cloned()
            .ok_or(RelayError::UnknownCommitment(bundle_id))?;

        if commitment.is_relayed() {
            return Err(RelayError::AlreadyRelayed(bundle_id));
        }
        if now < commitment.relay_window_start {
            return Err(RelayError::RelayWindowNotElapsed {
                relay_window_start: commitment.relay_window_start,
                now,
            });
        }

        let payload = commitment.payload;
        let reward = self.fee_config.relayer_reward(
            payload.bundle_fees,
            commitment.relay_window_start,
            now,
        );

        let status = if to_chain_id == self.chain_id {
            self.inbox.prove_bundle(key, payload.bundle_root)?;
            CommitmentStatus::Proven
        } else {
            let link = self
                .spokes
                .get(&to_chain_id)
                .ok_or(RelayError::InvalidRoute(to_chain_id))?;
            link.connector
                .dispatch_message(to_chain_id, payload.to_vec())?;
            CommitmentStatus::Forwarded
        };

        if let Some(record) = self.commitments.get_mut(&key) {
            record.status = status;
            record.relayer = Some(relayer);
            record.relayer_reward = reward;
        }
        self.fee_distributor.pay_fee(relayer, reward);

        self.events.push(RelayEvent::CommitmentRelayed {
            from_chain_id,
            to_chain_id,
            bundle_id,
            transport_fee: payload.bundle_fees,
            relayer_reward: reward,
            relay_window_start: commitment.relay_window_start,
            relayer,
        });
        self.events.push(match status {
            CommitmentStatus::Proven => RelayEvent::CommitmentProven {
                from_chain_id,
                bundle_id,
                bundle_root: payload.bundle_root,
            },
            _ => RelayEvent::CommitmentForwarded {
                from_chain_id,
                to_chain_id,
                bundle_id,
                bundle_root: payload.bundle_root,
            },
        });
        info!(%key, ?status, %reward, "Relayed commitment");
        Ok(reward)
    }

    /// Send a call from the hub chain to a spoke. Returns the message id.
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

        if self.outbox.is_full(to_chain_id) {
            if let Err(error) = self.commit_bundle(to_chain_id, now) {
                warn!(%error, to_chain_id, "Failed to auto-commit full bundle");
            }
        }
        Ok(message_id)
    }

    /// Freeze the open hub bundle to `to_chain_id` and hand it straight to the
    /// spoke's connector. Hub bundles skip the exit window.
    #[instrument(err, skip(self), fields(chain_id = self.chain_id))]
    pub fn commit_bundle(&mut self, to_chain_id: ChainId, now: u64) -> RelayResult<Bundle> {
        let bundle = self.outbox.seal(to_chain_id, now)?;
        let link = self
            .spokes
            .get(&to_chain_id)
            .ok_or(RelayError::InvalidRoute(to_chain_id))?;
        link.connector
            .dispatch_message(to_chain_id, bundle.commitment().to_vec())?;

        self.fee_distributor.record_fee(bundle.bundle_fees);
        self.events.push(RelayEvent::BundleCommitted {
            bundle_id: bundle.bundle_id,
            bundle_root: bundle.bundle_root,
            bundle_fees: bundle.bundle_fees,
            to_chain_id,
            commit_time: now,
        });
        info!(
            bundle_id = %fmt_bytes(bundle.bundle_id.as_bytes()),
            messages = bundle.message_ids.len(),
            "Committed hub bundle"
        );
        self.outbox.mark_committed(bundle.clone());
        Ok(bundle)
    }

    /// Commit every open hub bundle older than the configured age
    pub fn commit_expired(&mut self, now: u64) -> RelayResult<Vec<Bundle>> {
        self.outbox
            .expired(now)
            .into_iter()
            .map(|to_chain_id| self.commit_bundle(to_chain_id, now))
            .collect()
    }

    /// Execute a message of a bundle proven on the hub.
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

    /// Move fees above the distributor's target balance out. Returns the
    /// amount moved.
    pub fn withdraw_excess_fees(&self) -> U256 {
        let amount = self.fee_distributor.withdraw_excess();
        info!(%amount, "Withdrew excess fees");
        amount
    }
}

impl ConnectorReceiver for HubNode {
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
