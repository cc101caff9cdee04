#![allow(non_snake_case)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use mockall::*;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use hub_relay_core::{utils::fmt_bytes, ChainId, Connector, RelayError, RelayResult, H256};

/// A payload in flight between two chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Sending chain
    pub source_chain_id: ChainId,
    /// Receiving chain
    pub destination_chain_id: ChainId,
    /// Transport reference returned to the sender
    pub transport_ref: H256,
    /// Opaque payload
    #[serde(serialize_with = "hex_bytes")]
    pub payload: Vec<u8>,
}

fn hex_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&fmt_bytes(bytes))
}

/// Transport refused a payload
#[derive(Debug, thiserror::Error)]
#[error("Connector {source_chain_id} -> {destination_chain_id} is offline")]
pub struct ConnectorOffline {
    /// Sending chain
    pub source_chain_id: ChainId,
    /// Receiving chain
    pub destination_chain_id: ChainId,
}

#[derive(Debug, Default)]
struct Link {
    queue: Mutex<VecDeque<Envelope>>,
    last: Mutex<Option<Envelope>>,
    offline: AtomicBool,
    sequence: AtomicU64,
}

/// A one-way at-least-once queue from `source_chain_id` to
/// `counterpart_chain_id`. Clones share the queue: the sending node owns one,
/// the harness drains another.
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    source_chain_id: ChainId,
    counterpart_chain_id: ChainId,
    link: Arc<Link>,
}

impl InMemoryConnector {
    /// An empty link
    pub fn new(source_chain_id: ChainId, counterpart_chain_id: ChainId) -> Self {
        Self {
            source_chain_id,
            counterpart_chain_id,
            link: Default::default(),
        }
    }

    /// Sending chain
    pub fn source_chain_id(&self) -> ChainId {
        self.source_chain_id
    }

    /// Take everything dispatched and not yet delivered
    pub fn take_pending(&self) -> Vec<Envelope> {
        self.link.queue.lock().drain(..).collect()
    }

    /// Number of payloads in flight
    pub fn pending_len(&self) -> usize {
        self.link.queue.lock().len()
    }

    /// Queue the last dispatched payload again, as a transport retry would.
    /// Returns false if nothing was dispatched yet.
    pub fn replay_last(&self) -> bool {
        let Some(last) = self.link.last.lock().clone() else {
            return false;
        };
        self.link.queue.lock().push_back(last);
        true
    }

    /// Make every following dispatch fail, or succeed again
    pub fn set_offline(&self, offline: bool) {
        self.link.offline.store(offline, Ordering::SeqCst);
    }
}

impl Connector for InMemoryConnector {
    fn counterpart_chain_id(&self) -> ChainId {
        self.counterpart_chain_id
    }

    fn dispatch_message(
        &self,
        destination_chain_id: ChainId,
        payload: Vec<u8>,
    ) -> RelayResult<H256> {
        if destination_chain_id != self.counterpart_chain_id {
            return Err(RelayError::InvalidRoute(destination_chain_id));
        }
        if self.link.offline.load(Ordering::SeqCst) {
            return Err(RelayError::from_connector_error(ConnectorOffline {
                source_chain_id: self.source_chain_id,
                destination_chain_id,
            }));
        }

        let sequence = self.link.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            source_chain_id: self.source_chain_id,
            destination_chain_id,
            transport_ref: H256::from_low_u64_be(sequence + 1),
            payload,
        };
        let transport_ref = envelope.transport_ref;
        *self.link.last.lock() = Some(envelope.clone());
        self.link.queue.lock().push_back(envelope);
        Ok(transport_ref)
    }
}

mock! {
    pub Connector {
        pub fn _counterpart_chain_id(&self) -> ChainId {}

        pub fn _dispatch_message(
            &self,
            destination_chain_id: ChainId,
            payload: Vec<u8>,
        ) -> RelayResult<H256> {}
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockConnector")
    }
}

impl Connector for MockConnector {
    fn counterpart_chain_id(&self) -> ChainId {
        self._counterpart_chain_id()
    }

    fn dispatch_message(
        &self,
        destination_chain_id: ChainId,
        payload: Vec<u8>,
    ) -> RelayResult<H256> {
        self._dispatch_message(destination_chain_id, payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clones_share_the_queue() {
        let sender = InMemoryConnector::new(1, 2);
        let observer = sender.clone();

        assert!(!observer.replay_last());
        let first = sender.dispatch_message(2, vec![1]).unwrap();
        let second = sender.dispatch_message(2, vec![2]).unwrap();
        assert_ne!(first, second);
        assert_eq!(observer.pending_len(), 2);

        assert!(observer.replay_last());
        let delivered = observer.take_pending();
        assert_eq!(delivered.len(), 3);
        assert_eq!(delivered[1], delivered[2]);
        assert_eq!(sender.pending_len(), 0);
    }

    #[test]
    fn refuses_other_destinations_and_outages() {
        let connector = InMemoryConnector::new(1, 2);
        assert!(matches!(
            connector.dispatch_message(3, vec![]),
            Err(RelayError::InvalidRoute(3))
        ));

        connector.set_offline(true);
        let err = connector.dispatch_message(2, vec![]).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("offline"));
        assert_eq!(connector.pending_len(), 0);

        connector.set_offline(false);
        connector.dispatch_message(2, vec![]).unwrap();
        assert_eq!(connector.pending_len(), 1);
    }
}
