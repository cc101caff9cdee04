use std::fmt::Debug;

use auto_impl::auto_impl;

use crate::{ChainId, RelayResult, H256};

/// The native cross-chain transport between two chains.
///
/// Delivery is at-least-once with unbounded latency; a dispatch only hands the
/// payload to the transport and never waits for the remote chain.
#[auto_impl(&, Box, Arc)]
pub trait Connector: Send + Sync + Debug {
    /// The chain on the other end of this connector
    fn counterpart_chain_id(&self) -> ChainId;

    /// Hand `payload` to the transport. Returns a transport reference for the
    /// dispatched message.
    fn dispatch_message(&self, destination_chain_id: ChainId, payload: Vec<u8>)
        -> RelayResult<H256>;
}

/// A chain-side endpoint the transport delivers payloads to.
pub trait ConnectorReceiver {
    /// Called by the transport when a payload from `source_chain_id` lands on
    /// this chain.
    fn on_message_received(
        &mut self,
        source_chain_id: ChainId,
        payload: &[u8],
        now: u64,
    ) -> RelayResult<()>;
}
