use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ChainId, RelayError, RelayResult};

/// How a bundle reaches its destination from this chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportPath {
    /// A connector links the two chains
    Direct,
    /// The commitment transits the hub before reaching the destination
    ViaHub,
}

/// Per-chain routing knowledge.
///
/// A spoke knows the hub (`Direct`) and the other spokes (`ViaHub`). The hub
/// knows every spoke (`Direct`) and forwards between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    local_chain_id: ChainId,
    hub_chain_id: ChainId,
    routes: BTreeMap<ChainId, TransportPath>,
}

impl RouteTable {
    /// Table for a spoke wired to `hub_chain_id`
    pub fn for_spoke(local_chain_id: ChainId, hub_chain_id: ChainId) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(hub_chain_id, TransportPath::Direct);
        Self {
            local_chain_id,
            hub_chain_id,
            routes,
        }
    }

    /// Table for the hub. Spokes are added as they get connected.
    pub fn for_hub(hub_chain_id: ChainId) -> Self {
        Self {
            local_chain_id: hub_chain_id,
            hub_chain_id,
            routes: BTreeMap::new(),
        }
    }

    /// This chain
    pub fn local_chain_id(&self) -> ChainId {
        self.local_chain_id
    }

    /// The hub of the deployment
    pub fn hub_chain_id(&self) -> ChainId {
        self.hub_chain_id
    }

    /// True if this table belongs to the hub
    pub fn is_hub(&self) -> bool {
        self.local_chain_id == self.hub_chain_id
    }

    /// Add or replace the route to `to_chain_id`. Routes to self are ignored.
    pub fn set_route(&mut self, to_chain_id: ChainId, path: TransportPath) {
        if to_chain_id == self.local_chain_id {
            return;
        }
        self.routes.insert(to_chain_id, path);
    }

    /// Forget the route to `to_chain_id`
    pub fn remove_route(&mut self, to_chain_id: ChainId) -> Option<TransportPath> {
        self.routes.remove(&to_chain_id)
    }

    /// Every chain reachable from here
    pub fn destinations(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.routes.keys().copied()
    }

    /// True if `resolve_transport_path(from, to)` succeeds
    pub fn is_route_supported(&self, from_chain_id: ChainId, to_chain_id: ChainId) -> bool {
        self.resolve_transport_path(from_chain_id, to_chain_id)
            .is_ok()
    }

    /// How a bundle from `from_chain_id` to `to_chain_id` moves as seen from
    /// this chain.
    pub fn resolve_transport_path(
        &self,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
    ) -> RelayResult<TransportPath> {
        if from_chain_id == to_chain_id {
            return Err(RelayError::InvalidRoute(to_chain_id));
        }

        if from_chain_id == self.local_chain_id {
            return self
                .routes
                .get(&to_chain_id)
                .copied()
                .ok_or(RelayError::InvalidRoute(to_chain_id));
        }

        let inbound = self
            .routes
            .get(&from_chain_id)
            .copied()
            .ok_or(RelayError::UnsupportedChainId(from_chain_id))?;

        if to_chain_id == self.local_chain_id {
            return Ok(inbound);
        }

        if self.is_hub() && self.routes.contains_key(&to_chain_id) {
            return Ok(TransportPath::ViaHub);
        }

        Err(RelayError::InvalidRoute(to_chain_id))
    }
}
