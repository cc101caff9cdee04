use std::fmt::Debug;

use auto_impl::auto_impl;

use crate::{CollaboratorError, CrossChainContext};

/// A contract able to receive relayed calls.
#[auto_impl(&, Box, Arc)]
pub trait MessageReceiver: Send + Sync + Debug {
    /// Handle the call `data`. `ctx` exposes the bridge as the caller plus the
    /// cross-chain sender and origin chain.
    fn receive_message(&self, ctx: &CrossChainContext, data: &[u8]) -> Result<(), CollaboratorError>;
}
