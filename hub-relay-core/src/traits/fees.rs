use std::fmt::Debug;

use auto_impl::auto_impl;

use crate::{Address, U256};

/// Fee treasury seen from the hub.
///
/// The relay engine only reports collected bundle fees and relayer rewards;
/// balances, targets and excess distribution belong to the implementation.
#[auto_impl(&, Box, Arc)]
pub trait FeeDistributor: Send + Sync + Debug {
    /// Record bundle fees arriving with a commitment
    fn record_fee(&self, amount: U256);

    /// Credit `amount` to the relayer of a commitment
    fn pay_fee(&self, relayer: Address, amount: U256);

    /// Move everything above the configured target balance to the treasury.
    /// Returns the amount moved.
    fn withdraw_excess(&self) -> U256;
}
