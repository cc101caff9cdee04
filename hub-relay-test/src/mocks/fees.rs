#![allow(non_snake_case)]

use std::{collections::HashMap, sync::Arc};

use mockall::*;
use parking_lot::Mutex;

use hub_relay_core::{Address, FeeDistributor, U256};

#[derive(Debug, Default)]
struct Vault {
    balance: U256,
    treasury_balance: U256,
    payouts: HashMap<Address, U256>,
}

/// Fee treasury of the hub. Clones share the same balances.
///
/// Bundle fees raise the balance, relayer rewards lower it, and everything
/// above `target_balance` can be swept to `treasury`.
#[derive(Debug, Clone)]
pub struct InMemoryFeeVault {
    target_balance: U256,
    treasury: Address,
    vault: Arc<Mutex<Vault>>,
}

impl InMemoryFeeVault {
    /// An empty vault
    pub fn new(target_balance: U256, treasury: Address) -> Self {
        Self {
            target_balance,
            treasury,
            vault: Default::default(),
        }
    }

    /// Current balance
    pub fn balance(&self) -> U256 {
        self.vault.lock().balance
    }

    /// Total paid to `relayer`
    pub fn paid_to(&self, relayer: Address) -> U256 {
        self.vault
            .lock()
            .payouts
            .get(&relayer)
            .copied()
            .unwrap_or_default()
    }

    /// Total swept to the treasury
    pub fn treasury_balance(&self) -> U256 {
        self.vault.lock().treasury_balance
    }

    /// Where excess fees go
    pub fn treasury(&self) -> Address {
        self.treasury
    }
}

impl FeeDistributor for InMemoryFeeVault {
    fn record_fee(&self, amount: U256) {
        let mut vault = self.vault.lock();
        vault.balance = vault.balance.saturating_add(amount);
    }

    fn pay_fee(&self, relayer: Address, amount: U256) {
        let mut vault = self.vault.lock();
        vault.balance = vault.balance.saturating_sub(amount);
        let paid = vault.payouts.entry(relayer).or_default();
        *paid = paid.saturating_add(amount);
    }

    fn withdraw_excess(&self) -> U256 {
        let mut vault = self.vault.lock();
        if vault.balance <= self.target_balance {
            return U256::zero();
        }
        let excess = vault.balance - self.target_balance;
        vault.balance = self.target_balance;
        vault.treasury_balance = vault.treasury_balance.saturating_add(excess);
        excess
    }
}

mock! {
    pub FeeDistributor {
        pub fn _record_fee(&self, amount: U256) {}

        pub fn _pay_fee(&self, relayer: Address, amount: U256) {}

        pub fn _withdraw_excess(&self) -> U256 {}
    }
}

impl std::fmt::Debug for MockFeeDistributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockFeeDistributor")
    }
}

impl FeeDistributor for MockFeeDistributor {
    fn record_fee(&self, amount: U256) {
        self._record_fee(amount)
    }

    fn pay_fee(&self, relayer: Address, amount: U256) {
        self._pay_fee(relayer, amount)
    }

    fn withdraw_excess(&self) -> U256 {
        self._withdraw_excess()
    }
}
