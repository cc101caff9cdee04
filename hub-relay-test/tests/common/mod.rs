#![allow(dead_code)]

use hub_relay_base::{BatchSettings, HubSettings, SpokeSettings};
use hub_relay_core::{Address, ChainId, U256};
use hub_relay_test::Network;

pub const HUB: ChainId = 11155111;
pub const S1: ChainId = 11155420;
pub const S2: ChainId = 84532;

pub const EXIT_TIME: u64 = 3600;
pub const MESSAGE_FEE: u64 = 1_000;
pub const MAX_BUNDLE_MESSAGES: usize = 8;

pub fn sender() -> Address {
    Address::from_low_u64_be(0x5e4d)
}

pub fn target() -> Address {
    Address::from_low_u64_be(0x7a46)
}

pub fn relayer() -> Address {
    Address::from_low_u64_be(0x4e1a)
}

pub fn treasury() -> Address {
    Address::from_low_u64_be(0xfee5)
}

pub fn fee() -> U256 {
    U256::from(MESSAGE_FEE)
}

pub fn batch() -> BatchSettings {
    BatchSettings {
        max_bundle_messages: MAX_BUNDLE_MESSAGES,
        max_bundle_age: None,
        message_fee: MESSAGE_FEE,
    }
}

pub fn hub_settings() -> HubSettings {
    HubSettings {
        chain_id: HUB,
        relay_window: 0,
        max_bundle_fee: None,
        max_bundle_fee_bps: 10_000,
        target_balance: 0,
        excess_fees_recipient: None,
        batch: batch(),
    }
}

pub fn spoke_settings(chain_id: ChainId) -> SpokeSettings {
    SpokeSettings {
        chain_id,
        exit_time: EXIT_TIME,
        batch: batch(),
    }
}

/// Hub plus two spokes, full fee paid as soon as the exit time passed
pub fn network() -> Network {
    network_with(hub_settings(), false)
}

pub fn network_with(hub: HubSettings, auto_execute: bool) -> Network {
    Network::new(
        &hub,
        &[spoke_settings(S1), spoke_settings(S2)],
        auto_execute,
        treasury(),
    )
}

pub fn send(network: &mut Network, from: ChainId, to: ChainId, data: &[u8]) -> hub_relay_core::H256 {
    network
        .send_message(from, sender(), to, target(), data, fee())
        .unwrap()
}
