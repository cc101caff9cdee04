//! Runs a deployment described by the relay settings in memory.
//!
//! The simulator sends a message from the first spoke to the hub and, when a
//! second spoke is configured, one to that spoke. It carries both bundles to
//! their destination, executes the messages and prints the event journal as
//! JSON.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

use color_eyre::{eyre::eyre, Result};
use tracing::info;

use hub_relay_base::Settings;
use hub_relay_core::{Address, ChainId, H256, U256};
use hub_relay_test::Network;

const SENDER: u64 = 0x5e4d;
const TARGET: u64 = 0x7a46;
const RELAYER: u64 = 0x4e1a;

fn message_fee(settings: &Settings, chain_id: ChainId) -> U256 {
    settings
        .spoke(chain_id)
        .map(|spoke| U256::from(spoke.batch.message_fee))
        .unwrap_or_default()
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let settings = Settings::load()?;
    settings.tracing.start_tracing()?;

    let mut network = Network::from_settings(&settings)?;
    let hub = network.hub().chain_id();
    let mut spokes = settings.spokes.values().map(|spoke| spoke.chain_id);
    let origin = spokes
        .next()
        .ok_or_else(|| eyre!("At least one spoke must be configured"))?;
    let remote = spokes.next();

    let sender = Address::from_low_u64_be(SENDER);
    let target = Address::from_low_u64_be(TARGET);
    let relayer = Address::from_low_u64_be(RELAYER);
    let fee = message_fee(&settings, origin);

    let mut destinations = vec![hub];
    destinations.extend(remote);

    let mut sent: Vec<H256> = vec![];
    for &destination in &destinations {
        network.register_receiver(destination, target)?;
        let message_id = network.send_message(
            origin,
            sender,
            destination,
            target,
            format!("hello from {origin}").as_bytes(),
            fee,
        )?;
        sent.push(message_id);
    }

    for &destination in &destinations {
        let bundle = network.transport(origin, destination, relayer)?;
        info!(
            destination,
            bundle_id = ?bundle.bundle_id,
            root = ?bundle.bundle_root,
            "Bundle arrived"
        );
    }

    if !settings.harness.auto_execute {
        for message_id in sent {
            network.relay_message(message_id)?;
        }
    }

    let withdrawn = network.withdraw_excess_fees();
    info!(
        relayer_paid = %network.fees().paid_to(relayer),
        %withdrawn,
        hub_balance = %network.fees().balance(),
        "Simulation complete"
    );

    println!("{}", serde_json::to_string_pretty(network.journal())?);
    Ok(())
}
