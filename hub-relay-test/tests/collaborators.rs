mod common;

use std::sync::Arc;

use mockall::predicate::*;

use common::*;
use hub_relay_core::{
    models::{BatchPolicy, FeeConfig, HubNode, SpokeNode},
    CommitmentPayload, ConnectorReceiver, Encode, RelayError, H256, U256,
    COMMITMENT_PAYLOAD_LEN,
};
use hub_relay_test::{
    bridge_address,
    mocks::{ConnectorOffline, MockConnector, MockFeeDistributor, MockMessageReceiver},
};

#[test]
fn spoke_sends_commitments_to_its_hub() {
    let mut connector = MockConnector::new();
    connector.expect__counterpart_chain_id().returning(|| HUB);
    connector
        .expect__dispatch_message()
        .withf(|destination, payload| *destination == HUB && payload.len() == COMMITMENT_PAYLOAD_LEN)
        .times(1)
        .returning(|_, _| Ok(H256::repeat_byte(0xaa)));

    let mut spoke = SpokeNode::new(
        S1,
        bridge_address(S1),
        BatchPolicy::default(),
        Box::new(connector),
    );
    assert_eq!(spoke.hub_chain_id(), HUB);

    spoke
        .send_message(sender(), HUB, target(), b"call".to_vec(), fee(), 0)
        .unwrap();
    let bundle = spoke.commit_bundle(HUB, 10).unwrap();
    assert_eq!(bundle.commit_time, 10);
    assert!(matches!(
        spoke.commit_bundle(HUB, 11),
        Err(RelayError::NoPendingBundle(HUB))
    ));
}

#[test]
fn spoke_keeps_the_bundle_when_dispatch_fails() {
    let mut connector = MockConnector::new();
    connector.expect__counterpart_chain_id().returning(|| HUB);
    connector
        .expect__dispatch_message()
        .times(1)
        .returning(|destination_chain_id, _| {
            Err(RelayError::from_connector_error(ConnectorOffline {
                source_chain_id: S1,
                destination_chain_id,
            }))
        });

    let mut spoke = SpokeNode::new(
        S1,
        bridge_address(S1),
        BatchPolicy::default(),
        Box::new(connector),
    );
    let bundle_id = spoke.outbox().next_bundle_id(HUB);
    spoke
        .send_message(sender(), HUB, target(), b"call".to_vec(), fee(), 0)
        .unwrap();

    assert!(spoke.commit_bundle(HUB, 10).unwrap_err().is_retryable());
    assert_eq!(spoke.outbox().pending(HUB).unwrap().len(), 1);
    assert_eq!(spoke.outbox().next_bundle_id(HUB), bundle_id);
}

#[test]
fn hub_books_and_pays_fees() {
    let mut fees = MockFeeDistributor::new();
    fees.expect__record_fee()
        .with(eq(U256::from(500u64)))
        .times(1)
        .return_const(());
    fees.expect__pay_fee()
        .with(eq(relayer()), eq(U256::from(250u64)))
        .times(1)
        .return_const(());

    let mut spoke_link = MockConnector::new();
    spoke_link.expect__counterpart_chain_id().returning(|| S1);
    spoke_link.expect__dispatch_message().times(0);

    let mut hub = HubNode::new(
        HUB,
        bridge_address(HUB),
        BatchPolicy::default(),
        FeeConfig {
            relay_window: 100,
            ..Default::default()
        },
        Box::new(fees),
    );
    hub.set_spoke_connector(S1, Box::new(spoke_link), 60);

    let payload = CommitmentPayload {
        from_chain_id: S1,
        to_chain_id: HUB,
        bundle_id: H256::repeat_byte(1),
        bundle_root: H256::repeat_byte(2),
        bundle_fees: U256::from(500u64),
        commit_time: 1_000,
    };
    hub.on_message_received(S1, &payload.to_vec(), 1_000)
        .unwrap();
    // redelivery books nothing
    hub.on_message_received(S1, &payload.to_vec(), 1_001)
        .unwrap();

    assert_eq!(
        hub.commitment(&payload.key()).unwrap().relay_window_start,
        1_060
    );
    let reward = hub
        .relay_commitment(S1, HUB, payload.bundle_id, relayer(), 1_110)
        .unwrap();
    assert_eq!(reward, U256::from(250u64));
    assert_eq!(
        hub.inbox().proven_root(S1, HUB, payload.bundle_id),
        Some(payload.bundle_root)
    );
}

#[test]
fn receivers_see_the_cross_chain_context() {
    let mut receiver = MockMessageReceiver::new();
    receiver
        .expect__receive_message()
        .withf(|ctx, data| {
            ctx.msg_sender == bridge_address(S2)
                && ctx.x_domain_sender == sender()
                && ctx.x_domain_chain_id == S1
                && data == b"context"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let mut network = network();
    network
        .register_receiver_with(S2, target(), Arc::new(receiver))
        .unwrap();

    let message_id = send(&mut network, S1, S2, b"context");
    network.transport(S1, S2, relayer()).unwrap();
    assert_eq!(network.relay_message(message_id).unwrap(), message_id);
}
