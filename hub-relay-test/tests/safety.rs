mod common;

use common::*;
use hub_relay_core::{Address, CommitmentPayload, Encode, RelayError, H256, U256};

#[test]
fn unroutable_messages_leave_no_trace() {
    let mut network = network();

    assert!(matches!(
        network.send_message(S1, sender(), 999, target(), b"x", fee()),
        Err(RelayError::InvalidRoute(999))
    ));
    assert!(matches!(
        network.send_message(S1, sender(), S1, target(), b"x", fee()),
        Err(RelayError::InvalidRoute(S1))
    ));
    assert!(matches!(
        network.send_message(999, sender(), HUB, target(), b"x", fee()),
        Err(RelayError::UnsupportedChainId(999))
    ));
    assert!(matches!(
        network.send_message(S1, sender(), HUB, target(), b"x", fee() - 1),
        Err(RelayError::InsufficientFee { .. })
    ));

    let outbox = network.spoke(S1).unwrap().outbox();
    assert!(outbox.pending(999).is_none());
    assert!(outbox.pending(HUB).is_none());
    assert!(network.journal().is_empty());
}

#[test]
fn messages_execute_once() {
    let mut network = network();
    let receiver = network.register_receiver(HUB, target()).unwrap();
    let message_id = send(&mut network, S1, HUB, b"once");
    network.transport(S1, HUB, relayer()).unwrap();

    network.relay_message(message_id).unwrap();
    let err = network.relay_message(message_id).unwrap_err();
    assert!(matches!(err, RelayError::AlreadyDelivered(id) if id == message_id));
    assert!(err.is_already_done());
    assert_eq!(receiver.call_count(), 1);
}

#[test]
fn commitments_wait_for_the_exit_time() {
    let mut network = network();
    send(&mut network, S1, HUB, b"early");
    let bundle = network.commit(S1, HUB).unwrap();
    network.deliver(S1, HUB).unwrap();

    assert!(matches!(
        network.relay_commitment(S1, HUB, bundle.bundle_id, relayer()),
        Err(RelayError::RelayWindowNotElapsed {
            relay_window_start: EXIT_TIME,
            now: 0
        })
    ));
    network.advance(EXIT_TIME - 1);
    assert!(network
        .relay_commitment(S1, HUB, bundle.bundle_id, relayer())
        .is_err());
    assert!(network.events_named("CommitmentRelayed").is_empty());

    network.advance(1);
    network
        .relay_commitment(S1, HUB, bundle.bundle_id, relayer())
        .unwrap();
    assert_eq!(network.events_named("CommitmentRelayed").len(), 1);
}

#[test]
fn only_the_first_relayer_is_paid() {
    let mut network = network();
    let latecomer = Address::repeat_byte(0x1a);

    send(&mut network, S1, S2, b"race");
    let bundle = network.commit(S1, S2).unwrap();
    network.deliver(S1, HUB).unwrap();
    network.advance(EXIT_TIME);

    let results = network.relay_ready(relayer());
    assert_eq!(results.len(), 1);
    assert_eq!(*results[0].1.as_ref().unwrap(), fee());

    let err = network
        .relay_commitment(S1, S2, bundle.bundle_id, latecomer)
        .unwrap_err();
    assert!(matches!(err, RelayError::AlreadyRelayed(id) if id == bundle.bundle_id));
    assert!(err.is_already_done());

    assert_eq!(network.fees().paid_to(relayer()), fee());
    assert_eq!(network.fees().paid_to(latecomer), U256::zero());
    assert_eq!(network.link(HUB, S2).unwrap().pending_len(), 1);
    assert!(network.relay_ready(latecomer).is_empty());
}

#[test]
fn redelivered_payloads_are_ignored() {
    let mut network = network();
    send(&mut network, S1, S2, b"again");
    let bundle = network.commit(S1, S2).unwrap();
    network.deliver(S1, HUB).unwrap();

    assert!(network.link(S1, HUB).unwrap().replay_last());
    assert_eq!(network.deliver(S1, HUB).unwrap(), 1);
    assert_eq!(network.events_named("CommitmentReceived").len(), 1);
    assert_eq!(network.fees().balance(), fee());

    network.advance(EXIT_TIME);
    network
        .relay_commitment(S1, S2, bundle.bundle_id, relayer())
        .unwrap();
    network.deliver(HUB, S2).unwrap();
    assert!(network.link(HUB, S2).unwrap().replay_last());
    assert_eq!(network.deliver(HUB, S2).unwrap(), 1);
    assert_eq!(network.events_named("CommitmentProven").len(), 1);
}

#[test]
fn forged_origins_are_rejected() {
    let mut network = network();
    let forged = CommitmentPayload {
        from_chain_id: S2,
        to_chain_id: HUB,
        bundle_id: H256::repeat_byte(1),
        bundle_root: H256::repeat_byte(2),
        bundle_fees: U256::from(1_000_000u64),
        commit_time: 0,
    };

    // S1's connector claiming to carry an S2 bundle
    assert!(matches!(
        network.inject(S1, HUB, &forged.to_vec()),
        Err(RelayError::InvalidSender {
            expected: S1,
            actual: S2
        })
    ));
    assert!(matches!(
        network.inject(999, HUB, &forged.to_vec()),
        Err(RelayError::UnsupportedChainId(999))
    ));

    // a spoke only listens to the hub
    let to_s1 = CommitmentPayload {
        from_chain_id: S2,
        to_chain_id: S1,
        ..forged
    };
    assert!(matches!(
        network.inject(S2, S1, &to_s1.to_vec()),
        Err(RelayError::InvalidSender {
            expected: HUB,
            actual: S2
        })
    ));

    assert!(network.inject(S2, HUB, &forged.to_vec()[..40]).is_err());
    assert_eq!(network.fees().balance(), U256::zero());
    assert_eq!(network.hub().commitments().count(), 0);
    assert!(network
        .spoke(S1)
        .unwrap()
        .inbox()
        .proven_root(S2, S1, forged.bundle_id)
        .is_none());
}

#[test]
fn conflicting_commitments_are_rejected() {
    let mut network = network();
    let payload = CommitmentPayload {
        from_chain_id: S1,
        to_chain_id: HUB,
        bundle_id: H256::repeat_byte(1),
        bundle_root: H256::repeat_byte(2),
        bundle_fees: fee(),
        commit_time: 0,
    };
    network.inject(S1, HUB, &payload.to_vec()).unwrap();

    let rewritten = CommitmentPayload {
        bundle_root: H256::repeat_byte(3),
        ..payload
    };
    assert!(matches!(
        network.inject(S1, HUB, &rewritten.to_vec()),
        Err(RelayError::ConflictingCommitment(_))
    ));
    let recorded = network.hub().commitment(&payload.key()).unwrap();
    assert_eq!(recorded.payload.bundle_root, payload.bundle_root);
}

#[test]
fn execution_requires_a_valid_proof() {
    let mut network = network();
    let receiver = network.register_receiver(HUB, target()).unwrap();
    let message_id = send(&mut network, S1, HUB, b"genuine");
    send(&mut network, S1, HUB, b"neighbour");
    network.commit(S1, HUB).unwrap();

    // committed, but not relayed yet
    assert!(matches!(
        network.relay_message(message_id),
        Err(RelayError::BundleNotProven(_))
    ));

    network.deliver(S1, HUB).unwrap();
    network.advance(EXIT_TIME);
    network.relay_ready(relayer());

    let proof = network.proof_for(message_id).unwrap();
    assert!(matches!(
        network.relay_message_with(S1, sender(), HUB, target(), b"forged", &proof),
        Err(RelayError::ProofInvalid { .. })
    ));
    assert!(matches!(
        network.relay_message_with(S2, sender(), HUB, target(), b"genuine", &proof),
        Err(RelayError::BundleNotProven(_))
    ));
    assert_eq!(receiver.call_count(), 0);

    network
        .relay_message_with(S1, sender(), HUB, target(), b"genuine", &proof)
        .unwrap();
    assert_eq!(receiver.call_count(), 1);
}

#[test]
fn failed_calls_can_be_retried() {
    let mut network = network();
    let receiver = network.register_receiver(HUB, target()).unwrap();
    let message_id = send(&mut network, S1, HUB, b"retry me");
    network.transport(S1, HUB, relayer()).unwrap();

    receiver.set_revert(Some("paused"));
    let err = network.relay_message(message_id).unwrap_err();
    assert!(matches!(err, RelayError::ReceiverFailed { .. }));
    assert!(err.to_string().contains("paused"));
    assert!(!network.hub().inbox().is_delivered(message_id));
    assert!(network.events_named("MessageRelayed").is_empty());

    receiver.set_revert(None);
    network.relay_message(message_id).unwrap();
    assert_eq!(receiver.call_count(), 1);
    assert_eq!(network.events_named("MessageRelayed").len(), 1);
}

#[test]
fn unknown_recipients_are_not_marked_delivered() {
    let mut network = network();
    let message_id = send(&mut network, S1, HUB, b"nobody home");
    network.transport(S1, HUB, relayer()).unwrap();

    assert!(matches!(
        network.relay_message(message_id),
        Err(RelayError::UnknownRecipient(_))
    ));
    assert!(!network.hub().inbox().is_delivered(message_id));

    network.register_receiver(HUB, target()).unwrap();
    network.relay_message(message_id).unwrap();
}

#[test]
fn offline_connectors_keep_bundles_pending() {
    let mut network = network();
    let link = network.link(S1, HUB).unwrap().clone();
    link.set_offline(true);

    for i in 0..MAX_BUNDLE_MESSAGES {
        // the automatic commit fails, the message is still accepted
        send(&mut network, S1, HUB, &[i as u8]);
    }
    let pending = network.spoke(S1).unwrap().outbox().pending(HUB).unwrap();
    assert_eq!(pending.len(), MAX_BUNDLE_MESSAGES);

    let err = network.commit(S1, HUB).unwrap_err();
    assert!(err.is_retryable());
    assert!(network.events_named("BundleCommitted").is_empty());

    link.set_offline(false);
    let bundle = network.commit(S1, HUB).unwrap();
    assert_eq!(bundle.message_ids.len(), MAX_BUNDLE_MESSAGES);
    assert!(network.spoke(S1).unwrap().outbox().pending(HUB).is_none());
    assert_eq!(link.pending_len(), 1);
}
