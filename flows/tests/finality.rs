mod common;

use common::{participant, Harness, TestNode, START_MILLIS};
use seal_flows::{
    FinalityFlow, FinalityOptions, FinalityOutcome, FinalityState, FlowError, NotaryClientState,
    FINALITY_PROTOCOL,
};
use seal_notary::NotaryMode;
use seal_store::CheckpointStore;
use seal_transactions::SignedTransaction;
use seal_types::{AbstractParty, TimeWindow, Timestamp};
use std::time::Duration;

async fn finalise(node: &TestNode, stx: &SignedTransaction) -> Result<FinalityOutcome, FlowError> {
    FinalityFlow::new(node.ctx.clone(), stx.clone(), FinalityOptions::default())
        .run()
        .await
}

/// Issue a state owned by `owners` and finalise it from `issuer`.
async fn issue(h: &Harness, issuer: &TestNode, owners: &[&TestNode]) -> SignedTransaction {
    let stx = h
        .builder()
        .add_output("Cash", b"100".to_vec(), owners.iter().map(|n| participant(n)))
        .add_command("Issue", vec![issuer.keys.public])
        .sign_with(&[&issuer.keys]);
    finalise(issuer, &stx).await.unwrap();
    stx
}

#[tokio::test]
async fn issuance_skips_the_notary() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);

    let stx = h
        .builder()
        .add_output("Cash", b"100".to_vec(), [participant(&alice), participant(&bob)])
        .add_command("Issue", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let outcome = finalise(&alice, &stx).await.unwrap();

    assert!(outcome.fully_delivered());
    assert_eq!(outcome.transaction, stx);
    assert!(alice.has(&stx));
    assert!(bob.has(&stx));
    assert_eq!(h.notary_log.append_count(), 0);
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn move_is_notarised_and_sent_to_every_other_participant() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let carol = h.node("Carol", 3);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output(
            "Cash",
            b"100".to_vec(),
            [participant(&alice), participant(&bob), participant(&carol)],
        )
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let outcome = finalise(&alice, &stx).await.unwrap();

    assert!(outcome.fully_delivered());
    assert!(outcome.transaction.verify_required_signatures().is_ok());
    assert!(!outcome.transaction.needs_notarization());
    for node in [&alice, &bob, &carol] {
        assert!(node.stored(&stx).verify_required_signatures().is_ok());
    }
    // Carol never saw the issuance; it travels with the payload.
    assert!(carol.has(&issued));
    assert!(!h.notary.has(&stx));
    assert_eq!(h.notary_log.records().len(), 1);
}

#[tokio::test]
async fn missing_party_signature_stops_before_any_network_activity() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;
    let opened = h.network.sessions_opened();

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public, bob.keys.public])
        .sign_with(&[&alice.keys]);
    let err = finalise(&alice, &stx).await.unwrap_err();

    assert!(matches!(err, FlowError::Validation(_)), "{err}");
    assert_eq!(h.network.sessions_opened(), opened);
    assert_eq!(h.notary_log.append_count(), 0);
    assert!(!alice.has(&stx));
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn contract_violation_is_reported_as_such() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);

    // Neither inputs nor outputs.
    let stx = h
        .builder()
        .add_command("Noop", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let err = finalise(&alice, &stx).await.unwrap_err();
    assert!(matches!(err, FlowError::ContractViolation(_)), "{err}");
}

#[tokio::test]
async fn explicit_sessions_must_cover_every_participant() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let carol = h.node("Carol", 3);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob), participant(&carol)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);

    let to_bob = alice
        .ctx
        .registry
        .open_session(&bob.party, FINALITY_PROTOCOL)
        .await
        .unwrap();
    let opened = h.network.sessions_opened();

    let err = FinalityFlow::new(
        alice.ctx.clone(),
        stx.clone(),
        FinalityOptions::with_sessions(vec![to_bob]),
    )
    .run()
    .await
    .unwrap_err();

    match err {
        FlowError::Validation(reason) => assert!(reason.contains("Carol"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.network.sessions_opened(), opened);
    assert_eq!(h.notary_log.append_count(), 0);
    assert!(!alice.has(&stx));
}

#[tokio::test]
async fn explicit_session_to_self_is_rejected() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [participant(&alice)])
        .add_command("Issue", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let to_self = alice
        .ctx
        .registry
        .open_session(&alice.party, FINALITY_PROTOCOL)
        .await
        .unwrap();

    let err = FinalityFlow::new(
        alice.ctx.clone(),
        stx,
        FinalityOptions::with_sessions(vec![to_self]),
    )
    .run()
    .await
    .unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)), "{err}");
}

#[tokio::test]
async fn explicit_sessions_may_include_non_participants() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let observer = h.node("Observer", 4);

    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [participant(&alice), participant(&bob)])
        .add_command("Issue", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let mut sessions = Vec::new();
    for party in [&bob.party, &observer.party] {
        sessions.push(
            alice
                .ctx
                .registry
                .open_session(party, FINALITY_PROTOCOL)
                .await
                .unwrap(),
        );
    }

    let outcome = FinalityFlow::new(alice.ctx.clone(), stx.clone(), FinalityOptions::with_sessions(sessions))
        .run()
        .await
        .unwrap();
    assert!(outcome.fully_delivered());
    assert!(bob.has(&stx));
    assert!(observer.has(&stx));
}

#[tokio::test]
async fn extra_recipients_are_informed_and_self_is_skipped() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let regulator = h.node("Regulator", 5);

    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [participant(&alice), participant(&bob)])
        .add_command("Issue", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let opened = h.network.sessions_opened();
    let outcome = FinalityFlow::new(
        alice.ctx.clone(),
        stx.clone(),
        FinalityOptions::with_extra_recipients(vec![regulator.party.clone(), alice.party.clone()]),
    )
    .run()
    .await
    .unwrap();

    assert!(outcome.fully_delivered());
    assert!(regulator.has(&stx));
    assert!(bob.has(&stx));
    // One session each to Bob and the regulator.
    assert_eq!(h.network.sessions_opened() - opened, 2);
}

#[tokio::test]
async fn confidential_participant_resolves_to_its_owner() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let confidential = seal_crypto::generate_keypair().public;
    h.identities.register_confidential(confidential, bob.party.clone());

    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [AbstractParty::Anonymous(confidential)])
        .add_command("Issue", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let outcome = finalise(&alice, &stx).await.unwrap();
    assert!(outcome.fully_delivered());
    assert!(bob.has(&stx));
}

#[tokio::test]
async fn unknown_confidential_participant_fails_validation() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let stranger = seal_crypto::generate_keypair().public;

    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [AbstractParty::Anonymous(stranger)])
        .add_command("Issue", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let err = finalise(&alice, &stx).await.unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)), "{err}");
    assert!(!alice.has(&stx));
}

#[tokio::test]
async fn double_spend_names_the_winner() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let carol = h.node("Carol", 3);
    let issued = issue(&h, &alice, &[&alice]).await;

    let spend_to = |node: &TestNode| {
        h.builder()
            .add_input(issued.tx().out_ref(0))
            .add_output("Cash", b"100".to_vec(), [participant(node)])
            .add_command("Move", vec![alice.keys.public])
            .sign_with(&[&alice.keys])
    };
    let first = spend_to(&bob);
    let second = spend_to(&carol);

    finalise(&alice, &first).await.unwrap();
    let err = finalise(&alice, &second).await.unwrap_err();

    match err {
        FlowError::NotarizationConflict(conflict) => {
            assert_eq!(conflict.tx_id, second.id());
            assert!(conflict.winners().contains(&first.id()));
            assert_eq!(conflict.conflicting_refs(), vec![issued.tx().out_ref(0)]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!alice.has(&second));
    assert!(!carol.has(&second));
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn stale_notary_signature_is_replaced_by_notarisation() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let stale = seal_crypto::sign_transaction_id(&issued.id(), &h.notary.keys);
    let stx = stx.with_additional_signatures([stale]);
    assert!(stx.needs_notarization());

    let outcome = finalise(&alice, &stx).await.unwrap();
    assert_eq!(h.notary_log.append_count(), 1);
    assert!(outcome.transaction.verify_required_signatures().is_ok());
    assert_eq!(outcome.transaction.sigs().len(), 2);
    assert!(bob.stored(&stx).verify_required_signatures().is_ok());
}

#[tokio::test]
async fn lost_notary_reply_is_retried_idempotently() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);

    h.network.drop_next_sends_from(&h.notary.party.owning_key, 1);
    let outcome = finalise(&alice, &stx).await.unwrap();

    assert!(outcome.transaction.verify_required_signatures().is_ok());
    assert!(bob.has(&stx));
    assert_eq!(h.notary_log.append_count(), 1);
    assert_eq!(h.notary_log.records()[0].consuming_tx, stx.id());
}

#[tokio::test]
async fn unreachable_recipient_is_reported_not_fatal() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let carol = h.node("Carol", 3);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob), participant(&carol)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);

    h.network.set_unreachable(&carol.party.owning_key, true);
    let outcome = finalise(&alice, &stx).await.unwrap();

    assert_eq!(outcome.undelivered.len(), 1);
    assert_eq!(outcome.undelivered[0].party, carol.party);
    assert!(alice.has(&stx));
    assert!(bob.has(&stx));
    assert!(!carol.has(&stx));
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn recording_failure_keeps_checkpoint_and_resume_completes() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);

    alice.transactions.set_failing(true);
    let err = finalise(&alice, &stx).await.unwrap_err();
    assert!(matches!(err, FlowError::Storage(_)), "{err}");
    assert!(!bob.has(&stx), "nothing is broadcast before recording");

    let saved = alice.checkpoints.list().unwrap();
    assert_eq!(saved.len(), 1);
    let flow = FinalityFlow::from_checkpoint(alice.ctx.clone(), &saved[0]).unwrap();
    assert_eq!(flow.state(), &FinalityState::Recording);
    assert!(matches!(
        flow.cancel_handle().cancel(),
        Err(FlowError::NotCancellable)
    ));

    alice.transactions.set_failing(false);
    let outcome = flow.run().await.unwrap();
    assert!(outcome.fully_delivered());
    assert!(alice.stored(&stx).verify_required_signatures().is_ok());
    assert!(bob.has(&stx));
    assert_eq!(h.notary_log.append_count(), 1);
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn every_transition_is_checkpointed_in_order() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;
    let before = alice.checkpoints.history().len();

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let flow = FinalityFlow::new(alice.ctx.clone(), stx, FinalityOptions::default());
    let flow_id = flow.flow_id();
    flow.run().await.unwrap();

    let tags: Vec<&'static str> = alice.checkpoints.history()[before..]
        .iter()
        .filter(|c| c.flow_id == flow_id)
        .map(|c| {
            let resumed = FinalityFlow::from_checkpoint(alice.ctx.clone(), c).unwrap();
            resumed.state().tag()
        })
        .collect();
    let mut deduped = tags.clone();
    deduped.dedup();
    assert_eq!(
        deduped,
        vec!["verifying", "notarizing", "recording", "broadcasting"]
    );
}

#[tokio::test]
async fn cancel_before_commit_leaves_no_trace() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let flow = FinalityFlow::new(alice.ctx.clone(), stx.clone(), FinalityOptions::default());
    flow.cancel_handle().cancel().unwrap();

    let err = flow.run().await.unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
    assert_eq!(h.notary_log.append_count(), 0);
    assert!(!alice.has(&stx));
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn cancel_during_notarisation_yields_to_an_accepted_verdict() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;
    h.slow_notary(Duration::from_millis(200));

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let flow = FinalityFlow::new(alice.ctx.clone(), stx.clone(), FinalityOptions::default());
    let cancel = flow.cancel_handle();
    let running = tokio::spawn(flow.run());

    // The request is out; the notary has not answered yet.
    tokio::time::sleep(Duration::from_millis(80)).await;
    cancel.cancel().unwrap();

    let outcome = running.await.unwrap().unwrap();
    assert!(outcome.transaction.verify_required_signatures().is_ok());
    assert_eq!(h.notary_log.append_count(), 1);
    assert!(alice.has(&stx));
    assert!(bob.has(&stx));
    assert_eq!(alice.open_checkpoints(), 0);
    assert!(matches!(cancel.cancel(), Err(FlowError::NotCancellable)));
}

#[tokio::test]
async fn flow_interrupted_while_awaiting_the_verdict_resumes_from_its_request() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;
    h.slow_notary(Duration::from_millis(200));

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let flow = FinalityFlow::new(alice.ctx.clone(), stx.clone(), FinalityOptions::default());
    let flow_id = flow.flow_id();
    let running = tokio::spawn(flow.run());

    tokio::time::sleep(Duration::from_millis(80)).await;
    running.abort();
    let _ = running.await;

    let saved = alice.checkpoints.list().unwrap();
    assert_eq!(saved.len(), 1);
    let resumed = FinalityFlow::from_checkpoint(alice.ctx.clone(), &saved[0]).unwrap();
    assert_eq!(resumed.flow_id(), flow_id);
    match resumed.state() {
        FinalityState::Notarizing(NotaryClientState::RequestSent { request, attempt }) => {
            assert_eq!(request.tx_id, stx.id());
            assert_eq!(*attempt, 1);
        }
        other => panic!("unexpected state: {other:?}"),
    }

    let outcome = resumed.run().await.unwrap();
    assert!(!outcome.transaction.needs_notarization());
    assert!(outcome.transaction.verify_required_signatures().is_ok());
    assert!(bob.has(&stx));
    // The replayed request was answered from the existing commit.
    assert_eq!(h.notary_log.append_count(), 1);
    assert_eq!(h.notary_log.records()[0].consuming_tx, stx.id());
    assert_eq!(alice.open_checkpoints(), 0);
}

#[tokio::test]
async fn expired_time_window_is_refused() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);

    let window = TimeWindow::until_only(Timestamp::from_millis(START_MILLIS - 1));
    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [participant(&bob)])
        .add_command("Issue", vec![alice.keys.public])
        .time_window(window)
        .sign_with(&[&alice.keys]);
    let err = finalise(&alice, &stx).await.unwrap_err();

    match err {
        FlowError::TimeWindowInvalid {
            current_time,
            window: refused,
        } => {
            assert_eq!(current_time, Timestamp::from_millis(START_MILLIS));
            assert_eq!(refused, window);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!bob.has(&stx));
}

#[tokio::test]
async fn time_window_is_judged_by_the_notary_clock() {
    let h = Harness::new(NotaryMode::NonValidating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);

    let window = TimeWindow::from_only(Timestamp::from_millis(START_MILLIS + 5_000));
    let stx = h
        .builder()
        .add_output("Cash", b"1".to_vec(), [participant(&bob)])
        .add_command("Issue", vec![alice.keys.public])
        .time_window(window)
        .sign_with(&[&alice.keys]);
    assert!(finalise(&alice, &stx).await.is_err());

    h.clock.advance(5_000);
    let outcome = finalise(&alice, &stx).await.unwrap();
    assert!(outcome.transaction.verify_required_signatures().is_ok());
    assert!(bob.has(&stx));
}

#[tokio::test]
async fn validating_notary_checks_the_full_transaction() {
    let h = Harness::new(NotaryMode::Validating);
    let alice = h.node("Alice", 1);
    let bob = h.node("Bob", 2);
    let issued = issue(&h, &alice, &[&alice]).await;

    let stx = h
        .builder()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"100".to_vec(), [participant(&bob)])
        .add_command("Move", vec![alice.keys.public])
        .sign_with(&[&alice.keys]);
    let outcome = finalise(&alice, &stx).await.unwrap();

    assert!(outcome.transaction.verify_required_signatures().is_ok());
    // The notary resolved the input from the dependency it was sent.
    assert!(h.notary.has(&issued));
    assert!(bob.has(&stx));
}
