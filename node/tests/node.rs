use std::sync::Arc;

use seal_crypto::keypair_from_seed;
use seal_flows::{FinalityOptions, FlowError, HandlerDescriptor, StaticIdentityService};
use seal_network::MemoryNetwork;
use seal_node::{NodeConfig, NodeError, NodeServices, NodeStores, NotaryEntry, SealNode};
use seal_nullables::{NullCheckpointStore, NullTransactionStore, NullUniquenessLog};
use seal_store::{Checkpoint, CheckpointStore, FlowId, TransactionStore};
use seal_transactions::{SignedTransaction, TransactionBuilder};
use seal_types::{Party, SystemClock, Timestamp};
use seal_utils::RetryPolicy;

const NOTARY_SEED: [u8; 32] = [100u8; 32];

fn party(name: &str, seed: u8) -> Party {
    Party::new(keypair_from_seed(&[seed; 32]).public, name)
}

fn notary_party() -> Party {
    Party::new(keypair_from_seed(&NOTARY_SEED).public, "Notary")
}

fn config(name: &str, seed: [u8; 32], data_dir: &std::path::Path) -> NodeConfig {
    NodeConfig {
        name: name.to_string(),
        identity_seed: Some(hex::encode(seed)),
        data_dir: data_dir.to_path_buf(),
        map_size_mib: 16,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
            round_trip_timeout_ms: 1_000,
        },
        notaries: vec![NotaryEntry {
            name: "Notary".into(),
            public_key: hex::encode(notary_party().owning_key.as_bytes()),
            validating: false,
        }],
        ..NodeConfig::default()
    }
}

fn services(
    network: &Arc<MemoryNetwork>,
    identities: &Arc<StaticIdentityService>,
    party: Party,
) -> NodeServices {
    identities.register(party.clone());
    let (transport, inbox) = network.join(party);
    NodeServices {
        transport: Arc::new(transport),
        inbox,
        identities: identities.clone(),
        clock: Arc::new(SystemClock),
        verifier: None,
    }
}

fn issue_to(notary: &Party, issuer_seed: u8, owners: &[&Party]) -> SignedTransaction {
    let issuer = keypair_from_seed(&[issuer_seed; 32]);
    TransactionBuilder::new(notary.clone())
        .random_salt()
        .add_output("Cash", b"10".to_vec(), owners.iter().map(|p| (*p).clone().into()))
        .add_command("Issue", vec![issuer.public])
        .sign_with(&[&issuer])
}

fn move_to(notary: &Party, issued: &SignedTransaction, owner_seed: u8, to: &Party) -> SignedTransaction {
    let owner = keypair_from_seed(&[owner_seed; 32]);
    TransactionBuilder::new(notary.clone())
        .random_salt()
        .add_input(issued.tx().out_ref(0))
        .add_output("Cash", b"10".to_vec(), [to.clone().into()])
        .add_command("Move", vec![owner.public])
        .sign_with(&[&owner])
}

#[tokio::test]
async fn lmdb_nodes_finalise_through_a_notary_node() {
    seal_utils::init_tracing();
    let network = MemoryNetwork::new();
    let identities = Arc::new(StaticIdentityService::new());
    let dirs: Vec<_> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();

    let mut notary_config = config("Notary", NOTARY_SEED, dirs[0].path());
    notary_config.notary.enabled = true;
    notary_config.notaries.clear();
    let mut notary = SealNode::start(notary_config, services(&network, &identities, notary_party()))
        .await
        .unwrap();
    assert!(notary.notary().is_some());

    let alice_party = party("Alice", 1);
    let bob_party = party("Bob", 2);
    let mut alice = SealNode::start(
        config("Alice", [1u8; 32], dirs[1].path()),
        services(&network, &identities, alice_party.clone()),
    )
    .await
    .unwrap();
    let mut bob = SealNode::start(
        config("Bob", [2u8; 32], dirs[2].path()),
        services(&network, &identities, bob_party.clone()),
    )
    .await
    .unwrap();

    let issued = issue_to(&notary_party(), 1, &[&alice_party]);
    alice.finalize(issued.clone(), FinalityOptions::default()).await.unwrap();

    let moved = move_to(&notary_party(), &issued, 1, &bob_party);
    let outcome = alice.finalize(moved.clone(), FinalityOptions::default()).await.unwrap();
    assert!(outcome.fully_delivered());

    let at_bob = bob.context().transactions.get(&moved.id()).unwrap().unwrap();
    assert!(at_bob.verify_required_signatures().is_ok());
    let record = notary
        .notary()
        .unwrap()
        .provider()
        .record_for(&issued.tx().out_ref(0))
        .unwrap()
        .unwrap();
    assert_eq!(record.consuming_tx, moved.id());

    // A second spend of the same state is refused.
    let again = move_to(&notary_party(), &issued, 1, &alice_party);
    let err = alice.finalize(again, FinalityOptions::default()).await.unwrap_err();
    assert!(matches!(err, NodeError::Flow(FlowError::NotarizationConflict(_))), "{err}");

    for node in [&mut alice, &mut bob, &mut notary] {
        node.stop().await.unwrap();
    }
}

#[tokio::test]
async fn unfinished_flow_is_resumed_on_restart() {
    seal_utils::init_tracing();
    let network = MemoryNetwork::new();
    let identities = Arc::new(StaticIdentityService::new());
    let dirs: Vec<_> = (0..2).map(|_| tempfile::tempdir().unwrap()).collect();

    let mut notary_config = config("Notary", NOTARY_SEED, dirs[0].path());
    notary_config.notary.enabled = true;
    let mut notary = SealNode::start(notary_config, services(&network, &identities, notary_party()))
        .await
        .unwrap();
    let bob_party = party("Bob", 2);
    let mut bob = SealNode::start(
        config("Bob", [2u8; 32], dirs[1].path()),
        services(&network, &identities, bob_party.clone()),
    )
    .await
    .unwrap();

    let alice_party = party("Alice", 1);
    let transactions = Arc::new(NullTransactionStore::new());
    let checkpoints = Arc::new(NullCheckpointStore::new());
    let stores = NodeStores {
        transactions: transactions.clone(),
        checkpoints: checkpoints.clone(),
        uniqueness: Arc::new(NullUniquenessLog::new()),
    };
    let scratch = tempfile::tempdir().unwrap();
    let alice_config = config("Alice", [1u8; 32], scratch.path());

    let issued = issue_to(&notary_party(), 1, &[&alice_party]);
    transactions.insert(issued.clone());
    let moved = move_to(&notary_party(), &issued, 1, &bob_party);

    let mut alice = SealNode::start_with_stores(
        alice_config.clone(),
        services(&network, &identities, alice_party.clone()),
        stores.clone(),
    )
    .await
    .unwrap();
    transactions.set_failing(true);
    let err = alice
        .finalize(moved.clone(), FinalityOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Flow(FlowError::Storage(_))), "{err}");
    alice.stop().await.unwrap();
    assert_eq!(checkpoints.list().unwrap().len(), 1);

    transactions.set_failing(false);
    let mut alice = SealNode::start_with_stores(
        alice_config,
        services(&network, &identities, alice_party),
        stores,
    )
    .await
    .unwrap();
    let results = alice.wait_recovered().await;
    assert_eq!(results.len(), 1);
    let outcome = results.into_iter().next().unwrap().unwrap();
    assert!(outcome.fully_delivered());
    assert!(transactions.get(&moved.id()).unwrap().is_some());
    assert!(bob.context().transactions.get(&moved.id()).unwrap().is_some());
    assert!(checkpoints.list().unwrap().is_empty());

    for node in [&mut alice, &mut bob, &mut notary] {
        node.stop().await.unwrap();
    }
}

#[tokio::test]
async fn unreadable_checkpoint_does_not_block_start() {
    seal_utils::init_tracing();
    let network = MemoryNetwork::new();
    let identities = Arc::new(StaticIdentityService::new());
    let scratch = tempfile::tempdir().unwrap();

    let checkpoints = Arc::new(NullCheckpointStore::new());
    let garbage = Checkpoint {
        flow_id: FlowId([7u8; 16]),
        protocol: seal_flows::FINALITY_PROTOCOL.to_string(),
        state: vec![0xFF; 12],
        updated_at: Timestamp::EPOCH,
    };
    checkpoints.put(&garbage).unwrap();
    let stores = NodeStores {
        transactions: Arc::new(NullTransactionStore::new()),
        checkpoints: checkpoints.clone(),
        uniqueness: Arc::new(NullUniquenessLog::new()),
    };

    let alice_party = party("Alice", 1);
    let bob_party = party("Bob", 2);
    let mut alice = SealNode::start_with_stores(
        config("Alice", [1u8; 32], scratch.path()),
        services(&network, &identities, alice_party.clone()),
        stores,
    )
    .await
    .unwrap();
    let bob_dir = tempfile::tempdir().unwrap();
    let mut bob = SealNode::start(
        config("Bob", [2u8; 32], bob_dir.path()),
        services(&network, &identities, bob_party.clone()),
    )
    .await
    .unwrap();

    assert!(alice.wait_recovered().await.is_empty());
    // Left for an operator to inspect.
    assert_eq!(checkpoints.get(&garbage.flow_id).unwrap(), Some(garbage));

    // The node is fully up: it finalises and its dispatcher answers Bob.
    let issued = issue_to(&notary_party(), 1, &[&alice_party, &bob_party]);
    alice.finalize(issued.clone(), FinalityOptions::default()).await.unwrap();
    assert!(bob.context().transactions.get(&issued.id()).unwrap().is_some());
    let back = issue_to(&notary_party(), 2, &[&bob_party, &alice_party]);
    bob.finalize(back.clone(), FinalityOptions::default()).await.unwrap();
    assert!(alice.context().transactions.get(&back.id()).unwrap().is_some());

    for node in [&mut alice, &mut bob] {
        node.stop().await.unwrap();
    }
}

#[tokio::test]
async fn transport_identity_must_match_configuration() {
    let network = MemoryNetwork::new();
    let identities = Arc::new(StaticIdentityService::new());
    let dir = tempfile::tempdir().unwrap();

    let result = SealNode::start(
        config("Alice", [1u8; 32], dir.path()),
        services(&network, &identities, party("Mallory", 9)),
    )
    .await;
    assert!(matches!(result, Err(NodeError::Config(_))));
}

#[tokio::test]
async fn platform_handlers_are_protected() {
    let network = MemoryNetwork::new();
    let identities = Arc::new(StaticIdentityService::new());
    let dir = tempfile::tempdir().unwrap();
    let mut alice = SealNode::start(
        config("Alice", [1u8; 32], dir.path()),
        services(&network, &identities, party("Alice", 1)),
    )
    .await
    .unwrap();

    let responder = alice
        .context()
        .registry
        .handler_for(seal_flows::FINALITY_PROTOCOL)
        .unwrap();
    let err = alice
        .register_handler(
            seal_flows::FINALITY_PROTOCOL,
            HandlerDescriptor::new("app.Receiver"),
            responder,
        )
        .unwrap_err();
    assert!(matches!(err, NodeError::Registry(_)));
    alice.stop().await.unwrap();
}
