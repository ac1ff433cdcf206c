//! A small in-memory network of flow nodes and one notary.

#![allow(dead_code)]

use async_trait::async_trait;
use seal_crypto::keypair_from_seed;
use seal_flows::{
    handle_inbound, install_core_handlers, FlowContext, FlowError, FlowSession,
    HandlerDescriptor, NotaryInfo, NotaryServiceFlow, Responder, SessionRegistry,
    StaticIdentityService, NOTARY_PROTOCOL,
};
use seal_network::MemoryNetwork;
use seal_notary::{NotaryMode, NotaryService, UniquenessProvider};
use seal_nullables::{NullCheckpointStore, NullClock, NullTransactionStore, NullUniquenessLog};
use seal_store::TransactionStore;
use seal_transactions::{BasicVerifier, SignedTransaction, TransactionBuilder};
use seal_types::{AbstractParty, KeyPair, Party};
use seal_utils::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

pub const START_MILLIS: u64 = 1_000_000;

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 10,
        max_backoff_ms: 40,
        round_trip_timeout_ms: 500,
    }
}

pub struct TestNode {
    pub party: Party,
    pub keys: KeyPair,
    pub ctx: Arc<FlowContext>,
    pub transactions: Arc<NullTransactionStore>,
    pub checkpoints: Arc<NullCheckpointStore>,
}

impl TestNode {
    pub fn has(&self, stx: &SignedTransaction) -> bool {
        self.transactions.contains(&stx.id()).unwrap()
    }

    pub fn stored(&self, stx: &SignedTransaction) -> SignedTransaction {
        self.transactions.get(&stx.id()).unwrap().expect("transaction recorded")
    }

    pub fn open_checkpoints(&self) -> usize {
        use seal_store::CheckpointStore;
        self.checkpoints.list().unwrap().len()
    }
}

pub struct Harness {
    pub network: Arc<MemoryNetwork>,
    pub identities: Arc<StaticIdentityService>,
    pub clock: Arc<NullClock>,
    pub notary: TestNode,
    pub notary_log: Arc<NullUniquenessLog>,
    pub notary_service: Arc<NotaryService>,
    notaries: Vec<NotaryInfo>,
}

impl Harness {
    pub fn new(mode: NotaryMode) -> Self {
        seal_utils::init_tracing();
        let network = MemoryNetwork::new();
        let identities = Arc::new(StaticIdentityService::new());
        let clock = Arc::new(NullClock::new(START_MILLIS));
        let notary_seed = [100u8; 32];
        let notary_keys = keypair_from_seed(&notary_seed);
        let notary_party = Party::new(notary_keys.public, "Notary");
        let notaries = vec![NotaryInfo {
            party: notary_party.clone(),
            validating: mode == NotaryMode::Validating,
        }];
        let notary_log = Arc::new(NullUniquenessLog::new());
        let notary = spawn_node(
            &network,
            &identities,
            &clock,
            &notaries,
            notary_party.clone(),
            keypair_from_seed(&notary_seed),
        );

        let notary_service = Arc::new(
            NotaryService::new(
                notary_party,
                notary_keys,
                mode,
                UniquenessProvider::new(Arc::<NullUniquenessLog>::clone(&notary_log)),
                clock.clone(),
                notary.ctx.verifier.clone(),
            )
            .unwrap(),
        );
        install_core_handlers(&notary.ctx.registry, Some(Arc::clone(&notary_service)));

        Self {
            network,
            identities,
            clock,
            notary,
            notary_log,
            notary_service,
            notaries,
        }
    }

    pub fn node(&self, name: &str, seed: u8) -> TestNode {
        let keys = keypair_from_seed(&[seed; 32]);
        let party = Party::new(keys.public, name);
        spawn_node(
            &self.network,
            &self.identities,
            &self.clock,
            &self.notaries,
            party,
            keys,
        )
    }

    /// Make the notary sit on every request for `delay` before answering.
    pub fn slow_notary(&self, delay: Duration) {
        self.notary.ctx.registry.install_core(
            NOTARY_PROTOCOL,
            HandlerDescriptor::new(NotaryServiceFlow::TYPE_TAG),
            Arc::new(SlowNotary {
                inner: NotaryServiceFlow::new(Arc::clone(&self.notary_service)),
                delay,
            }),
        );
    }

    pub fn builder(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.notary.party.clone()).random_salt()
    }
}

struct SlowNotary {
    inner: NotaryServiceFlow,
    delay: Duration,
}

#[async_trait]
impl Responder for SlowNotary {
    async fn respond(&self, ctx: Arc<FlowContext>, session: FlowSession) -> Result<(), FlowError> {
        tokio::time::sleep(self.delay).await;
        self.inner.respond(ctx, session).await
    }
}

fn spawn_node(
    network: &Arc<MemoryNetwork>,
    identities: &Arc<StaticIdentityService>,
    clock: &Arc<NullClock>,
    notaries: &[NotaryInfo],
    party: Party,
    keys: KeyPair,
) -> TestNode {
    let retry = fast_retry();
    identities.register(party.clone());
    let (transport, mut inbox) = network.join(party.clone());
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(transport),
        retry.round_trip_timeout(),
    ));
    install_core_handlers(&registry, None);

    let transactions = Arc::new(NullTransactionStore::new());
    let checkpoints = Arc::new(NullCheckpointStore::new());
    let lookup_store = Arc::clone(&transactions);
    let verifier = BasicVerifier::new(move |id| lookup_store.get(id).ok().flatten());

    let ctx = Arc::new(FlowContext {
        me: party.clone(),
        other_identities: Vec::new(),
        registry,
        transactions: transactions.clone(),
        checkpoints: checkpoints.clone(),
        verifier: Arc::new(verifier),
        identities: identities.clone(),
        notaries: notaries.to_vec(),
        retry,
        clock: clock.clone(),
    });

    let dispatch_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        while let Some(inbound) = inbox.recv().await {
            tokio::spawn(handle_inbound(Arc::clone(&dispatch_ctx), inbound));
        }
    });

    TestNode {
        party,
        keys,
        ctx,
        transactions,
        checkpoints,
    }
}

pub fn participant(node: &TestNode) -> AbstractParty {
    node.party.clone().into()
}
