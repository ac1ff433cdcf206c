//! The Seal node: wires stores, the notary service and flows together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use seal_flows::{
    handle_inbound, install_core_handlers, FinalityFlow, FinalityOptions, FinalityOutcome,
    FlowContext, FlowError, HandlerDescriptor, IdentityService, NotaryInfo, Responder,
    SessionRegistry, FINALITY_PROTOCOL,
};
use seal_network::{InboundSession, Transport};
use seal_notary::{NotaryMode, NotaryService, UniquenessProvider, DEFAULT_STRIPES};
use seal_store::{CheckpointStore, TransactionStore, UniquenessLog};
use seal_store_lmdb::{LmdbEnvironment, Migrator};
use seal_transactions::{BasicVerifier, SignedTransaction, TransactionVerifier};
use seal_types::{Clock, Party};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::shutdown::ShutdownController;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The durable stores a node runs against.
#[derive(Clone)]
pub struct NodeStores {
    pub transactions: Arc<dyn TransactionStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub uniqueness: Arc<dyn UniquenessLog>,
}

impl NodeStores {
    pub fn lmdb(env: &LmdbEnvironment) -> Self {
        Self {
            transactions: Arc::new(env.transaction_store()),
            checkpoints: Arc::new(env.checkpoint_store()),
            uniqueness: Arc::new(env.uniqueness_log()),
        }
    }
}

/// Collaborators supplied by whoever embeds the node.
pub struct NodeServices {
    pub transport: Arc<dyn Transport>,
    /// Sessions opened at this node by others.
    pub inbox: mpsc::Receiver<InboundSession>,
    pub identities: Arc<dyn IdentityService>,
    pub clock: Arc<dyn Clock>,
    /// Contract verification. Defaults to structural checks resolving
    /// against the node's own transaction store.
    pub verifier: Option<Arc<dyn TransactionVerifier>>,
}

/// A running Seal node.
pub struct SealNode {
    config: NodeConfig,
    ctx: Arc<FlowContext>,
    notary: Option<Arc<NotaryService>>,
    shutdown: Arc<ShutdownController>,
    /// Handles for spawned background tasks (joined during shutdown).
    tasks: Vec<JoinHandle<()>>,
    /// Finality flows resumed from checkpoints at start.
    recovered: Vec<JoinHandle<Result<FinalityOutcome, FlowError>>>,
    /// Present when the node opened its own LMDB environment.
    lmdb: Option<LmdbEnvironment>,
}

impl SealNode {
    /// Open the LMDB environment under `config.data_dir` and start.
    pub async fn start(config: NodeConfig, services: NodeServices) -> Result<Self, NodeError> {
        let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
        Migrator::run(&env.meta_store())?;
        let stores = NodeStores::lmdb(&env);
        let mut node = Self::start_with_stores(config, services, stores).await?;
        node.lmdb = Some(env);
        Ok(node)
    }

    /// Start against caller-provided stores.
    ///
    /// Installs the platform handlers, starts the inbound dispatcher and
    /// resumes every unfinished finality flow found in the checkpoint store.
    pub async fn start_with_stores(
        config: NodeConfig,
        services: NodeServices,
        stores: NodeStores,
    ) -> Result<Self, NodeError> {
        let keys = config.identity_keys()?;
        let me = config.identity(&keys);
        if services.transport.local_party() != &me {
            return Err(NodeError::Config(format!(
                "transport speaks for {}, configured identity is {me}",
                services.transport.local_party()
            )));
        }

        let verifier = match services.verifier {
            Some(verifier) => verifier,
            None => {
                let lookup = Arc::clone(&stores.transactions);
                Arc::new(BasicVerifier::new(move |id| lookup.get(id).ok().flatten()))
            }
        };

        let notary = if config.notary.enabled {
            let mode = if config.notary.validating {
                NotaryMode::Validating
            } else {
                NotaryMode::NonValidating
            };
            let stripes = match config.notary.stripes {
                0 => DEFAULT_STRIPES,
                n => n,
            };
            let service = NotaryService::new(
                me.clone(),
                keys,
                mode,
                UniquenessProvider::with_stripes(Arc::clone(&stores.uniqueness), stripes),
                Arc::clone(&services.clock),
                Arc::clone(&verifier),
            )?;
            tracing::info!(notary = %me, ?mode, stripes, "notary service enabled");
            Some(Arc::new(service))
        } else {
            None
        };

        let mut notaries = config.notary_infos()?;
        if let Some(service) = &notary {
            if !notaries.iter().any(|n| &n.party == service.identity()) {
                notaries.push(NotaryInfo {
                    party: me.clone(),
                    validating: service.mode() == NotaryMode::Validating,
                });
            }
        }

        let registry = Arc::new(SessionRegistry::new(
            services.transport,
            config.retry.round_trip_timeout(),
        ));
        install_core_handlers(&registry, notary.clone());

        let ctx = Arc::new(FlowContext {
            me: me.clone(),
            other_identities: Vec::new(),
            registry,
            transactions: stores.transactions,
            checkpoints: stores.checkpoints,
            verifier,
            identities: services.identities,
            notaries,
            retry: config.retry,
            clock: services.clock,
        });

        // Decode before any task is spawned so a failing store leaves
        // nothing running.
        let pending = Self::recoverable_flows(&ctx)?;

        let mut node = Self {
            config,
            ctx,
            notary,
            shutdown: Arc::new(ShutdownController::new()),
            tasks: Vec::new(),
            recovered: Vec::new(),
            lmdb: None,
        };
        node.spawn_dispatcher(services.inbox);
        node.recovered = pending
            .into_iter()
            .map(|flow| tokio::spawn(flow.run()))
            .collect();

        tracing::info!(
            node = %me,
            notary = node.notary.is_some(),
            resumed = node.recovered.len(),
            "Seal node started"
        );
        Ok(node)
    }

    /// Hand every inbound session to the responder registered for its
    /// protocol, one task per session.
    fn spawn_dispatcher(&mut self, mut inbox: mpsc::Receiver<InboundSession>) {
        let ctx = Arc::clone(&self.ctx);
        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("inbound dispatcher stopping");
                        break;
                    }
                    inbound = inbox.recv() => match inbound {
                        Some(session) => {
                            tracing::debug!(
                                from = %session.initiator,
                                protocol = %session.protocol,
                                "inbound session"
                            );
                            tokio::spawn(handle_inbound(Arc::clone(&ctx), session));
                        }
                        None => break,
                    },
                }
            }
        });
        self.tasks.push(handle);
    }

    /// Rebuild every unfinished finality flow from the checkpoint store.
    ///
    /// A checkpoint that cannot be decoded is logged and left in place for
    /// an operator; it never prevents the node from starting.
    fn recoverable_flows(ctx: &Arc<FlowContext>) -> Result<Vec<FinalityFlow>, NodeError> {
        let mut flows = Vec::new();
        for checkpoint in ctx.checkpoints.list()? {
            if checkpoint.protocol != FINALITY_PROTOCOL {
                tracing::warn!(
                    flow = %checkpoint.flow_id,
                    protocol = %checkpoint.protocol,
                    "no resume routine for checkpoint"
                );
                continue;
            }
            match FinalityFlow::from_checkpoint(Arc::clone(ctx), &checkpoint) {
                Ok(flow) => {
                    tracing::info!(flow = %checkpoint.flow_id, state = flow.state().tag(), "resuming finality");
                    flows.push(flow);
                }
                Err(e) => {
                    tracing::error!(
                        flow = %checkpoint.flow_id,
                        error = %e,
                        "unusable finality checkpoint, skipped"
                    );
                }
            }
        }
        Ok(flows)
    }

    pub fn identity(&self) -> &Party {
        &self.ctx.me
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<FlowContext> {
        &self.ctx
    }

    pub fn notary(&self) -> Option<&Arc<NotaryService>> {
        self.notary.as_ref()
    }

    /// A finality flow for `stx`, for callers that want its cancel handle.
    pub fn finality_flow(&self, stx: SignedTransaction, options: FinalityOptions) -> FinalityFlow {
        FinalityFlow::new(Arc::clone(&self.ctx), stx, options)
    }

    /// Finalise `stx`. The flow runs on its own task, so dropping this
    /// future does not abandon it.
    pub async fn finalize(
        &self,
        stx: SignedTransaction,
        options: FinalityOptions,
    ) -> Result<FinalityOutcome, NodeError> {
        let flow = self.finality_flow(stx, options);
        let outcome = tokio::spawn(flow.run())
            .await
            .map_err(|e| NodeError::Task(e.to_string()))??;
        Ok(outcome)
    }

    /// Register an application responder for `protocol`.
    pub fn register_handler(
        &self,
        protocol: &str,
        descriptor: HandlerDescriptor,
        responder: Arc<dyn Responder>,
    ) -> Result<(), NodeError> {
        self.ctx.registry.register(protocol, descriptor, responder)?;
        Ok(())
    }

    /// Wait for the flows resumed at start and collect their results.
    pub async fn wait_recovered(&mut self) -> Vec<Result<FinalityOutcome, NodeError>> {
        let mut results = Vec::with_capacity(self.recovered.len());
        for handle in self.recovered.drain(..) {
            results.push(match handle.await {
                Ok(result) => result.map_err(NodeError::from),
                Err(e) => Err(NodeError::Task(e.to_string())),
            });
        }
        results
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Stop background tasks and flush storage.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!(node = %self.ctx.me, "Seal node stopping");
        self.shutdown.shutdown();

        let tasks: Vec<JoinHandle<()>> = self.tasks.drain(..).collect();
        let wait_all = async {
            for task in tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(timeout = ?SHUTDOWN_TIMEOUT, "background tasks did not stop in time");
        }

        if let Some(env) = &self.lmdb {
            env.sync()?;
        }
        tracing::info!(node = %self.ctx.me, "Seal node stopped");
        Ok(())
    }
}
