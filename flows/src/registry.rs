//! Initiating protocol → responder table, and session opening.
//!
//! The table is populated at startup through two paths: [`install_core`]
//! for platform handlers, which can never be replaced, and [`register`] for
//! application handlers. A later registration for the same protocol is
//! accepted only if its handler type narrows the current one, i.e. the
//! current type appears among the new descriptor's ancestors (or is the same
//! type). Anything else is an ambiguous widening and is rejected.
//!
//! [`install_core`]: SessionRegistry::install_core
//! [`register`]: SessionRegistry::register

use async_trait::async_trait;
use seal_network::{InboundSession, Transport};
use seal_notary::NotaryService;
use seal_messages::FlowMessage;
use seal_types::Party;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::{
    FlowContext, FlowError, FlowSession, NotaryServiceFlow, ReceiveFinalityFlow,
    FINALITY_PROTOCOL, NOTARY_PROTOCOL,
};

/// The flow run at a node when a counterparty opens a session to it.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, ctx: Arc<FlowContext>, session: FlowSession) -> Result<(), FlowError>;
}

/// Names a responder type and its ancestry within a closed set of types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub type_tag: String,
    /// Supertypes, nearest first.
    pub ancestors: Vec<String>,
}

impl HandlerDescriptor {
    pub fn new(type_tag: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            ancestors: Vec::new(),
        }
    }

    /// A descriptor for a subtype of `parent`.
    pub fn extending(type_tag: &str, parent: &HandlerDescriptor) -> Self {
        let mut ancestors = vec![parent.type_tag.clone()];
        ancestors.extend(parent.ancestors.iter().cloned());
        Self {
            type_tag: type_tag.to_string(),
            ancestors,
        }
    }

    /// Whether this type is `other` or one of its subtypes.
    pub fn narrows(&self, other: &HandlerDescriptor) -> bool {
        self.type_tag == other.type_tag || self.ancestors.contains(&other.type_tag)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerOrigin {
    /// Provided by the platform.
    Core,
    Application,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("attempting to replace the platform handler for {0}")]
    CoreHandler(String),

    #[error("{candidate} does not narrow {current}, the registered handler for {protocol}")]
    NotNarrowing {
        protocol: String,
        current: String,
        candidate: String,
    },
}

struct Registration {
    descriptor: HandlerDescriptor,
    origin: HandlerOrigin,
    responder: Arc<dyn Responder>,
}

pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    receive_timeout: Duration,
    handlers: RwLock<HashMap<String, Registration>>,
}

impl SessionRegistry {
    pub fn new(transport: Arc<dyn Transport>, receive_timeout: Duration) -> Self {
        Self {
            transport,
            receive_timeout,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_party(&self) -> &Party {
        self.transport.local_party()
    }

    /// Open a fresh session to `party`; the counterparty runs whatever it
    /// has registered for `protocol`.
    pub async fn open_session(&self, party: &Party, protocol: &str) -> Result<FlowSession, FlowError> {
        let channel = self.transport.open(party, protocol).await?;
        Ok(FlowSession::new(channel, self.receive_timeout))
    }

    pub fn handler_for(&self, protocol: &str) -> Option<Arc<dyn Responder>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .map(|r| Arc::clone(&r.responder))
    }

    pub fn origin_of(&self, protocol: &str) -> Option<HandlerOrigin> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .map(|r| r.origin)
    }

    /// Install a platform handler, unconditionally.
    pub fn install_core(
        &self,
        protocol: &str,
        descriptor: HandlerDescriptor,
        responder: Arc<dyn Responder>,
    ) {
        tracing::debug!(protocol, handler = %descriptor.type_tag, "installed core handler");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                protocol.to_string(),
                Registration {
                    descriptor,
                    origin: HandlerOrigin::Core,
                    responder,
                },
            );
    }

    /// Register an application handler for `protocol`.
    pub fn register(
        &self,
        protocol: &str,
        descriptor: HandlerDescriptor,
        responder: Arc<dyn Responder>,
    ) -> Result<(), RegistryError> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = handlers.get(protocol) {
            if current.origin == HandlerOrigin::Core {
                return Err(RegistryError::CoreHandler(protocol.to_string()));
            }
            if !descriptor.narrows(&current.descriptor) {
                return Err(RegistryError::NotNarrowing {
                    protocol: protocol.to_string(),
                    current: current.descriptor.type_tag.clone(),
                    candidate: descriptor.type_tag,
                });
            }
        }
        tracing::debug!(protocol, handler = %descriptor.type_tag, "registered handler");
        handlers.insert(
            protocol.to_string(),
            Registration {
                descriptor,
                origin: HandlerOrigin::Application,
                responder,
            },
        );
        Ok(())
    }
}

/// Install the platform responders: the finality receiver always, the
/// notary service when this node runs one.
pub fn install_core_handlers(registry: &SessionRegistry, notary: Option<Arc<NotaryService>>) {
    registry.install_core(
        FINALITY_PROTOCOL,
        HandlerDescriptor::new(ReceiveFinalityFlow::TYPE_TAG),
        Arc::new(ReceiveFinalityFlow),
    );
    if let Some(service) = notary {
        registry.install_core(
            NOTARY_PROTOCOL,
            HandlerDescriptor::new(NotaryServiceFlow::TYPE_TAG),
            Arc::new(NotaryServiceFlow::new(service)),
        );
    }
}

/// Run the registered responder for a session opened at this node.
///
/// A session for an unknown protocol is answered with an error message and
/// closed.
pub async fn handle_inbound(ctx: Arc<FlowContext>, inbound: InboundSession) {
    let InboundSession {
        protocol,
        initiator,
        channel,
    } = inbound;
    let session = FlowSession::new(channel, ctx.retry.round_trip_timeout());

    let Some(responder) = ctx.registry.handler_for(&protocol) else {
        tracing::warn!(%initiator, %protocol, "no handler registered");
        if let Err(e) = session
            .send(&FlowMessage::Error(format!("no handler for {protocol}")))
            .await
        {
            tracing::debug!(%initiator, %protocol, error = %e, "could not report missing handler");
        }
        return;
    };

    if let Err(e) = responder.respond(ctx, session).await {
        tracing::warn!(%initiator, %protocol, error = %e, "responder failed");
    }
}
