//! Notary side of notarisation.

use async_trait::async_trait;
use seal_messages::{FlowMessage, NotarizationResponse};
use seal_notary::{NotaryMode, NotaryService};
use std::sync::Arc;

use crate::receive::record_dependencies;
use crate::{FlowContext, FlowError, FlowSession, Responder};

/// Answers one notarisation request per session.
pub struct NotaryServiceFlow {
    service: Arc<NotaryService>,
}

impl NotaryServiceFlow {
    pub const TYPE_TAG: &'static str = "seal.NotaryServiceFlow";

    pub fn new(service: Arc<NotaryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Responder for NotaryServiceFlow {
    async fn respond(&self, ctx: Arc<FlowContext>, mut session: FlowSession) -> Result<(), FlowError> {
        let payload = match session.receive().await? {
            FlowMessage::NotarizationRequest(payload) => payload,
            other => {
                return Err(FlowError::UnexpectedMessage {
                    expected: "NotarizationRequest",
                    received: other.kind(),
                })
            }
        };

        if self.service.mode() == NotaryMode::Validating {
            if let Err(e) = record_dependencies(&ctx, &payload.dependencies) {
                session.send(&FlowMessage::Error(e.to_string())).await?;
                return Err(e);
            }
        }

        // The commit blocks on the log's fsync.
        let service = Arc::clone(&self.service);
        let verdict = tokio::task::spawn_blocking(move || {
            service.notarize(&payload.request, payload.transaction.as_ref())
        })
        .await
        .map_err(|e| FlowError::Transport(format!("notary task failed: {e}")))?;

        match verdict {
            Ok(verdict) => {
                session
                    .send(&FlowMessage::NotarizationResponse(NotarizationResponse { verdict }))
                    .await
            }
            Err(e) => {
                tracing::error!(from = %session.counterparty(), error = %e, "notary unavailable");
                session.send(&FlowMessage::Error(e.to_string())).await?;
                Err(e.into())
            }
        }
    }
}
