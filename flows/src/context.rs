//! Services a flow runs against.

use seal_store::{CheckpointStore, TransactionStore};
use seal_transactions::TransactionVerifier;
use seal_types::{Clock, Party};
use seal_utils::RetryPolicy;
use std::sync::Arc;

use crate::{IdentityService, SessionRegistry};

/// A notary this node is willing to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotaryInfo {
    pub party: Party,
    /// Validating notaries are sent the full transaction.
    pub validating: bool,
}

/// Everything a flow needs from its node.
pub struct FlowContext {
    /// The node's legal identity.
    pub me: Party,
    /// Further identities (confidential keys) owned by this node.
    pub other_identities: Vec<Party>,
    pub registry: Arc<SessionRegistry>,
    pub transactions: Arc<dyn TransactionStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub verifier: Arc<dyn TransactionVerifier>,
    pub identities: Arc<dyn IdentityService>,
    pub notaries: Vec<NotaryInfo>,
    pub retry: RetryPolicy,
    pub clock: Arc<dyn Clock>,
}

impl FlowContext {
    pub fn is_me(&self, party: &Party) -> bool {
        *party == self.me || self.other_identities.contains(party)
    }

    pub fn notary_info(&self, party: &Party) -> Option<&NotaryInfo> {
        self.notaries.iter().find(|n| &n.party == party)
    }
}
