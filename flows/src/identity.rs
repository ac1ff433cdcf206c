//! Resolution of participant keys to well-known parties.

use seal_types::{AbstractParty, Party, PublicKey};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub trait IdentityService: Send + Sync {
    /// The well-known party owning `key`, if known.
    fn well_known_party(&self, key: &PublicKey) -> Option<Party>;

    fn resolve(&self, participant: &AbstractParty) -> Option<Party> {
        match participant {
            AbstractParty::WellKnown(party) => Some(party.clone()),
            AbstractParty::Anonymous(key) => self.well_known_party(key),
        }
    }
}

/// An identity directory populated at startup.
///
/// Confidential keys are mapped to the party that owns them; a party's own
/// key always resolves to itself.
#[derive(Default)]
pub struct StaticIdentityService {
    by_key: RwLock<HashMap<PublicKey, Party>>,
}

impl StaticIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, party: Party) {
        self.by_key
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(party.owning_key, party);
    }

    /// Record that confidential `key` belongs to `owner`.
    pub fn register_confidential(&self, key: PublicKey, owner: Party) {
        self.by_key
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, owner);
    }
}

impl IdentityService for StaticIdentityService {
    fn well_known_party(&self, key: &PublicKey) -> Option<Party> {
        self.by_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
