//! Ledger identities.

use crate::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A stable, well-known ledger identity.
///
/// Equality, ordering and hashing consider only the owning key; the name is
/// informational.
#[derive(Clone, Serialize, Deserialize)]
pub struct Party {
    pub owning_key: PublicKey,
    pub name: Option<String>,
}

impl Party {
    pub fn new(owning_key: PublicKey, name: impl Into<String>) -> Self {
        Self {
            owning_key,
            name: Some(name.into()),
        }
    }

    pub fn anonymous_name(owning_key: PublicKey) -> Self {
        Self {
            owning_key,
            name: None,
        }
    }
}

impl PartialEq for Party {
    fn eq(&self, other: &Self) -> bool {
        self.owning_key == other.owning_key
    }
}

impl Eq for Party {}

impl Hash for Party {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owning_key.hash(state);
    }
}

impl PartialOrd for Party {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Party {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.owning_key.cmp(&other.owning_key)
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Party({name})"),
            None => write!(f, "Party({})", self.owning_key.short()),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.owning_key.short()),
        }
    }
}

/// A state participant: either a well-known party or a bare (confidential) key
/// that must be resolved through an identity service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstractParty {
    WellKnown(Party),
    Anonymous(PublicKey),
}

impl AbstractParty {
    pub fn owning_key(&self) -> &PublicKey {
        match self {
            Self::WellKnown(party) => &party.owning_key,
            Self::Anonymous(key) => key,
        }
    }
}

impl From<Party> for AbstractParty {
    fn from(party: Party) -> Self {
        Self::WellKnown(party)
    }
}
