//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use seal_flows::NotaryInfo;
use seal_types::{KeyPair, Party, PublicKey};
use seal_utils::RetryPolicy;

use crate::{LogFormat, NodeError};

/// Configuration for a Seal node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Informational name of this node's legal identity.
    #[serde(default = "default_name")]
    pub name: String,

    /// Hex-encoded 32-byte seed of the identity key. A fresh key is
    /// generated on every start when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_seed: Option<String>,

    /// Data directory for LMDB storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in MiB.
    #[serde(default = "default_map_size_mib")]
    pub map_size_mib: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Retry and timeout settings for notary round trips and broadcasts.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// The notary service this node runs, if any.
    #[serde(default)]
    pub notary: NotaryConfig,

    /// Notaries this node may use for its own transactions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notaries: Vec<NotaryEntry>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotaryConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Resolve and verify whole transactions before committing.
    #[serde(default)]
    pub validating: bool,

    /// Lock stripes of the uniqueness provider. Zero selects the default.
    #[serde(default)]
    pub stripes: usize,
}

/// A notary known to this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryEntry {
    pub name: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    #[serde(default)]
    pub validating: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_name() -> String {
    "seal-node".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./seal_data")
}

fn default_map_size_mib() -> usize {
    1024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// The identity key pair, from the configured seed or freshly generated.
    pub fn identity_keys(&self) -> Result<KeyPair, NodeError> {
        match &self.identity_seed {
            Some(seed) => Ok(seal_crypto::keypair_from_seed(&decode_key32(
                "identity_seed",
                seed,
            )?)),
            None => {
                tracing::warn!("no identity_seed configured, using an ephemeral identity");
                Ok(seal_crypto::generate_keypair())
            }
        }
    }

    pub fn identity(&self, keys: &KeyPair) -> Party {
        Party::new(keys.public, self.name.clone())
    }

    /// The configured notaries as flow-level descriptors.
    pub fn notary_infos(&self) -> Result<Vec<NotaryInfo>, NodeError> {
        self.notaries
            .iter()
            .map(|entry| {
                let key = decode_key32(&entry.name, &entry.public_key)?;
                Ok(NotaryInfo {
                    party: Party::new(PublicKey(key), entry.name.clone()),
                    validating: entry.validating,
                })
            })
            .collect()
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mib.saturating_mul(1 << 20)
    }
}

fn decode_key32(field: &str, value: &str) -> Result<[u8; 32], NodeError> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| NodeError::Config(format!("{field}: invalid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| NodeError::Config(format!("{field}: expected 32 bytes, got {}", b.len())))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            identity_seed: None,
            data_dir: default_data_dir(),
            map_size_mib: default_map_size_mib(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            retry: RetryPolicy::default(),
            notary: NotaryConfig::default(),
            notaries: Vec::new(),
        }
    }
}
