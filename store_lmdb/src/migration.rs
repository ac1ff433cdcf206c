//! Schema version check.
//!
//! Tracks a monotonically increasing schema version in the meta store and
//! refuses to open databases written by newer code.

use seal_store::MetaStore;

use crate::LmdbError;

/// The schema version this code writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub struct Migrator;

impl Migrator {
    /// Bring a database up to [`CURRENT_SCHEMA_VERSION`].
    ///
    /// Version 0 is a fresh database. Consumed-state records are append-only,
    /// so any future migration may only add databases, never rewrite records.
    pub fn run(meta_store: &impl MetaStore) -> Result<(), LmdbError> {
        let current = meta_store
            .schema_version()
            .map_err(|e| LmdbError::Heed(e.to_string()))?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "database schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Heed(format!(
                "database schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }

        tracing::info!(
            from = current,
            to = CURRENT_SCHEMA_VERSION,
            "initialising database schema"
        );
        meta_store
            .set_schema_version(CURRENT_SCHEMA_VERSION)
            .map_err(|e| LmdbError::Heed(e.to_string()))?;
        Ok(())
    }
}
