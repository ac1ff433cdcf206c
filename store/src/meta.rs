//! Database bookkeeping.

use crate::StoreError;

/// Schema versioning for a storage environment.
pub trait MetaStore {
    /// Stored schema version; `0` for a fresh database.
    fn schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}
