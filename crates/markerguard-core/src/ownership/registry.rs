//! Shared, persisted ownership table
//!
//! Every mutation and its flush happen under one lock, so load, put, remove
//! and clear never interleave. A failed flush keeps the in-memory change; the
//! next successful flush writes it out.

use super::{LoadReport, OwnerId, OwnershipStore, OwnershipTable};
use crate::error::PersistError;
use crate::key::CanonicalKey;
use parking_lot::Mutex;

/// Result of [`OwnershipRegistry::release_scope`]
#[derive(Debug)]
#[must_use]
pub struct ScopeRelease {
    /// Records removed from memory
    pub removed: usize,
    /// Outcome of the flush that followed
    pub flushed: Result<(), PersistError>,
}

/// Ownership table plus its durable store
pub struct OwnershipRegistry {
    table: Mutex<OwnershipTable>,
    store: Box<dyn OwnershipStore>,
}

impl std::fmt::Debug for OwnershipRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipRegistry")
            .field("records", &self.table.lock().len())
            .finish_non_exhaustive()
    }
}

impl OwnershipRegistry {
    /// Create registry with an empty table; call [`Self::load`] to populate
    #[must_use]
    pub fn new(store: Box<dyn OwnershipStore>) -> Self {
        Self {
            table: Mutex::new(OwnershipTable::new()),
            store,
        }
    }

    /// Replace the table with the persisted records
    ///
    /// # Errors
    /// `PersistError` if the store cannot be read; the table is left empty
    pub fn load(&self) -> Result<LoadReport, PersistError> {
        let mut table = self.table.lock();
        table.clear();
        let entries = self.store.load()?;
        let report = table.load(entries);

        tracing::info!("Loaded {} ownership entries", report.loaded);
        if report.dropped > 0 {
            tracing::info!("Dropped {} ownership entries with unparseable keys", report.dropped);
        }
        Ok(report)
    }

    /// Whether `owner` is the recorded owner of key
    #[must_use]
    pub fn is_owner(&self, key: &CanonicalKey, owner: &OwnerId) -> bool {
        self.table.lock().is_owner(key, owner)
    }

    /// Whether any owner is recorded for key
    #[must_use]
    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.table.lock().contains(key)
    }

    /// Recorded owner of key
    #[must_use]
    pub fn owner_of(&self, key: &CanonicalKey) -> Option<OwnerId> {
        self.table.lock().get(key).cloned()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Whether no records exist
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Copy of all records in insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<(CanonicalKey, OwnerId)> {
        self.table.lock().snapshot()
    }

    /// Record owner for key and flush
    ///
    /// # Errors
    /// `PersistError` if the flush fails; the record is kept in memory
    pub fn record(&self, key: CanonicalKey, owner: OwnerId) -> Result<(), PersistError> {
        let mut table = self.table.lock();
        table.put(key, owner);
        self.flush_locked(&table)
    }

    /// Record owner only if key has no owner yet
    ///
    /// # Returns
    /// `Ok(false)` without flushing when a record already exists
    ///
    /// # Errors
    /// `PersistError` if the flush fails; the record is kept in memory
    pub fn record_if_missing(
        &self,
        key: CanonicalKey,
        owner: OwnerId,
    ) -> Result<bool, PersistError> {
        let mut table = self.table.lock();
        if table.contains(&key) {
            return Ok(false);
        }
        table.put(key, owner);
        self.flush_locked(&table).map(|()| true)
    }

    /// Remove the record for key and flush if one existed
    ///
    /// # Errors
    /// `PersistError` if the flush fails; the removal is kept in memory
    pub fn release(&self, key: &CanonicalKey) -> Result<Option<OwnerId>, PersistError> {
        let mut table = self.table.lock();
        let removed = table.remove(key);
        if removed.is_some() {
            self.flush_locked(&table)?;
        }
        Ok(removed)
    }

    /// Remove every record in scope and flush if any were removed
    ///
    /// The removal count is reported even when the flush fails, since the
    /// records are gone from memory either way.
    pub fn release_scope(&self, scope: &str) -> ScopeRelease {
        let mut table = self.table.lock();
        let removed = table.remove_scope(scope);
        let flushed = if removed > 0 {
            self.flush_locked(&table)
        } else {
            Ok(())
        };
        ScopeRelease { removed, flushed }
    }

    /// Remove all records and flush
    ///
    /// # Errors
    /// `PersistError` if the flush fails; the table stays cleared
    pub fn clear(&self) -> Result<(), PersistError> {
        let mut table = self.table.lock();
        table.clear();
        self.flush_locked(&table)
    }

    /// Write the current table out
    ///
    /// # Errors
    /// `PersistError` if the store rejects the write
    pub fn flush(&self) -> Result<(), PersistError> {
        let table = self.table.lock();
        self.flush_locked(&table)
    }

    fn flush_locked(&self, table: &OwnershipTable) -> Result<(), PersistError> {
        self.store.save(&table.snapshot()).map_err(|e| {
            tracing::warn!("Failed to save ownership records: {}", e);
            e
        })
    }
}
