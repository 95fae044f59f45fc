//! Ownership table
//!
//! In-memory map of [`CanonicalKey`] → [`OwnerId`]. [`OwnershipTable`] is the
//! plain data structure; [`OwnershipRegistry`] wraps it with locking and the
//! durable [`OwnershipStore`].

pub mod persist;
pub mod registry;

pub use persist::{OwnershipStore, YamlOwnershipFile};
pub use registry::{OwnershipRegistry, ScopeRelease};

use crate::key::CanonicalKey;
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};

/// Opaque identity of the principal owning an object (e.g. a player UUID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wrap an identity string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity as text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Outcome of a load pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries accepted (duplicates after migration count each time)
    pub loaded: usize,
    /// Entries whose key had no recoverable object id
    pub dropped: usize,
    /// Entries skipped for an empty owner
    pub skipped_empty: usize,
}

/// Canonical key → owner, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipTable {
    owners: IndexMap<CanonicalKey, OwnerId>,
}

impl OwnershipTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace contents with persisted entries, migrating legacy keys
    ///
    /// Later entries that normalize to the same key overwrite earlier ones.
    pub fn load<I, K, V>(&mut self, entries: I) -> LoadReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.owners.clear();
        let mut report = LoadReport::default();

        for (raw_key, owner) in entries {
            let owner = owner.into();
            if owner.is_empty() {
                report.skipped_empty += 1;
                continue;
            }
            match CanonicalKey::parse_legacy(raw_key.as_ref()) {
                Some(key) => {
                    self.owners.insert(key, OwnerId(owner));
                    report.loaded += 1;
                }
                None => report.dropped += 1,
            }
        }

        report
    }

    /// Owner of key, if recorded
    #[inline]
    #[must_use]
    pub fn get(&self, key: &CanonicalKey) -> Option<&OwnerId> {
        self.owners.get(key)
    }

    /// Whether a record exists for key
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.owners.contains_key(key)
    }

    /// Whether `owner` is the recorded owner of key (exact match)
    #[inline]
    #[must_use]
    pub fn is_owner(&self, key: &CanonicalKey, owner: &OwnerId) -> bool {
        self.owners.get(key) == Some(owner)
    }

    /// Record owner for key, returning the previous owner
    pub fn put(&mut self, key: CanonicalKey, owner: OwnerId) -> Option<OwnerId> {
        self.owners.insert(key, owner)
    }

    /// Remove record for key, keeping the order of the rest
    pub fn remove(&mut self, key: &CanonicalKey) -> Option<OwnerId> {
        self.owners.shift_remove(key)
    }

    /// Remove every record in scope, returning how many were removed
    pub fn remove_scope(&mut self, scope: &str) -> usize {
        let before = self.owners.len();
        self.owners.retain(|key, _| key.scope() != scope);
        before - self.owners.len()
    }

    /// Remove all records
    #[inline]
    pub fn clear(&mut self) {
        self.owners.clear();
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Entries in insertion order, for a full rewrite of the persisted form
    #[must_use]
    pub fn snapshot(&self) -> Vec<(CanonicalKey, OwnerId)> {
        self.owners
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ObjectKind;

    fn key(id: &str) -> CanonicalKey {
        CanonicalKey::build(ObjectKind::Point, None, id)
    }

    #[test]
    fn ownership_round_trip() {
        let mut table = OwnershipTable::new();
        let owner = OwnerId::new("u-1");
        table.put(key("home"), owner.clone());

        assert!(table.is_owner(&key("home"), &owner));
        assert!(!table.is_owner(&key("home"), &OwnerId::new("other")));

        table.remove(&key("home"));
        assert!(!table.is_owner(&key("home"), &owner));
    }

    #[test]
    fn unrecorded_key_is_unowned() {
        let table = OwnershipTable::new();
        assert!(!table.is_owner(&key("nothing"), &OwnerId::new("u-1")));
        assert!(table.get(&key("nothing")).is_none());
    }

    #[test]
    fn load_migrates_and_drops() {
        let mut table = OwnershipTable::new();
        table.put(key("stale"), OwnerId::new("gone"));

        let report = table.load(vec![
            ("marker:abc", "u-1"),
            ("area:towns:plaza", "u-2"),
            ("nocolon", "u-3"),
            ("marker:markers:", "u-4"),
            ("line:markers:road", ""),
        ]);

        assert_eq!(
            report,
            LoadReport {
                loaded: 2,
                dropped: 2,
                skipped_empty: 1
            }
        );
        assert_eq!(table.len(), 2);
        assert!(table.get(&key("stale")).is_none());
        assert_eq!(table.get(&key("abc")).map(OwnerId::as_str), Some("u-1"));
    }

    #[test]
    fn load_last_duplicate_wins() {
        let mut table = OwnershipTable::new();
        table.load(vec![("marker:abc", "first"), ("marker:markers:abc", "second")]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&key("abc")).map(OwnerId::as_str), Some("second"));
    }

    #[test]
    fn remove_scope_keeps_other_scopes() {
        let mut table = OwnershipTable::new();
        table.put(CanonicalKey::build(ObjectKind::Point, Some("towns"), "a"), "u".into());
        table.put(CanonicalKey::build(ObjectKind::Area, Some("towns"), "b"), "u".into());
        table.put(key("c"), "u".into());

        assert_eq!(table.remove_scope("towns"), 2);
        assert_eq!(table.len(), 1);
        assert!(table.contains(&key("c")));
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut table = OwnershipTable::new();
        for id in ["z", "a", "m"] {
            table.put(key(id), OwnerId::new(id));
        }
        table.remove(&key("a"));

        let ids: Vec<_> = table
            .snapshot()
            .into_iter()
            .map(|(k, _)| k.object_id().to_string())
            .collect();
        assert_eq!(ids, vec!["z", "m"]);
    }
}
