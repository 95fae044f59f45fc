//! Testing utilities for markerguard workspace
//!
//! In-memory marker store, ownership store and notifier fakes, plus fixture
//! helpers for file-backed tests.

#![allow(missing_docs)]

use markerguard_core::{
    CanonicalKey, MarkerSource, Notifier, ObjectKind, OwnerId, OwnershipStore, PersistError,
    StoreError, StoreView,
};
use parking_lot::{Mutex, RwLock};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Marker store held in memory; absent until the first insert
#[derive(Debug, Default)]
pub struct MemoryMarkerSource {
    view: RwLock<Option<StoreView>>,
    reads: AtomicUsize,
}

impl MemoryMarkerSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_view(view: StoreView) -> Arc<Self> {
        Arc::new(Self {
            view: RwLock::new(Some(view)),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, scope: &str, kind: ObjectKind, id: &str, label: Option<&str>) {
        self.view
            .write()
            .get_or_insert_with(StoreView::new)
            .insert(scope, kind, id, label);
    }

    /// Drop the whole store, as if the file were deleted
    pub fn set_absent(&self) {
        *self.view.write() = None;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MarkerSource for MemoryMarkerSource {
    fn read(&self) -> Result<Option<StoreView>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.view.read().clone())
    }
}

/// Ownership store that remembers every save
#[derive(Debug, Default)]
pub struct MemoryOwnershipStore {
    initial: Vec<(String, String)>,
    saved: Mutex<Vec<Vec<(CanonicalKey, OwnerId)>>>,
    fail: AtomicBool,
}

impl MemoryOwnershipStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store whose `load` returns the given raw entries
    pub fn with_entries<K: Into<String>, V: Into<String>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            initial: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().len()
    }

    pub fn last_saved(&self) -> Option<Vec<(CanonicalKey, OwnerId)>> {
        self.saved.lock().last().cloned()
    }
}

/// Shared handle so tests keep access after the registry takes ownership
#[derive(Debug, Clone)]
pub struct SharedOwnershipStore(pub Arc<MemoryOwnershipStore>);

impl OwnershipStore for SharedOwnershipStore {
    fn load(&self) -> Result<Vec<(String, String)>, PersistError> {
        Ok(self.0.initial.clone())
    }

    fn save(&self, entries: &[(CanonicalKey, OwnerId)]) -> Result<(), PersistError> {
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(PersistError::Shape("simulated write failure".to_string()));
        }
        self.0.saved.lock().push(entries.to_vec());
        Ok(())
    }
}

/// Notifier that records every notice
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(OwnerId, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<(OwnerId, String)> {
        self.notices.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: &OwnerId, message: &str) {
        self.notices
            .lock()
            .push((recipient.clone(), message.to_string()));
    }
}

/// Random player-style identity
pub fn fresh_identity() -> OwnerId {
    OwnerId::new(uuid::Uuid::new_v4().to_string())
}

/// Write a `markers.yml` with one point marker per (scope, id, label)
pub fn write_markers_file(path: &Path, points: &[(&str, &str, &str)]) {
    let mut sets = Mapping::new();

    for (scope, id, label) in points {
        let set = sets
            .entry(Value::from(*scope))
            .or_insert_with(|| {
                let mut set = Mapping::new();
                set.insert("label".into(), Value::from(*scope));
                set.insert("markers".into(), Value::Mapping(Mapping::new()));
                Value::Mapping(set)
            });
        let Some(Value::Mapping(markers)) = set.get_mut("markers") else {
            unreachable!("set entries always carry a markers mapping");
        };

        let mut marker = Mapping::new();
        marker.insert("label".into(), Value::from(*label));
        marker.insert("x".into(), Value::from(0.0));
        markers.insert(Value::from(*id), Value::Mapping(marker));
    }

    let mut doc = Mapping::new();
    doc.insert("sets".into(), Value::Mapping(sets));
    std::fs::write(path, serde_yaml::to_string(&doc).unwrap()).unwrap();
}
