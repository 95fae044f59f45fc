//! Read-only view of the external marker store
//!
//! The store is owned and mutated by another process. Everything here reads a
//! fresh copy on every call and never writes back.
//!
//! # Layout
//!
//! ```text
//! sets:
//!   <scope>:
//!     markers|areas|circles|lines:
//!       <object id>:
//!         label: <display label>
//!         ...            (ignored)
//! ```

pub mod resolver;

pub use resolver::StoreResolver;

use crate::error::StoreError;
use crate::key::ObjectKind;
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// One object in a store bucket
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredObject {
    /// Display label as stored (possibly HTML-escaped)
    pub label: Option<String>,
}

/// Objects of one kind within one scope, in stored order
pub type Bucket = IndexMap<String, StoredObject>;

/// Snapshot of the marker store: scope → kind → object id → object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreView {
    scopes: IndexMap<String, IndexMap<ObjectKind, Bucket>>,
}

impl StoreView {
    /// Create an empty view
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object
    pub fn insert(
        &mut self,
        scope: impl Into<String>,
        kind: ObjectKind,
        object_id: impl Into<String>,
        label: Option<&str>,
    ) {
        self.scopes
            .entry(scope.into())
            .or_default()
            .entry(kind)
            .or_default()
            .insert(
                object_id.into(),
                StoredObject {
                    label: label.map(str::to_string),
                },
            );
    }

    /// Bucket for (scope, kind), if the store has one
    #[inline]
    #[must_use]
    pub fn bucket(&self, scope: &str, kind: ObjectKind) -> Option<&Bucket> {
        self.scopes.get(scope)?.get(&kind)
    }

    /// Scope names in stored order
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Total number of objects across all scopes
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.scopes
            .values()
            .flat_map(|buckets| buckets.values())
            .map(|bucket| bucket.len())
            .sum()
    }

    /// Build a view from a parsed store document
    ///
    /// Entries that are not mappings are skipped, as are unknown buckets.
    ///
    /// # Errors
    /// `StoreError::Shape` if `sets` exists but is not a mapping
    pub fn from_document(doc: &Value) -> Result<Self, StoreError> {
        let mut view = Self::new();

        let sets = match doc.get("sets") {
            None | Some(Value::Null) => return Ok(view),
            Some(Value::Mapping(sets)) => sets,
            Some(_) => return Err(StoreError::Shape("`sets` is not a mapping".to_string())),
        };

        for (scope, set) in sets {
            let (Some(scope), Value::Mapping(set)) = (scalar_key(scope), set) else {
                continue;
            };
            for kind in ObjectKind::ALL {
                let Some(Value::Mapping(bucket)) = set.get(kind.bucket()) else {
                    continue;
                };
                for (object_id, object) in bucket {
                    let (Some(object_id), Value::Mapping(object)) = (scalar_key(object_id), object)
                    else {
                        continue;
                    };
                    view.insert(scope.clone(), kind, object_id, label_of(object).as_deref());
                }
            }
        }

        Ok(view)
    }
}

/// YAML mapping keys may be numbers or booleans; use their text
fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn label_of(object: &Mapping) -> Option<String> {
    object.get("label").and_then(scalar_key)
}

/// Source of fresh marker store snapshots
///
/// Implementations must not cache across calls: the store changes under us.
pub trait MarkerSource: Send + Sync {
    /// Read the current store
    ///
    /// # Returns
    /// `Ok(None)` when the store does not exist yet
    ///
    /// # Errors
    /// `StoreError` if the store exists but cannot be read
    fn read(&self) -> Result<Option<StoreView>, StoreError>;
}

/// Marker store backed by a Dynmap-style `markers.yml`
#[derive(Debug, Clone)]
pub struct YamlMarkerSource {
    path: PathBuf,
}

impl YamlMarkerSource {
    /// Create source for path
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the store file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MarkerSource for YamlMarkerSource {
    fn read(&self) -> Result<Option<StoreView>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io_error(&self.path, e)),
        };

        if text.trim().is_empty() {
            return Ok(Some(StoreView::new()));
        }

        let doc: Value = serde_yaml::from_str(&text).map_err(|source| StoreError::Yaml {
            path: self.path.clone(),
            source,
        })?;
        StoreView::from_document(&doc).map(Some)
    }
}
