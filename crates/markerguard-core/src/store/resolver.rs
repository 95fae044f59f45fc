//! Target resolution against the marker store
//!
//! Turns a [`TargetDescriptor`] into the [`CanonicalKey`] of a concrete store
//! object. An explicit id always wins over a label match.

use super::{Bucket, MarkerSource};
use crate::key::{CanonicalKey, ObjectKind};
use crate::label;
use crate::target::TargetDescriptor;
use std::sync::Arc;

/// Resolves command targets to canonical keys
#[derive(Clone)]
pub struct StoreResolver {
    source: Arc<dyn MarkerSource>,
    default_scope: String,
}

impl std::fmt::Debug for StoreResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreResolver")
            .field("default_scope", &self.default_scope)
            .finish_non_exhaustive()
    }
}

impl StoreResolver {
    /// Create resolver over a marker source
    #[must_use]
    pub fn new(source: Arc<dyn MarkerSource>, default_scope: impl Into<String>) -> Self {
        Self {
            source,
            default_scope: default_scope.into(),
        }
    }

    /// Scope used when a target names none
    #[inline]
    #[must_use]
    pub fn default_scope(&self) -> &str {
        &self.default_scope
    }

    /// Resolve a target to the key of an existing store object
    ///
    /// Reads the store fresh. Returns `None` when the store, scope, bucket or
    /// object is missing, and when the store cannot be read at all.
    #[must_use]
    pub fn resolve(&self, kind: ObjectKind, target: &TargetDescriptor) -> Option<CanonicalKey> {
        let scope = target.scope_or(&self.default_scope);

        let view = match self.source.read() {
            Ok(Some(view)) => view,
            Ok(None) => {
                tracing::debug!("marker store not present yet");
                return None;
            }
            Err(e) => {
                tracing::warn!("marker store unreadable: {}", e);
                return None;
            }
        };

        let Some(bucket) = view.bucket(scope, kind) else {
            tracing::debug!("no {} bucket in scope '{}'", kind.bucket(), scope);
            return None;
        };

        let found = find_by_id_or_label(bucket, target)?;
        Some(CanonicalKey::build(kind, Some(scope), found))
    }
}

/// Id match first (explicit id, else the label taken as an id), then the
/// first entry whose normalized label matches case-insensitively.
fn find_by_id_or_label<'a>(bucket: &'a Bucket, target: &TargetDescriptor) -> Option<&'a str> {
    let id = target.explicit_id.as_deref().or(target.label.as_deref());
    if let Some((found, _)) = id.and_then(|id| bucket.get_key_value(id)) {
        return Some(found.as_str());
    }

    let wanted = match target.label.as_deref() {
        Some(l) if !l.is_empty() => label::normalize(l).to_lowercase(),
        _ => return None,
    };

    bucket.iter().find_map(|(object_id, object)| {
        let stored = label::normalize(object.label.as_deref()?);
        (stored.to_lowercase() == wanted).then_some(object_id.as_str())
    })
}
