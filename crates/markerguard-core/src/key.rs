//! Ownership keys
//!
//! Provides [`ObjectKind`] and [`CanonicalKey`], the only key shape written to
//! the ownership table. Keys written by earlier releases (unscoped, or without
//! a kind prefix) are accepted by [`CanonicalKey::parse_legacy`] and migrate to
//! the canonical form on the next flush.
//!
//! # Examples
//! - `marker:abc` → `marker:markers:abc`
//! - `area:myscope:xyz` → `area:myscope:xyz`
//! - `area:my scope:xyz` → `area:markers:xyz`

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Scope used when a command or legacy key does not name one
pub const DEFAULT_SCOPE: &str = "markers";

/// Annotation shape supported by the marker store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    /// Single-point marker
    Point,
    /// Polygon area
    Area,
    /// Circle
    Circle,
    /// Polyline
    Line,
}

impl ObjectKind {
    /// All kinds, in key-prefix order
    pub const ALL: [ObjectKind; 4] = [Self::Point, Self::Area, Self::Circle, Self::Line];

    /// Prefix used in canonical keys
    #[inline]
    #[must_use]
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::Point => "marker",
            Self::Area => "area",
            Self::Circle => "circle",
            Self::Line => "line",
        }
    }

    /// Name of the store bucket holding objects of this kind
    #[inline]
    #[must_use]
    pub fn bucket(self) -> &'static str {
        match self {
            Self::Point => "markers",
            Self::Area => "areas",
            Self::Circle => "circles",
            Self::Line => "lines",
        }
    }

    /// Kind for a key prefix (`marker`, `area`, `circle`, `line`)
    #[must_use]
    pub fn from_key_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key_prefix() == prefix)
    }

    /// Kind for a store bucket name (`markers`, `areas`, ...)
    #[must_use]
    pub fn from_bucket(bucket: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.bucket() == bucket)
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_prefix())
    }
}

impl FromStr for ObjectKind {
    type Err = UnknownKind;

    /// Accepts key prefixes, bucket names and `point`, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower == "point" {
            return Ok(Self::Point);
        }
        Self::from_key_prefix(&lower)
            .or_else(|| Self::from_bucket(&lower))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Error for unrecognized object kind names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown object kind: '{0}'")]
pub struct UnknownKind(pub String);

/// Canonical ownership key: `kind:scope:objectId`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey {
    kind: ObjectKind,
    scope: String,
    object_id: String,
}

impl CanonicalKey {
    /// Build a key, substituting [`DEFAULT_SCOPE`] for an empty or absent scope
    #[must_use]
    pub fn build(kind: ObjectKind, scope: Option<&str>, object_id: impl Into<String>) -> Self {
        let scope = match scope {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => DEFAULT_SCOPE.to_string(),
        };
        Self {
            kind,
            scope,
            object_id: object_id.into(),
        }
    }

    /// Parse a key in any shape written by current or earlier releases
    ///
    /// Returns `None` when no object id can be recovered: empty input, no
    /// colon at all, or a trailing colon.
    #[must_use]
    pub fn parse_legacy(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let (_, object_id) = raw.rsplit_once(':')?;
        if object_id.is_empty() {
            return None;
        }

        let prefixed = ObjectKind::ALL.into_iter().find_map(|kind| {
            raw.strip_prefix(kind.key_prefix())
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|rest| (kind, rest))
        });

        let (kind, scope) = match prefixed {
            Some((kind, remainder)) => {
                let scope = remainder
                    .split_once(':')
                    .map(|(candidate, _)| candidate)
                    .filter(|candidate| is_simple_scope(candidate));
                (kind, scope)
            }
            None => (ObjectKind::Point, None),
        };

        Some(Self::build(kind, scope, object_id))
    }

    /// Object kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Scope (never empty)
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Object id within the scope's bucket
    #[inline]
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl Display for CanonicalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.scope, self.object_id)
    }
}

/// Scope segments are limited to alphanumerics, `_` and `-`
fn is_simple_scope(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
