//! Durable ownership persistence
//!
//! The persisted form is rewritten in full on every flush, so entries loaded
//! under legacy key shapes converge to canonical keys over time.
//!
//! # File layout
//!
//! ```text
//! owner:
//!   "marker:markers:spawn": 0b9f...   # current writers
//!   area:
//!     towns:plaza: 7c1e...            # nested by older writers, joined with '.'
//! owner.marker:abc: 91aa...           # flat legacy keys at the top level
//! ```

use crate::error::PersistError;
use crate::key::CanonicalKey;
use crate::ownership::OwnerId;
use serde_yaml::{Mapping, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Section holding ownership records
const OWNER_SECTION: &str = "owner";

/// Durable backing for the ownership table
pub trait OwnershipStore: Send + Sync {
    /// Load persisted (raw key, owner) pairs in their stored order
    ///
    /// # Errors
    /// `PersistError` if the backing store exists but cannot be read
    fn load(&self) -> Result<Vec<(String, String)>, PersistError>;

    /// Replace the persisted ownership section with `entries`
    ///
    /// # Errors
    /// `PersistError` if the write fails; the previous contents stay intact
    fn save(&self, entries: &[(CanonicalKey, OwnerId)]) -> Result<(), PersistError>;
}

/// Ownership records kept in a YAML file alongside unrelated settings
#[derive(Debug, Clone)]
pub struct YamlOwnershipFile {
    path: PathBuf,
}

impl YamlOwnershipFile {
    /// Create store for path
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the ownership file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Mapping, PersistError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Mapping::new()),
            Err(e) => return Err(PersistError::io_error(&self.path, e)),
        };

        let doc: Value = serde_yaml::from_str(&text).map_err(|source| PersistError::Yaml {
            path: self.path.clone(),
            source,
        })?;

        match doc {
            Value::Null => Ok(Mapping::new()),
            Value::Mapping(map) => Ok(map),
            _ => Err(PersistError::Shape(format!(
                "{} is not a mapping",
                self.path.display()
            ))),
        }
    }

    fn write_atomic(&self, body: &str) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::io_error(parent, e))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ownership.yml".to_string());
        let temp_path = self.path.with_file_name(format!("{file_name}.tmp"));

        let mut file =
            std::fs::File::create(&temp_path).map_err(|e| PersistError::io_error(&temp_path, e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| PersistError::io_error(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| PersistError::io_error(&temp_path, e))?;
        drop(file);

        std::fs::rename(&temp_path, &self.path).map_err(|e| PersistError::io_error(&self.path, e))
    }
}

impl OwnershipStore for YamlOwnershipFile {
    fn load(&self) -> Result<Vec<(String, String)>, PersistError> {
        let doc = self.read_document()?;
        let mut entries = Vec::new();

        if let Some(Value::Mapping(section)) = doc.get(OWNER_SECTION) {
            collect_nested(section, None, &mut entries);
        }

        let flat_prefix = format!("{OWNER_SECTION}.");
        for (key, value) in &doc {
            let (Value::String(key), Value::String(owner)) = (key, value) else {
                continue;
            };
            if let Some(raw_key) = key.strip_prefix(&flat_prefix) {
                entries.push((raw_key.to_string(), owner.clone()));
            }
        }

        Ok(entries)
    }

    fn save(&self, entries: &[(CanonicalKey, OwnerId)]) -> Result<(), PersistError> {
        // An unparseable file is replaced wholesale; only IO failures abort.
        let mut doc = match self.read_document() {
            Ok(doc) => doc,
            Err(e @ (PersistError::Yaml { .. } | PersistError::Shape(_))) => {
                tracing::warn!("Replacing unreadable ownership file: {}", e);
                Mapping::new()
            }
            Err(e) => return Err(e),
        };

        let flat_prefix = format!("{OWNER_SECTION}.");
        doc.retain(|key, _| match key.as_str() {
            Some(k) => k != OWNER_SECTION && !k.starts_with(&flat_prefix),
            None => true,
        });

        let section: Mapping = entries
            .iter()
            .map(|(key, owner)| {
                (
                    Value::String(key.to_string()),
                    Value::String(owner.as_str().to_string()),
                )
            })
            .collect();
        doc.insert(Value::String(OWNER_SECTION.to_string()), Value::Mapping(section));

        let body = serde_yaml::to_string(&doc).map_err(|source| PersistError::Yaml {
            path: self.path.clone(),
            source,
        })?;
        self.write_atomic(&body)
    }
}

/// Depth-first walk; nested mapping keys are joined with `.`
fn collect_nested(section: &Mapping, prefix: Option<&str>, out: &mut Vec<(String, String)>) {
    for (key, value) in section {
        let Some(key) = key.as_str() else {
            continue;
        };
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.to_string(),
        };
        match value {
            Value::String(owner) => out.push((path, owner.clone())),
            Value::Mapping(child) => collect_nested(child, Some(&path), out),
            _ => {}
        }
    }
}
