//! Markerguard Core - ownership reconciliation for a shared marker store
//!
//! Sits in front of a map-marker command surface that has no notion of
//! ownership:
//! - Extracts the target object from free-form command text
//! - Resolves targets against the externally owned marker store
//! - Captures the creator once a new object shows up in the store
//! - Denies unprivileged deletes and updates of objects owned by others
//! - Persists ownership under canonical `kind:scope:objectId` keys, migrating
//!   legacy key shapes on load
//!
//! # Example
//!
//! ```rust,ignore
//! use markerguard_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GuardConfig::new();
//! let registry = Arc::new(OwnershipRegistry::new(Box::new(YamlOwnershipFile::new("ownership.yml"))));
//! registry.load()?;
//!
//! let router = CommandRouter::new(
//!     &config,
//!     Arc::new(YamlMarkerSource::new("markers.yml")),
//!     registry,
//!     Arc::new(PrivilegedSet::new(["admin"])),
//!     Arc::new(TracingNotifier),
//! );
//!
//! let decision = router.handle("/dmarker delete id:spawn", &OwnerId::new("player-1"));
//! println!("cancelled: {}", decision.is_cancelled());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod capture;
pub mod config;
pub mod error;
pub mod key;
pub mod label;
pub mod ownership;
pub mod router;
pub mod store;
pub mod target;

// Re-exports for convenience
pub use capture::{CaptureOutcome, CaptureRequest, CaptureScheduler};
pub use config::{GuardConfig, RetryPolicy};
pub use error::{ConfigError, GuardError, GuardResult, PersistError, StoreError};
pub use key::{CanonicalKey, ObjectKind, UnknownKind, DEFAULT_SCOPE};
pub use ownership::{
    LoadReport, OwnerId, OwnershipRegistry, OwnershipStore, OwnershipTable, ScopeRelease,
    YamlOwnershipFile,
};
pub use router::{
    CommandClass, CommandRouter, Decision, DenyReason, Effect, Notifier, PrivilegeCheck,
    PrivilegedSet, TracingNotifier,
};
pub use store::{MarkerSource, StoreResolver, StoreView, StoredObject, YamlMarkerSource};
pub use target::TargetDescriptor;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the router
    pub use crate::{
        CanonicalKey, CommandRouter, Decision, Effect, GuardConfig, MarkerSource, Notifier,
        ObjectKind, OwnerId, OwnershipRegistry, PrivilegeCheck, PrivilegedSet, TracingNotifier,
        YamlMarkerSource, YamlOwnershipFile,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
