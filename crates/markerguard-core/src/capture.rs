//! Ownership capture after creation commands
//!
//! A creation command returns before the store shows the new object, so the
//! creator is recorded by a capture chain: a spawned task that polls the
//! resolver on a linear, capped backoff until the object appears or the
//! attempt budget runs out.
//!
//! ```text
//! Pending(0) ──unresolved──▶ Pending(1) ──▶ ... ──▶ Pending(max) ──unresolved──▶ Abandoned
//!     │                          │                       │
//!     └────────resolved──────────┴───────────────────────┴──▶ Captured | AlreadyOwned
//! ```

use crate::config::RetryPolicy;
use crate::key::{CanonicalKey, ObjectKind};
use crate::ownership::{OwnerId, OwnershipRegistry};
use crate::store::StoreResolver;
use crate::target::TargetDescriptor;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What to capture and for whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Kind of the created object
    pub kind: ObjectKind,
    /// Target named by the creation command
    pub target: TargetDescriptor,
    /// Identity to record as owner
    pub owner: OwnerId,
    /// Leave an existing record untouched
    pub only_if_missing: bool,
}

impl CaptureRequest {
    /// Request that overwrites any existing owner
    #[must_use]
    pub fn new(kind: ObjectKind, target: TargetDescriptor, owner: OwnerId) -> Self {
        Self {
            kind,
            target,
            owner,
            only_if_missing: false,
        }
    }

    /// Keep an existing owner if one is recorded
    #[must_use]
    pub fn only_if_missing(mut self) -> Self {
        self.only_if_missing = true;
        self
    }
}

/// Terminal state of a capture chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Owner recorded for key
    Captured(CanonicalKey),
    /// Object found but already owned; nothing written
    AlreadyOwned(CanonicalKey),
    /// Object never appeared within the attempt budget
    Abandoned {
        /// Attempts made
        attempts: u32,
    },
}

/// Spawns capture chains
#[derive(Debug, Clone)]
pub struct CaptureScheduler {
    resolver: StoreResolver,
    registry: Arc<OwnershipRegistry>,
    policy: RetryPolicy,
}

impl CaptureScheduler {
    /// Create scheduler
    #[must_use]
    pub fn new(resolver: StoreResolver, registry: Arc<OwnershipRegistry>, policy: RetryPolicy) -> Self {
        Self {
            resolver,
            registry,
            policy,
        }
    }

    /// Backoff schedule in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start a capture chain on the current Tokio runtime
    ///
    /// Returns immediately; the handle may be awaited or dropped.
    ///
    /// # Panics
    /// If called outside a Tokio runtime
    pub fn schedule(&self, request: CaptureRequest) -> JoinHandle<CaptureOutcome> {
        let chain = self.clone();
        tokio::spawn(async move { chain.run(request).await })
    }

    /// Run a capture chain to completion
    ///
    /// Store reads and ownership flushes are file IO, so each attempt runs on
    /// the blocking pool; only the backoff sleeps on the async side.
    pub async fn run(&self, request: CaptureRequest) -> CaptureOutcome {
        let request = Arc::new(request);

        for attempt in 0..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.delay_for(attempt)).await;

            let chain = self.clone();
            let pending = Arc::clone(&request);
            match tokio::task::spawn_blocking(move || chain.attempt(&pending)).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => tracing::debug!(
                    "capture attempt {} for {:?} unresolved",
                    attempt,
                    request.target
                ),
                Err(e) => tracing::warn!("capture attempt {} failed to run: {}", attempt, e),
            }
        }

        let attempts = self.policy.max_attempts + 1;
        tracing::debug!(
            "capture for {:?} abandoned after {} attempts",
            request.target,
            attempts
        );
        CaptureOutcome::Abandoned { attempts }
    }

    /// One blocking resolve-and-commit; `None` while the object is not visible
    fn attempt(&self, request: &CaptureRequest) -> Option<CaptureOutcome> {
        let key = self.resolver.resolve(request.kind, &request.target)?;
        Some(self.commit(key, request))
    }

    // Flush failures are logged by the registry and the record stays in memory.
    fn commit(&self, key: CanonicalKey, request: &CaptureRequest) -> CaptureOutcome {
        if request.only_if_missing {
            if let Ok(false) = self
                .registry
                .record_if_missing(key.clone(), request.owner.clone())
            {
                tracing::debug!("{} already owned; capture skipped", key);
                return CaptureOutcome::AlreadyOwned(key);
            }
        } else if self
            .registry
            .record(key.clone(), request.owner.clone())
            .is_err()
        {
            tracing::debug!("{} captured in memory only", key);
        }

        tracing::info!("Captured ownership of {} for {}", key, request.owner);
        CaptureOutcome::Captured(key)
    }
}
