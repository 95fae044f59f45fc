//! Configuration
//!
//! [`GuardConfig`] deserializes from YAML with every field optional. The
//! capture defaults mirror the host scheduler's timing (one tick = 50 ms):
//! first attempt after 2 ticks, then `min(40, 10 × n)` ticks.

use crate::error::ConfigError;
use crate::key::DEFAULT_SCOPE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Notice sent to an actor whose command was denied
pub const DEFAULT_DENY_MESSAGE: &str = "You can only delete markers you created.";

/// Command name the router intercepts
pub const DEFAULT_COMMAND_NAME: &str = "dmarker";

/// Backoff schedule for capture chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a chain makes `max_attempts + 1` attempts
    pub max_attempts: u32,
    /// Delay before attempt 0, in milliseconds
    pub initial_delay_ms: u64,
    /// Per-attempt increment for attempts after the first, in milliseconds
    pub step_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub cap_ms: u64,
}

impl RetryPolicy {
    /// Delay before the given attempt: `initial` for 0, else `min(cap, step × n)`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = if attempt == 0 {
            self.initial_delay_ms
        } else {
            self.step_ms
                .saturating_mul(u64::from(attempt))
                .min(self.cap_ms)
        };
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            step_ms: 500,
            cap_ms: 2_000,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// First command token the router intercepts
    pub command_name: String,
    /// Scope used when a command names none
    pub default_scope: String,
    /// Notice sent on denial
    pub deny_message: String,
    /// Drop ownership records of a scope when a privileged actor deletes it
    pub purge_scope_on_delete: bool,
    /// Marker store file
    pub markers_path: Option<PathBuf>,
    /// Ownership file
    pub ownership_path: Option<PathBuf>,
    /// Capture backoff
    pub capture: RetryPolicy,
}

impl GuardConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML file
    ///
    /// # Errors
    /// `ConfigError` if the file is unreadable, malformed or invalid
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the router unusable
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_name.trim().is_empty() {
            return Err(ConfigError::Invalid("command_name is empty".to_string()));
        }
        if self.default_scope.trim().is_empty() {
            return Err(ConfigError::Invalid("default_scope is empty".to_string()));
        }
        Ok(())
    }

    /// With marker store path
    #[inline]
    #[must_use]
    pub fn with_markers_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.markers_path = Some(path.into());
        self
    }

    /// With ownership file path
    #[inline]
    #[must_use]
    pub fn with_ownership_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ownership_path = Some(path.into());
        self
    }

    /// With capture backoff
    #[inline]
    #[must_use]
    pub fn with_capture(mut self, capture: RetryPolicy) -> Self {
        self.capture = capture;
        self
    }

    /// With scope purge on privileged scope deletion
    #[inline]
    #[must_use]
    pub fn with_purge_scope_on_delete(mut self, purge: bool) -> Self {
        self.purge_scope_on_delete = purge;
        self
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            command_name: DEFAULT_COMMAND_NAME.to_string(),
            default_scope: DEFAULT_SCOPE.to_string(),
            deny_message: DEFAULT_DENY_MESSAGE.to_string(),
            purge_scope_on_delete: true,
            markers_path: None,
            ownership_path: None,
            capture: RetryPolicy::default(),
        }
    }
}
