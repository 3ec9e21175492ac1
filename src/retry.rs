//! Retry policies that can be attached to backend clients.
//!
//! A policy only *describes* when and how long to wait before another attempt.
//! Executing the retries is the transport's job; the wrappers in this crate
//! only hand a policy to their client through `set_retry_policy` and never
//! consult it themselves.

use crate::backend::traits::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on any single computed backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Pluggable retry strategy.
pub trait RetryPolicy: Send + Sync + Debug {
    /// Delay before attempt `attempt + 1`, given that attempt `attempt`
    /// (1-based) failed with `error`. `None` means give up.
    fn next_delay(&self, attempt: u32, error: &StorageError) -> Option<Duration>;

    /// Total number of attempts this policy allows, first try included.
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff: `delta_backoff * 2^(attempt - 1)`, capped at [`MAX_BACKOFF`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialRetry {
    pub delta_backoff: Duration,
    pub max_attempts: u32,
}

impl ExponentialRetry {
    #[must_use]
    pub const fn new(delta_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            delta_backoff,
            max_attempts,
        }
    }
}

impl Default for ExponentialRetry {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5)
    }
}

impl RetryPolicy for ExponentialRetry {
    fn next_delay(&self, attempt: u32, error: &StorageError) -> Option<Duration> {
        if !error.is_transient() || attempt >= self.max_attempts {
            return None;
        }
        // Saturates for large attempt counts
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        Some(self.delta_backoff.saturating_mul(factor).min(MAX_BACKOFF))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearRetry {
    pub delta_backoff: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy for LinearRetry {
    fn next_delay(&self, attempt: u32, error: &StorageError) -> Option<Duration> {
        (error.is_transient() && attempt < self.max_attempts)
            .then(|| self.delta_backoff.min(MAX_BACKOFF))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32, _error: &StorageError) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

// ============================================================================
// Serializable settings
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    #[default]
    Exponential,
    Linear,
    None,
}

/// Configuration form of a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub mode: RetryMode,
    pub delta_backoff_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            mode: RetryMode::Exponential,
            delta_backoff_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl RetrySettings {
    /// Build the policy these settings describe.
    #[must_use]
    pub fn build(&self) -> Arc<dyn RetryPolicy> {
        let delta_backoff = Duration::from_millis(self.delta_backoff_ms);
        match self.mode {
            RetryMode::Exponential => Arc::new(ExponentialRetry::new(delta_backoff, self.max_attempts)),
            RetryMode::Linear => Arc::new(LinearRetry {
                delta_backoff,
                max_attempts: self.max_attempts,
            }),
            RetryMode::None => Arc::new(NoRetry),
        }
    }
}
