//! engine::retry
//!
//! Network retry policy for pull, push and content sync calls.
//!
//! Only transient network failures are retried. Everything else, including
//! a refused push, surfaces on the first attempt.

use std::time::Duration;

use crate::content::ContentError;
use crate::git::GitError;

/// Substrings (lowercase) that mark a failure as a transient network error.
pub const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "timed out",
    "timeout",
    "temporarily unavailable",
    "connection reset",
    "connection aborted",
    "connection refused",
    "could not resolve host",
    "unable to access",
    "transport endpoint",
    "broken pipe",
    "resource busy",
    "name or service not known",
];

/// Whether `message` reads like a transient network failure.
pub fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Classifies an error as worth retrying.
pub trait RetryClassify {
    fn is_transient(&self) -> bool;
}

impl RetryClassify for GitError {
    fn is_transient(&self) -> bool {
        match self {
            GitError::Timeout { .. } => true,
            GitError::PushRejected { .. }
            | GitError::DubiousOwnership { .. }
            | GitError::NotARepo { .. }
            | GitError::Parse { .. } => false,
            other => is_transient_message(&other.to_string()),
        }
    }
}

impl RetryClassify for ContentError {
    fn is_transient(&self) -> bool {
        match self {
            ContentError::Timeout { .. } => true,
            ContentError::Aborted => false,
            other => is_transient_message(&other.to_string()),
        }
    }
}

/// Attempts and backoff for network operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(750),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Same attempts, no waiting. For tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// At least one attempt.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(max_delay, base_delay * 2^(attempt - 1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
