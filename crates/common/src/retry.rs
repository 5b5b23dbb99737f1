//! Bounded retry bookkeeping.
//!
//! A [`RetryContext`] is created for one logical external-command invocation
//! and passed by value through every retry of that invocation. It is never
//! shared between unrelated commands, so two invocations cannot consume each
//! other's attempts.

use serde::{Deserialize, Serialize};

/// Default number of attempts for a single logical invocation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Attempt counter for one logical invocation.
///
/// `attempt` is 1-based: the first execution runs with `attempt == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
    attempt: u32,
    max_attempts: u32,
}

impl RetryContext {
    /// Start a new invocation allowing at most `max_attempts` executions.
    ///
    /// A value of zero is treated as one; the command always runs once.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Current attempt number (1-based)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Upper bound on executions for this invocation
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another execution is still allowed after the current one
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Context for the next execution, or `None` once attempts are exhausted
    pub fn next(self) -> Option<Self> {
        self.can_retry().then(|| Self {
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
        })
    }
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
