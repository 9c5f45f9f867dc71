//! Retry policies for transport calls.
//!
//! Devices answer some commands with transient status codes (an entry that
//! is still being committed by a previous command, an object briefly
//! locked). A [`RetryPolicy`] says which status codes are worth repeating
//! the command for, how many times, and how long to wait in between:
//!
//! - Constant or exponential backoff
//! - Equal jitter so several sessions don't retry in lockstep
//! - A cap on both the number of retries and the delay between them
//!
//! # Example
//!
//! ```rust
//! use forticfg::retry::{BackoffStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .backoff(BackoffStrategy::Constant)
//!     .retry_codes([-3])
//!     .build();
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(100));
//! ```

use crate::transport::TransportError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Status codes retried by default: entry not found (-3) and object
/// busy/in use (-23), both seen while the device is still settling a
/// previous change.
pub const DEFAULT_RETRY_CODES: [i32; 2] = [-3, -23];

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Exponential { multiplier } => base_millis * multiplier.powf(attempt as f64),
        };

        Duration::from_millis(delay_millis as u64)
    }
}

/// Jitter strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter - use exact calculated delay.
    #[default]
    None,

    /// Equal jitter: delay = calculated_delay/2 + random(0, calculated_delay/2)
    Equal,
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        if millis == 0 {
            return delay;
        }
        let mut rng = rand::thread_rng();

        match self {
            Self::None => delay,
            Self::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rng.gen_range(0..=half))
            }
        }
    }
}

/// When and how often to repeat a rejected transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
    /// Vendor status codes that make a rejection worth retrying.
    pub retry_codes: Vec<i32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::Equal,
            retry_codes: DEFAULT_RETRY_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Create a builder for the policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_codes: Vec::new(),
            ..Default::default()
        }
    }

    /// Create a policy with simple constant delay retries.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
            ..Default::default()
        }
    }

    /// Calculate the delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(attempt, self.initial_delay);
        self.jitter.apply(base_delay.min(self.max_delay))
    }

    /// Check if retrying should continue based on attempt count.
    pub fn should_continue(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Whether a command rejected with `error` after `attempt` retries
    /// should be sent again.
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        self.should_continue(attempt)
            && error
                .code()
                .is_some_and(|code| self.retry_codes.contains(&code))
    }

    /// Execute an async operation, retrying failures `retryable` accepts.
    ///
    /// Returns the result of the operation, or the last error once retries
    /// are exhausted or an error is not retryable.
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retry attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if !retryable(&e) => {
                    return Err(RetryError::NotRetryable {
                        attempts: attempt + 1,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);

                    if !self.should_continue(attempt) {
                        return Err(RetryError::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            last_error: e,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    /// Set the initial delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff = strategy;
        self
    }

    /// Set the jitter strategy.
    pub fn jitter(mut self, strategy: JitterStrategy) -> Self {
        self.policy.jitter = strategy;
        self
    }

    /// Set the status codes worth retrying.
    pub fn retry_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.policy.retry_codes = codes.into_iter().collect();
        self
    }

    /// Build the RetryPolicy.
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Error type for retry operations.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Maximum number of retries exceeded.
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The last error encountered.
        last_error: E,
    },

    /// The operation failed in a way retrying cannot fix.
    NotRetryable {
        /// Number of attempts made.
        attempts: u32,
        /// The error encountered.
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::MaxRetriesExceeded { attempts, .. }
            | RetryError::NotRetryable { attempts, .. } => *attempts,
        }
    }

    /// The last error encountered.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::MaxRetriesExceeded { last_error, .. }
            | RetryError::NotRetryable { last_error, .. } => last_error,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::MaxRetriesExceeded { attempts, last_error } => write!(
                f,
                "Max retries exceeded after {} attempts. Last error: {}",
                attempts, last_error
            ),
            RetryError::NotRetryable { attempts, last_error } => {
                write!(f, "Failed after {} attempts: {}", attempts, last_error)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::MaxRetriesExceeded { last_error, .. }
            | RetryError::NotRetryable { last_error, .. } => Some(last_error),
        }
    }
}
