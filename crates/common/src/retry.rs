//! Retry with exponential backoff
//!
//! The fetch hook never retries on its own; callers that want retries
//! compose them here.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently to retry a failing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` means a single attempt
    pub max_retries: u32,

    /// Delay before the first retry, doubled after every failure
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
        }
    }

    /// Delays slept between consecutive attempts
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let initial = self.initial_delay_ms;
        (0..self.max_retries).map(move |retry| {
            let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
            Duration::from_millis(initial.saturating_mul(factor))
        })
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// `operation` receives the zero-based attempt number. Returns the first
/// success, or the error of the last attempt.
pub async fn fetch_with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut delays = policy.delays();
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(e) => match delays.next() {
                Some(delay) => {
                    warn!(
                        "Attempt {} of {} failed: {}; retrying in {:?}",
                        attempt + 1,
                        policy.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    warn!("Giving up after {} attempts: {}", attempt + 1, e);
                    return Err(e);
                }
            },
        }
    }
}
