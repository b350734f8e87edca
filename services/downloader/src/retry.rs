//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::RetryPolicyError;

/// How many times an operation is tried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `None` when `max_attempts` is zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Option<Self> {
        (max_attempts >= 1).then_some(Self {
            max_attempts,
            delay,
        })
    }

    /// Build from config values; rejects zero attempts and negative delays.
    pub fn from_secs(max_attempts: u32, delay_secs: f64) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::ZeroAttempts);
        }
        let delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| RetryPolicyError::InvalidDelay(delay_secs))?;
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

/// Retry settings as written in job files.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> f64 {
    10.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, RetryPolicyError> {
        RetryPolicy::from_secs(self.max_attempts, self.delay_secs)
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// Each failure is logged with its attempt number. There is no sleep after
/// the last attempt, and its error is returned as-is.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt {} of {} failed",
                    attempt,
                    max_attempts
                );

                if attempt >= max_attempts {
                    return Err(e);
                }

                if !policy.delay.is_zero() {
                    info!(
                        operation,
                        delay_secs = policy.delay.as_secs_f64(),
                        "Retrying after delay"
                    );
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}
