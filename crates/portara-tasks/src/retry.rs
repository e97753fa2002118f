// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded, jittered retries around an external job trigger.
//!
//! Some external services reject a trigger with a transient "cancelled"
//! signal when a previous run is still settling. [`RetryExecutor`] absorbs
//! that signal: it re-attempts the call up to a configured bound, waiting a
//! randomized delay between attempts, and serializes callers so only one
//! trigger is ever in flight per executor instance. Hard errors are never
//! retried, and exhausting the bound is a terminal, typed error rather than
//! a silent give-up.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ConfigError, Error, Result};

/// Outcome of one invocation of the wrapped external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The job was accepted and produced a result.
    Completed(T),
    /// The job was rejected with a transient "cancelled, try again" signal.
    ///
    /// Distinct from an error: the service is healthy but not ready to take
    /// the job yet.
    Cancelled,
}

/// Retry bounds and delay window for an executor.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the initial call.
    pub max_attempts: u32,
    /// Lower bound of the randomized inter-attempt delay.
    pub min_delay: Duration,
    /// Upper bound of the randomized inter-attempt delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Load retry bounds from environment variables.
    ///
    /// Reads `PORTARA_TRIGGER_MAX_ATTEMPTS`, `PORTARA_TRIGGER_MIN_DELAY_SECS`
    /// and `PORTARA_TRIGGER_MAX_DELAY_SECS`, keeping the defaults for unset
    /// variables.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_attempts: u32 = std::env::var("PORTARA_TRIGGER_MAX_ATTEMPTS")
            .unwrap_or_else(|_| defaults.max_attempts.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_TRIGGER_MAX_ATTEMPTS"))?;

        let min_delay: u64 = std::env::var("PORTARA_TRIGGER_MIN_DELAY_SECS")
            .unwrap_or_else(|_| defaults.min_delay.as_secs().to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_TRIGGER_MIN_DELAY_SECS"))?;

        let max_delay: u64 = std::env::var("PORTARA_TRIGGER_MAX_DELAY_SECS")
            .unwrap_or_else(|_| defaults.max_delay.as_secs().to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_TRIGGER_MAX_DELAY_SECS"))?;

        Ok(Self {
            max_attempts,
            min_delay: Duration::from_secs(min_delay),
            max_delay: Duration::from_secs(max_delay),
        })
    }
}

/// Single-flight retry wrapper around one external job trigger.
///
/// The underlying job is stateful and non-reentrant, so concurrent
/// [`execute`](Self::execute) calls queue behind an explicit mutex rather
/// than interleave. The inter-attempt delay is a suspend point: a waiting
/// executor never blocks a thread or another executor instance.
pub struct RetryExecutor {
    config: RetryConfig,
    flight: Mutex<()>,
}

impl RetryExecutor {
    /// Create an executor with the given retry bounds.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            flight: Mutex::new(()),
        }
    }

    /// Retry bounds this executor was built with.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `call` until it completes, fails hard, or exhausts the bound.
    ///
    /// The first attempt runs with no delay. A [`CallOutcome::Cancelled`]
    /// result schedules another attempt after a delay drawn uniformly from
    /// `[min_delay, max_delay]`; an `Err` propagates immediately without
    /// another attempt. Once `max_attempts` consecutive attempts have been
    /// cancelled, returns [`Error::RetriesExhausted`].
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CallOutcome<T>>>,
    {
        let _flight = self.flight.lock().await;

        for attempt in 1..=self.config.max_attempts {
            match call().await? {
                CallOutcome::Completed(result) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "job accepted after retries");
                    }
                    return Ok(result);
                }
                CallOutcome::Cancelled => {
                    if attempt == self.config.max_attempts {
                        break;
                    }
                    let delay = self.jitter_delay();
                    debug!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "job cancelled, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(
            attempts = self.config.max_attempts,
            "job cancelled on every attempt, giving up"
        );
        Err(Error::RetriesExhausted {
            attempts: self.config.max_attempts,
        })
    }

    /// Delay drawn uniformly from `[min_delay, max_delay]` inclusive.
    ///
    /// Uses the thread-local OS-seeded generator, so retry timing stays
    /// uncorrelated across processes hammering the same service.
    fn jitter_delay(&self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}
