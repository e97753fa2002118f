// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-key cleanup polling.
//!
//! Tracks zero-or-one active periodic poll per resource key. A schedule
//! waits out an initial delay, polls once immediately, then polls at a
//! fixed interval until the callback reports the resource gone (`Ok(true)`)
//! or fails. Both outcomes remove the schedule: a broken resource is never
//! polled forever.
//!
//! Cancellation is cooperative. `cancel` removes the map entry and signals
//! the polling task, but a poll that is already executing runs to
//! completion; the signal takes effect at the next suspension point.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

/// Type alias for the poll callback supplied per scheduled key.
///
/// Invoked repeatedly until it returns `Ok(true)` (resource confirmed gone,
/// stop polling) or an error (resource broken, stop polling). Callbacks must
/// be safe to call repeatedly: the schedule may outlive the condition that
/// created it by one interval.
pub type PollFn =
    Box<dyn FnMut() -> Pin<Box<dyn Future<Output = Result<bool>> + Send>> + Send>;

/// Standard delays for cleanup schedules.
///
/// `start` takes explicit durations; this struct carries the portal-wide
/// defaults the outer layers normally pass through.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay before the first poll of a newly registered key.
    pub initial_delay: Duration,
    /// Interval between polls once the schedule is running.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    /// Load the schedule delays from environment variables.
    ///
    /// Reads `PORTARA_CLEANUP_INITIAL_DELAY_SECS` and
    /// `PORTARA_CLEANUP_POLL_INTERVAL_SECS`, keeping the defaults for unset
    /// variables.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();

        let initial_delay: u64 = std::env::var("PORTARA_CLEANUP_INITIAL_DELAY_SECS")
            .unwrap_or_else(|_| defaults.initial_delay.as_secs().to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_CLEANUP_INITIAL_DELAY_SECS"))?;

        let poll_interval: u64 = std::env::var("PORTARA_CLEANUP_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| defaults.poll_interval.as_secs().to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_CLEANUP_POLL_INTERVAL_SECS"))?;

        Ok(Self {
            initial_delay: Duration::from_secs(initial_delay),
            poll_interval: Duration::from_secs(poll_interval),
        })
    }
}

/// One active schedule.
///
/// The generation distinguishes this registration from a later one for the
/// same key, so a finishing task never removes a successor's entry.
struct ScheduleEntry {
    generation: u64,
    cancel: Arc<Notify>,
}

/// Tracks active cleanup schedules by resource key.
///
/// At most one schedule exists per key at any time; re-registering an active
/// key is a logged no-op. All polling runs on the ambient Tokio runtime, one
/// task per key, so polls for a single key are strictly sequential while
/// different keys proceed independently.
pub struct KeyedScheduler {
    entries: Arc<DashMap<String, ScheduleEntry>>,
    generation: AtomicU64,
}

impl KeyedScheduler {
    /// Create a scheduler with no active schedules.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Register a periodic poll for `key`.
    ///
    /// If the key already has an active schedule this is a no-op. Otherwise
    /// the entry is recorded immediately (so `cancel` always has a handle to
    /// act on) and a task is spawned that sleeps `initial_delay`, polls once
    /// right away, then polls every `interval` until `poll` returns
    /// `Ok(true)` or an error. Either outcome removes the schedule.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &self,
        key: impl Into<String>,
        initial_delay: Duration,
        interval: Duration,
        mut poll: PollFn,
    ) {
        let key = key.into();
        let cancel = Arc::new(Notify::new());
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(key = %key, "schedule already active, ignoring registration");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(ScheduleEntry {
                    generation,
                    cancel: cancel.clone(),
                });
            }
        }

        info!(
            key = %key,
            initial_delay_secs = initial_delay.as_secs(),
            interval_secs = interval.as_secs(),
            "registered cleanup schedule"
        );

        let entries = self.entries.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.notified() => {
                    debug!(key = %key, "schedule cancelled before first poll");
                    return;
                }

                _ = tokio::time::sleep(initial_delay) => {}
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately, so success is detected
            // without waiting a full interval.
            ticker.tick().await;

            loop {
                match poll().await {
                    Ok(true) => {
                        info!(key = %key, "resource confirmed gone, removing schedule");
                        entries.remove_if(&key, |_, entry| entry.generation == generation);
                        break;
                    }
                    Ok(false) => {
                        debug!(key = %key, "resource still present");
                    }
                    Err(error) => {
                        warn!(key = %key, error = %error, "poll failed, removing schedule");
                        entries.remove_if(&key, |_, entry| entry.generation == generation);
                        break;
                    }
                }

                tokio::select! {
                    biased;

                    _ = cancel.notified() => {
                        debug!(key = %key, "schedule cancelled");
                        break;
                    }

                    _ = ticker.tick() => {}
                }
            }
        });
    }

    /// Cancel the schedule for `key` if one is active.
    ///
    /// A poll already executing is not interrupted; the task observes the
    /// cancellation at its next suspension point and exits.
    pub fn cancel(&self, key: &str) {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                entry.cancel.notify_one();
                info!(key = %key, "cancelled cleanup schedule");
            }
            None => {
                debug!(key = %key, "cancel requested for inactive key");
            }
        }
    }

    /// Cancel every active schedule. Used on shutdown.
    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    /// Whether `key` currently has an active schedule.
    pub fn is_active(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of active schedules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no schedules are active.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KeyedScheduler {
    fn default() -> Self {
        Self::new()
    }
}
