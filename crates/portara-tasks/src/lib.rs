// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Portara background task management.
//!
//! The API portal triggers asynchronous work against external services and
//! must never leak it: every background activity is tracked, deduplicated,
//! bounded, and torn down when it is no longer needed. This crate provides
//! the two building blocks the request-handling layers compose:
//!
//! - [`KeyedScheduler`]: zero-or-one active periodic poll per resource key.
//!   Used for cleanup polls that watch an external resource (e.g. a storage
//!   bucket scheduled for teardown) until it is confirmed gone. Schedules
//!   start delayed, poll at a fixed interval, and cancel themselves on
//!   success or on the first unrecoverable poll error.
//! - [`RetryExecutor`]: a single-flight wrapper around one stateful external
//!   job trigger. A transient "cancelled, try again" signal is retried up to
//!   a configured number of attempts with a randomized delay between them;
//!   anything else is terminal on first occurrence.
//!
//! The two components are independent; both are plain libraries driven by an
//! ambient Tokio runtime and report through `tracing`.
//!
//! # Non-goals
//!
//! Schedules and retries live in process memory only. Nothing survives a
//! restart, and no coordination happens across instances: external effects
//! must stay safe under repeated polling.
//!
//! # Modules
//!
//! - [`error`]: Error types for task management.
//! - [`scheduler`]: Per-key cleanup polling.
//! - [`retry`]: Bounded, jittered retries around an external job trigger.

#![deny(missing_docs)]

/// Error types for task management.
pub mod error;

/// Bounded, jittered retries around an external job trigger.
pub mod retry;

/// Per-key cleanup polling.
pub mod scheduler;

pub use error::{ConfigError, Error, Result};
pub use retry::{CallOutcome, RetryConfig, RetryExecutor};
pub use scheduler::{KeyedScheduler, PollFn, SchedulerConfig};
