// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for portara-tasks.

use thiserror::Error;

/// Task management errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An external resource or job reported an unrecoverable failure.
    ///
    /// Poll callbacks return this to tear their schedule down; job triggers
    /// return it to stop the retry loop on the spot.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Every permitted attempt was rejected with the transient cancel signal.
    #[error("Job still cancelled after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts performed before giving up.
        attempts: u32,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),
}

/// Result type using task Error.
pub type Result<T> = std::result::Result<T, Error>;
