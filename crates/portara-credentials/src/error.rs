// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for portara-credentials.

use thiserror::Error;

/// Credential cache errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No credential is cached for the subject.
    #[error("No cached credential for subject: {0}")]
    NotFound(String),

    /// The refresh token has expired; the subject must re-authenticate.
    #[error("Refresh token expired for subject: {0}")]
    CredentialExpired(String),

    /// The external credential issuer reported a failure.
    #[error("Credential issuer error: {0}")]
    Issuer(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),
}

/// Result type using credential Error.
pub type Result<T> = std::result::Result<T, Error>;
