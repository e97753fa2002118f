// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cached credential snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential issued for one subject.
///
/// Records are immutable once cached: the cache hands out owned clones and
/// replaces records wholesale on refresh, so a snapshot held by one request
/// can never be mutated underneath it by another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Subject the credential was issued for (the cache key).
    pub subject: String,
    /// Access token presented to the external service.
    pub access_token: String,
    /// Refresh token used to obtain a replacement access token.
    pub refresh_token: String,
    /// Instant the access token stops being accepted.
    pub access_expires_at: DateTime<Utc>,
    /// Instant the refresh token stops being accepted.
    pub refresh_expires_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Whether the access token is still accepted at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.access_expires_at
    }

    /// Whether the access token is still accepted.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whether the refresh token has expired at `now`.
    pub fn is_refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    /// Whether the refresh token has expired.
    pub fn is_refresh_expired(&self) -> bool {
        self.is_refresh_expired_at(Utc::now())
    }
}
