// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Expiry extraction from structured bearer tokens.

use base64::Engine as _;
use base64::engine::general_purpose;
use chrono::{DateTime, Utc};

/// Extract the `exp` claim (epoch seconds) from a JWT-style token.
///
/// Returns `None` for any malformed input: wrong segment count, bad
/// encoding, invalid JSON, or a missing or non-integer claim. Opaque tokens
/// are expected here; callers fall back to the issuer-declared lifetime
/// instead of treating this as a failure.
pub(crate) fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = general_purpose::URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}
