// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! TTL credential cache with explicit refresh.
//!
//! One record per subject. `get` only ever returns records whose access
//! token is still valid; `refresh` replaces a record through the issuer's
//! refresh token; `invalidate` drops a record unconditionally. On top of the
//! per-record expiries the cache applies a coarse write TTL and a maximum
//! entry count. Both are approximations: a record can be evicted before its
//! token actually expires or linger briefly past it, so callers must treat
//! cache presence as a hint and validity as the contract.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::claims;
use crate::error::{ConfigError, Error, Result};
use crate::record::CredentialRecord;

/// Configuration for the credential cache.
#[derive(Debug, Clone)]
pub struct CredentialCacheConfig {
    /// Maximum number of cached subjects.
    pub max_entries: usize,
    /// Coarse time-to-live since an entry was written, independent of the
    /// record's own expiries.
    pub write_ttl: Duration,
}

impl Default for CredentialCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            write_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl CredentialCacheConfig {
    /// Load cache limits from environment variables.
    ///
    /// Reads `PORTARA_CREDENTIAL_CACHE_MAX_ENTRIES` and
    /// `PORTARA_CREDENTIAL_CACHE_TTL_SECS`, keeping the defaults for unset
    /// variables.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_entries: usize = std::env::var("PORTARA_CREDENTIAL_CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| defaults.max_entries.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_CREDENTIAL_CACHE_MAX_ENTRIES"))?;

        let write_ttl: u64 = std::env::var("PORTARA_CREDENTIAL_CACHE_TTL_SECS")
            .unwrap_or_else(|_| defaults.write_ttl.as_secs().to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORTARA_CREDENTIAL_CACHE_TTL_SECS"))?;

        Ok(Self {
            max_entries,
            write_ttl: Duration::from_secs(write_ttl),
        })
    }
}

/// A credential returned by the external issuer on refresh.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// Replacement access token.
    pub access_token: String,
    /// Replacement refresh token.
    pub refresh_token: String,
    /// Issuer-declared access token lifetime in seconds, used when the
    /// token itself carries no readable expiry claim.
    pub lifetime_secs: i64,
}

struct CacheEntry {
    record: CredentialRecord,
    inserted_at: DateTime<Utc>,
}

/// Cache of one credential record per subject.
pub struct CredentialCache {
    entries: DashMap<String, CacheEntry>,
    config: CredentialCacheConfig,
    write_ttl: chrono::Duration,
}

impl CredentialCache {
    /// Create a cache with the given limits.
    pub fn new(config: CredentialCacheConfig) -> Self {
        let write_ttl =
            chrono::Duration::from_std(config.write_ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            entries: DashMap::new(),
            config,
            write_ttl,
        }
    }

    /// Cache limits this cache was built with.
    pub fn config(&self) -> &CredentialCacheConfig {
        &self.config
    }

    /// Look up a still-valid credential for `subject`.
    ///
    /// An entry past the cache write TTL is evicted and reported as a miss.
    /// A record whose access token has expired is also a miss, but stays in
    /// place so [`refresh`](Self::refresh) can still use its refresh token.
    pub fn get(&self, subject: &str) -> Option<CredentialRecord> {
        let now = Utc::now();
        let mut past_write_ttl = false;

        let result = {
            let entry = self.entries.get(subject)?;
            if now - entry.inserted_at >= self.write_ttl {
                past_write_ttl = true;
                None
            } else if entry.record.is_valid_at(now) {
                Some(entry.record.clone())
            } else {
                debug!(subject = %subject, "cached access token expired");
                None
            }
        };

        if past_write_ttl {
            // Re-checked under the removal lock so a concurrent rewrite of
            // the entry is not dropped.
            self.entries
                .remove_if(subject, |_, entry| Utc::now() - entry.inserted_at >= self.write_ttl);
            debug!(subject = %subject, "evicted entry past cache write TTL");
        }

        result
    }

    /// Insert or replace the record for its subject.
    ///
    /// Records whose access token is already expired are rejected and
    /// `false` is returned; an expired record must never sit in the cache
    /// looking valid. At capacity, write-TTL-expired entries are purged
    /// first and the oldest write is evicted if that was not enough.
    pub fn put(&self, record: CredentialRecord) -> bool {
        let now = Utc::now();
        if !record.is_valid_at(now) {
            warn!(subject = %record.subject, "refusing to cache expired credential");
            return false;
        }

        if !self.entries.contains_key(&record.subject)
            && self.entries.len() >= self.config.max_entries
        {
            self.evict_for_capacity(now);
        }

        debug!(
            subject = %record.subject,
            access_expires_at = %record.access_expires_at,
            "cached credential"
        );
        self.entries.insert(
            record.subject.clone(),
            CacheEntry {
                record,
                inserted_at: now,
            },
        );
        true
    }

    /// Remove the record for `subject` unconditionally.
    pub fn invalidate(&self, subject: &str) {
        if self.entries.remove(subject).is_some() {
            info!(subject = %subject, "invalidated cached credential");
        }
    }

    /// Replace the cached credential for `subject` through its refresh token.
    ///
    /// The lookup ignores access-token validity: an access-expired record
    /// with a live refresh token is still refreshable. Fails with
    /// [`Error::NotFound`] when nothing is cached for `subject`, and with
    /// [`Error::CredentialExpired`] when the refresh token itself has
    /// expired. The stale record is left in place in both cases, so callers
    /// can tell "never seen" from "needs re-authentication".
    ///
    /// The new access expiry is taken from the issued token's `exp` claim
    /// when one decodes, and falls back to `now + lifetime_secs` otherwise;
    /// the new refresh expiry likewise, falling back to the previous
    /// record's refresh expiry. The cached record is replaced wholesale;
    /// concurrent refreshes for one subject are last-writer-wins.
    pub async fn refresh<F, Fut>(&self, subject: &str, refresh_fn: F) -> Result<CredentialRecord>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<IssuedCredential>>,
    {
        let now = Utc::now();
        // Clone the record out; holding a map guard across the issuer call
        // would stall every other subject in the same shard.
        let existing = self
            .entries
            .get(subject)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| Error::NotFound(subject.to_string()))?;

        if existing.is_refresh_expired_at(now) {
            warn!(subject = %subject, "refresh token expired, re-authentication required");
            return Err(Error::CredentialExpired(subject.to_string()));
        }

        let issued = refresh_fn(existing.refresh_token.clone()).await?;

        let now = Utc::now();
        let access_expires_at = claims::decode_expiry(&issued.access_token)
            .unwrap_or_else(|| now + chrono::Duration::seconds(issued.lifetime_secs));
        let refresh_expires_at = claims::decode_expiry(&issued.refresh_token)
            .unwrap_or(existing.refresh_expires_at);

        let record = CredentialRecord {
            subject: subject.to_string(),
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            access_expires_at,
            refresh_expires_at,
        };

        self.entries.insert(
            subject.to_string(),
            CacheEntry {
                record: record.clone(),
                inserted_at: now,
            },
        );
        info!(
            subject = %subject,
            access_expires_at = %record.access_expires_at,
            "refreshed credential"
        );
        Ok(record)
    }

    /// Remove entries older than the cache-wide write TTL.
    ///
    /// `get` evicts lazily; this sweep is for callers that want to bound
    /// memory without waiting for reads. Returns the number of entries
    /// removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Number of cached subjects, including not-yet-evicted stale entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now - entry.inserted_at < self.write_ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed = removed, "purged entries past cache write TTL");
        }
        removed
    }

    fn evict_for_capacity(&self, now: DateTime<Utc>) {
        if self.purge_expired_at(now) > 0 && self.entries.len() < self.config.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(subject) = oldest {
            debug!(subject = %subject, "evicting oldest entry for capacity");
            self.entries.remove(&subject);
        }
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(CredentialCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CredentialCacheConfig::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.write_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = CredentialCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert!(cache.get("anyone").is_none());
    }
}
