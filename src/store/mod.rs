//! Durable stores consulted and written by the pipeline.
//!
//! Two keyed tables sit behind two traits:
//!
//! | Trait | Key | Purpose |
//! |-------|-----|---------|
//! | [`TrustStore`] | lower-cased domain | authoritative per-domain trust score (shortcut path) |
//! | [`ResultCache`] | exact original URL | full verification record with freshness state |
//!
//! Backends: [`memory::InMemoryStore`] for tests and ephemeral runs, and
//! [`sqlite::SqliteStore`] for durable storage. Both implement both traits.
//!
//! Writes to one cache key are serialized; writes to distinct keys are not.
//! Implementations must be `Send + Sync` to be shared across requests.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{expiry, CacheStatus, DomainTrustRecord, TrustUpdate, VerificationRecord};

/// Domain → trust score overrides.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Active trust score for an exact domain match. No subdomain matching.
    async fn lookup(&self, domain: &str) -> Result<Option<f64>>;

    /// Full row for a domain, active or not.
    async fn get_domain(&self, domain: &str) -> Result<Option<DomainTrustRecord>>;

    /// Insert or update. Last write wins; `updated_at` and `last_checked_at`
    /// are always refreshed, `created_at` and `is_active` are kept on update.
    async fn upsert(&self, update: &TrustUpdate) -> Result<()>;
}

/// URL → verification record cache.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Exact-URL lookup. Only `fresh` and `stale` rows are hits; a hit bumps
    /// `access_count`, stamps `last_accessed_at`, and resets the status to
    /// `fresh`, atomically with the read. The returned record reflects the bump.
    async fn get(&self, url: &str) -> Result<Option<VerificationRecord>>;

    /// Reads a row without touching its access accounting or status.
    async fn peek(&self, url: &str) -> Result<Option<VerificationRecord>>;

    /// Insert or update keyed by `record.url`.
    ///
    /// A new row keeps the record's `access_count`; an existing row has every
    /// content field overwritten, keeps `first_verified_at`, and continues its
    /// running `access_count` plus one. `expires_at` becomes now + retention.
    async fn put(&self, record: &VerificationRecord, processing_time: f64) -> Result<()>;

    /// Housekeeping transition, never called by the pipeline itself: rows past
    /// `expires_at` become `stale`, rows more than one further retention
    /// window past it become `expired`. Rows are never deleted.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport>;
}

/// Counts of rows moved by [`ResultCache::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub marked_stale: u64,
    pub marked_expired: u64,
}

/// Target status for a row at `now`, or `None` when it should not move.
pub(crate) fn sweep_transition(
    status: CacheStatus,
    expires_at: DateTime<Utc>,
    retention: chrono::Duration,
    now: DateTime<Utc>,
) -> Option<CacheStatus> {
    if status != CacheStatus::Expired && now > expiry(expires_at, retention) {
        Some(CacheStatus::Expired)
    } else if status == CacheStatus::Fresh && now > expires_at {
        Some(CacheStatus::Stale)
    } else {
        None
    }
}

/// Applies the insert-or-update rules of [`ResultCache::put`] to an optional
/// existing row. Shared by the backends so both honor the same semantics.
pub(crate) fn merge_put(
    existing: Option<&VerificationRecord>,
    record: &VerificationRecord,
    processing_time: f64,
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> VerificationRecord {
    let mut merged = record.clone();
    merged.url_hash = crate::models::url_hash(&record.url);
    merged.processing_time_seconds = processing_time;
    merged.last_accessed_at = now;
    merged.expires_at = expiry(now, retention);
    merged.cache_status = CacheStatus::Fresh;

    match existing {
        Some(prev) => {
            merged.first_verified_at = prev.first_verified_at;
            merged.access_count = prev.access_count + 1;
        }
        None => {
            merged.first_verified_at = now;
        }
    }
    merged
}
