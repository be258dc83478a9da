//! Cache housekeeping, run outside the pipeline (`credence cache sweep`).

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::store::{ResultCache, SweepReport};

/// Moves cache rows between freshness states as of `now`.
pub async fn sweep(cache: &dyn ResultCache, now: DateTime<Utc>) -> Result<SweepReport> {
    let report = cache.sweep(now).await?;
    info!(
        marked_stale = report.marked_stale,
        marked_expired = report.marked_expired,
        "cache sweep complete"
    );
    Ok(report)
}
