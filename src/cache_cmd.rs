//! `credence cache get|sweep`.

use anyhow::Result;
use chrono::Utc;

use crate::config::Config;
use crate::housekeeping;
use crate::store::sqlite::SqliteStore;
use crate::store::ResultCache;

/// Prints a cached record without counting it as a hit.
pub async fn run_cache_get(config: &Config, url: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    match store.peek(url).await? {
        Some(rec) => println!("{}", serde_json::to_string_pretty(&rec)?),
        None => println!("No cache entry for {}", url),
    }
    Ok(())
}

pub async fn run_cache_sweep(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let report = housekeeping::sweep(&store, Utc::now()).await?;
    println!(
        "Sweep complete: {} marked stale, {} marked expired",
        report.marked_stale, report.marked_expired
    );
    Ok(())
}
