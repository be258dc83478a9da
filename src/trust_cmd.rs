//! `credence trust get|set`: manual trust-store overrides.

use anyhow::Result;

use crate::config::Config;
use crate::models::{BiasLevel, Reliability, TrustUpdate};
use crate::store::sqlite::SqliteStore;
use crate::store::TrustStore;

pub async fn run_trust_get(config: &Config, domain: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let domain = domain.trim().to_lowercase();
    match store.get_domain(&domain).await? {
        Some(rec) => {
            println!("Domain:       {}", rec.domain);
            println!("Trust score:  {:.2}", rec.trust_score);
            println!("Category:     {}", rec.category);
            println!("Bias level:   {}", rec.bias_level.as_str());
            println!("Reliability:  {}", rec.reliability.as_str());
            println!("Active:       {}", rec.is_active);
            println!("Updated:      {}", rec.updated_at.format("%Y-%m-%dT%H:%M:%SZ"));
            if !rec.notes.is_empty() {
                println!("Notes:        {}", rec.notes);
            }
        }
        None => println!("No trust entry for {}", domain),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn run_trust_set(
    config: &Config,
    domain: &str,
    score: f64,
    category: Option<String>,
    bias: Option<String>,
    reliability: Option<String>,
    notes: Option<String>,
    inactive: bool,
) -> Result<()> {
    if !(0.0..=1.0).contains(&score) {
        anyhow::bail!("trust score must be in [0.0, 1.0], got {}", score);
    }

    let mut update = TrustUpdate::new(domain, score)
        .category(category.as_deref().unwrap_or(""))
        .bias_level(BiasLevel::parse_lenient(bias.as_deref().unwrap_or("")))
        .reliability(Reliability::parse_lenient(reliability.as_deref().unwrap_or("")));
    if let Some(notes) = notes {
        update = update.notes(notes);
    }
    if update.domain.is_empty() {
        anyhow::bail!("domain must not be empty");
    }

    let store = SqliteStore::open(config).await?;
    store.upsert(&update).await?;
    store.set_active(&update.domain, !inactive).await?;
    println!("Trust entry saved: {} = {:.2}", update.domain, update.trust_score);
    Ok(())
}
