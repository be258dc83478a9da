//! In-memory store for tests and ephemeral runs.
//!
//! Cache rows live in per-URL slots: the map lock is held only long enough
//! to find or create a slot, and each read-modify-write runs under that
//! slot's own mutex. Writers to different URLs never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CacheStatus, DomainTrustRecord, TrustUpdate, VerificationRecord};

use super::{merge_put, sweep_transition, ResultCache, SweepReport, TrustStore};

type Slot = Arc<Mutex<Option<VerificationRecord>>>;

pub struct InMemoryStore {
    domains: RwLock<HashMap<String, DomainTrustRecord>>,
    records: RwLock<HashMap<String, Slot>>,
    retention: chrono::Duration,
}

impl InMemoryStore {
    pub fn new(retention: chrono::Duration) -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Returns the slot for `url`, creating an empty one when `create` is set.
    fn slot(&self, url: &str, create: bool) -> Result<Option<Slot>> {
        {
            let records = self.records.read().map_err(|_| anyhow!("cache lock poisoned"))?;
            if let Some(slot) = records.get(url) {
                return Ok(Some(slot.clone()));
            }
        }
        if !create {
            return Ok(None);
        }
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(Some(records.entry(url.to_string()).or_default().clone()))
    }

    /// Marks a domain active or inactive. Returns false when it is unknown.
    pub fn set_active(&self, domain: &str, active: bool) -> Result<bool> {
        let mut domains = self
            .domains
            .write()
            .map_err(|_| anyhow!("trust lock poisoned"))?;
        Ok(match domains.get_mut(domain) {
            Some(rec) => {
                rec.is_active = active;
                true
            }
            None => false,
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(chrono::Duration::days(30))
    }
}

#[async_trait]
impl TrustStore for InMemoryStore {
    async fn lookup(&self, domain: &str) -> Result<Option<f64>> {
        let domains = self.domains.read().map_err(|_| anyhow!("trust lock poisoned"))?;
        Ok(domains
            .get(domain)
            .filter(|rec| rec.is_active)
            .map(|rec| rec.trust_score))
    }

    async fn get_domain(&self, domain: &str) -> Result<Option<DomainTrustRecord>> {
        let domains = self.domains.read().map_err(|_| anyhow!("trust lock poisoned"))?;
        Ok(domains.get(domain).cloned())
    }

    async fn upsert(&self, update: &TrustUpdate) -> Result<()> {
        let now = Utc::now();
        let mut domains = self
            .domains
            .write()
            .map_err(|_| anyhow!("trust lock poisoned"))?;
        let (created_at, is_active) = domains
            .get(&update.domain)
            .map(|rec| (rec.created_at, rec.is_active))
            .unwrap_or((now, true));
        domains.insert(
            update.domain.clone(),
            DomainTrustRecord {
                domain: update.domain.clone(),
                trust_score: update.trust_score,
                category: update.category.clone(),
                bias_level: update.bias_level,
                reliability: update.reliability,
                notes: update.notes.clone(),
                created_at,
                updated_at: now,
                last_checked_at: now,
                is_active,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ResultCache for InMemoryStore {
    async fn get(&self, url: &str) -> Result<Option<VerificationRecord>> {
        let Some(slot) = self.slot(url, false)? else {
            return Ok(None);
        };
        let mut guard = slot.lock().map_err(|_| anyhow!("cache slot poisoned"))?;
        match guard.as_mut() {
            Some(rec) if rec.cache_status.is_hit_eligible() => {
                rec.access_count += 1;
                rec.last_accessed_at = Utc::now();
                rec.cache_status = CacheStatus::Fresh;
                Ok(Some(rec.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn peek(&self, url: &str) -> Result<Option<VerificationRecord>> {
        let Some(slot) = self.slot(url, false)? else {
            return Ok(None);
        };
        let guard = slot.lock().map_err(|_| anyhow!("cache slot poisoned"))?;
        Ok(guard.clone())
    }

    async fn put(&self, record: &VerificationRecord, processing_time: f64) -> Result<()> {
        let slot = self
            .slot(&record.url, true)?
            .ok_or_else(|| anyhow!("cache slot missing for {}", record.url))?;
        let mut guard = slot.lock().map_err(|_| anyhow!("cache slot poisoned"))?;
        let merged = merge_put(
            guard.as_ref(),
            record,
            processing_time,
            Utc::now(),
            self.retention,
        );
        *guard = Some(merged);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let slots: Vec<Slot> = {
            let records = self.records.read().map_err(|_| anyhow!("cache lock poisoned"))?;
            records.values().cloned().collect()
        };

        let mut report = SweepReport::default();
        for slot in slots {
            let mut guard = slot.lock().map_err(|_| anyhow!("cache slot poisoned"))?;
            if let Some(rec) = guard.as_mut() {
                match sweep_transition(rec.cache_status, rec.expires_at, self.retention, now) {
                    Some(CacheStatus::Expired) => {
                        rec.cache_status = CacheStatus::Expired;
                        report.marked_expired += 1;
                    }
                    Some(status) => {
                        rec.cache_status = status;
                        report.marked_stale += 1;
                    }
                    None => {}
                }
            }
        }
        Ok(report)
    }
}
