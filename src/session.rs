//! Process-scoped run history and last results.
//!
//! One [`Session`] is built per process and handed to the
//! [`Verifier`](crate::pipeline::Verifier). It is never touched by the
//! durable stores; clearing it does not affect them.
//!
//! Both the history ring and the per-URL results hold at most
//! `HISTORY_CAPACITY` entries; the least recently remembered URL is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::models::{HistoryEntry, VerificationRecord};

pub const DEFAULT_HISTORY_LIMIT: usize = 5;
const HISTORY_CAPACITY: usize = 100;

#[derive(Default)]
pub struct Session {
    history: Mutex<VecDeque<HistoryEntry>>,
    results: Mutex<Results>,
}

/// Last result per URL, with URLs ordered oldest first.
#[derive(Default)]
struct Results {
    by_url: HashMap<String, VerificationRecord>,
    order: VecDeque<String>,
}

impl Results {
    fn insert(&mut self, record: VerificationRecord) {
        if self.by_url.contains_key(&record.url) {
            self.order.retain(|u| u != &record.url);
        } else if self.by_url.len() >= HISTORY_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.by_url.remove(&oldest);
            }
        }
        self.order.push_back(record.url.clone());
        self.by_url.insert(record.url.clone(), record);
    }

    fn clear(&mut self) {
        self.by_url.clear();
        self.order.clear();
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self, entry: HistoryEntry) {
        if let Ok(mut history) = self.history.lock() {
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(entry);
        }
    }

    pub fn remember(&self, record: VerificationRecord) {
        if let Ok(mut results) = self.results.lock() {
            results.insert(record);
        }
    }

    pub fn result(&self, url: &str) -> Option<VerificationRecord> {
        self.results.lock().ok()?.by_url.get(url).cloned()
    }

    /// The most recent `n` runs, oldest first.
    pub fn history(&self, n: usize) -> Vec<HistoryEntry> {
        match self.history.lock() {
            Ok(history) => {
                let skip = history.len().saturating_sub(n);
                history.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn reset(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
        if let Ok(mut results) = self.results.lock() {
            results.clear();
        }
    }
}
