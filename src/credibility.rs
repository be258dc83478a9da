//! Source-credibility heuristic: domain prior, author presence, recency.

use chrono::{NaiveDate, Utc};

use crate::config::DomainsConfig;
use crate::models::PageMetadata;
use crate::traits::SourceEvaluator;

const AUTHOR_BONUS: f64 = 0.15;
const NO_AUTHOR_PENALTY: f64 = 0.1;
const NO_AUTHOR_PENALTY_TRUSTED: f64 = 0.05;
const OLD_PENALTY: f64 = 0.25;
const OLD_PENALTY_TRUSTED: f64 = 0.15;
const RECENT_BONUS: f64 = 0.15;
const NO_DATE_PENALTY: f64 = 0.05;
const NO_DATE_PENALTY_TRUSTED: f64 = 0.02;

const OLD_AFTER_DAYS: i64 = 365;
const RECENT_WITHIN_DAYS: i64 = 30;

pub struct HeuristicEvaluator {
    domains: DomainsConfig,
}

impl HeuristicEvaluator {
    pub fn new(domains: DomainsConfig) -> Self {
        Self { domains }
    }

    pub fn evaluate_on(&self, metadata: &PageMetadata, today: NaiveDate) -> f64 {
        let domain = metadata.domain.to_lowercase();
        let trusted = self.domains.is_trusted(&domain);

        let mut score = self
            .domains
            .untrusted
            .get(&domain)
            .or_else(|| self.domains.trusted.get(&domain))
            .copied()
            .unwrap_or(self.domains.default_score);

        let has_author = metadata
            .author
            .as_deref()
            .map(str::trim)
            .is_some_and(|a| !a.is_empty() && !a.eq_ignore_ascii_case("none"));
        if has_author {
            score += AUTHOR_BONUS;
        } else if trusted {
            score -= NO_AUTHOR_PENALTY_TRUSTED;
        } else {
            score -= NO_AUTHOR_PENALTY;
        }

        match metadata.publication_date.as_deref() {
            Some(raw) => {
                // Unparseable dates are neither rewarded nor penalized.
                if let Ok(published) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                    let days_old = (today - published).num_days();
                    if days_old > OLD_AFTER_DAYS {
                        score -= if trusted { OLD_PENALTY_TRUSTED } else { OLD_PENALTY };
                    } else if days_old < RECENT_WITHIN_DAYS {
                        score += RECENT_BONUS;
                    }
                }
            }
            None if trusted => score -= NO_DATE_PENALTY_TRUSTED,
            None => score -= NO_DATE_PENALTY,
        }

        if score.is_nan() {
            return 0.0;
        }
        score.clamp(0.0, 1.0)
    }
}

impl SourceEvaluator for HeuristicEvaluator {
    fn evaluate(&self, metadata: &PageMetadata) -> f64 {
        self.evaluate_on(metadata, Utc::now().date_naive())
    }
}
