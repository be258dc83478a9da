//! Core data models.
//!
//! These types flow between the collaborators, the scoring engine, the
//! orchestrator, and the two durable stores. Records always carry every
//! field; absent data is an empty string, empty collection, or zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// SHA-256 hex digest of a URL, stored alongside cache rows.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lower-cased host of a URL, or an empty string when it has none.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// `now + retention`, saturating at the latest representable instant.
pub fn expiry(now: DateTime<Utc>, retention: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(retention)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ═══════════════════════════════════════════════════════════════════════
// Trust store
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl BiasLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiasLevel::Low => "low",
            BiasLevel::Medium => "medium",
            BiasLevel::High => "high",
            BiasLevel::Unknown => "unknown",
        }
    }

    /// Unrecognized values coerce to `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => BiasLevel::Low,
            "medium" => BiasLevel::Medium,
            "high" => BiasLevel::High,
            _ => BiasLevel::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
    Unknown,
}

impl Reliability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reliability::VeryHigh => "very_high",
            Reliability::High => "high",
            Reliability::Medium => "medium",
            Reliability::Low => "low",
            Reliability::VeryLow => "very_low",
            Reliability::Unknown => "unknown",
        }
    }

    /// Unrecognized values coerce to `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "very_high" => Reliability::VeryHigh,
            "high" => Reliability::High,
            "medium" => Reliability::Medium,
            "low" => Reliability::Low,
            "very_low" => Reliability::VeryLow,
            _ => Reliability::Unknown,
        }
    }
}

/// Values written by a trust-store upsert.
#[derive(Debug, Clone)]
pub struct TrustUpdate {
    pub domain: String,
    pub trust_score: f64,
    pub category: String,
    pub bias_level: BiasLevel,
    pub reliability: Reliability,
    pub notes: String,
}

impl TrustUpdate {
    /// Normalizes the key and fills the defaults for blank metadata.
    pub fn new(domain: &str, trust_score: f64) -> Self {
        Self {
            domain: domain.trim().to_lowercase(),
            trust_score: trust_score.clamp(0.0, 1.0),
            category: "general".to_string(),
            bias_level: BiasLevel::Unknown,
            reliability: Reliability::Unknown,
            notes: String::new(),
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        let category = category.trim();
        self.category = if category.is_empty() {
            "general".to_string()
        } else {
            category.to_string()
        };
        self
    }

    pub fn bias_level(mut self, bias_level: BiasLevel) -> Self {
        self.bias_level = bias_level;
        self
    }

    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// One row of the domain trust table.
#[derive(Debug, Clone, Serialize)]
pub struct DomainTrustRecord {
    pub domain: String,
    pub trust_score: f64,
    pub category: String,
    pub bias_level: BiasLevel,
    pub reliability: Reliability,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub is_active: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Scoring values
// ═══════════════════════════════════════════════════════════════════════

/// The three weighted inputs of the final confidence score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub source_credibility: f64,
    pub content_consistency: f64,
    pub verification_coverage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    None,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Threshold classification of a clamped score.
    pub fn classify(score: f64) -> Self {
        if score >= 0.75 {
            ConfidenceLevel::High
        } else if score >= 0.3 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::None => "NONE",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }

    /// Human-readable line, e.g. `Confidence Level: HIGH (82.00%)`.
    pub fn explain(&self, score: f64) -> String {
        format!("Confidence Level: {} ({:.2}%)", self.as_str(), score * 100.0)
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(ConfidenceLevel::None),
            "LOW" => Ok(ConfidenceLevel::Low),
            "MEDIUM" => Ok(ConfidenceLevel::Medium),
            "HIGH" => Ok(ConfidenceLevel::High),
            other => Err(format!("unknown confidence level: {}", other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Collaborator outputs
// ═══════════════════════════════════════════════════════════════════════

/// Page metadata scraped during cleaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub domain: String,
    pub title: Option<String>,
    pub author: Option<String>,
    /// `YYYY-MM-DD` when a date could be parsed.
    pub publication_date: Option<String>,
    pub description: Option<String>,
}

/// Transport-level facts about the fetched response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportMetadata {
    pub content_length: i64,
    pub content_type: String,
    pub status_code: u16,
    pub final_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanStats {
    pub original_size: usize,
    pub cleaned_size: usize,
    pub reduction_percent: f64,
    pub content_found: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub tokens_used: i64,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Verified,
    Disputed,
}

/// One itemized fact-check from the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheck {
    pub claim: String,
    pub status: ClaimStatus,
}

/// Outcome of the fuzzy credibility classifier for one judgement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assessment {
    Positive,
    Negative,
    #[default]
    Unassessed,
}

impl Assessment {
    /// "not credible"/"unreliable" wins over "credible" for domain and author
    /// alike; checking "credible" first would reward "not credible" authors.
    pub fn classify(judgement: &str) -> Self {
        let text = judgement.to_lowercase();
        if text.contains("not credible") || text.contains("unreliable") {
            Assessment::Negative
        } else if text.contains("credible") {
            Assessment::Positive
        } else {
            Assessment::Unassessed
        }
    }
}

/// Typed domain and author judgements consumed by the scoring engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredibilitySignals {
    pub domain: Assessment,
    pub author: Assessment,
}

/// Structured output of the credibility-analysis collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub full_analysis: String,
    pub credibility_assessment: String,
    pub sources: BTreeSet<String>,
    /// Assessment kind (`domain_credibility`, `author_credibility`,
    /// `date_relevance`) to free-text judgement.
    pub metadata_assessment: BTreeMap<String, String>,
    pub fact_verification: Vec<FactCheck>,
    pub signals: CredibilitySignals,
}

// ═══════════════════════════════════════════════════════════════════════
// Result cache
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Fresh,
    Stale,
    Expired,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::Expired => "expired",
        }
    }

    /// Fresh and stale rows count as hits; expired rows do not.
    pub fn is_hit_eligible(&self) -> bool {
        !matches!(self, CacheStatus::Expired)
    }
}

impl FromStr for CacheStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fresh" => Ok(CacheStatus::Fresh),
            "stale" => Ok(CacheStatus::Stale),
            "expired" => Ok(CacheStatus::Expired),
            other => Err(format!("unknown cache status: {}", other)),
        }
    }
}

/// Full verification result, keyed by the exact original URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub url: String,
    pub url_hash: String,
    pub domain: String,
    pub title: String,
    pub author: String,
    pub publication_date: String,
    pub content_type: String,
    pub content_length: i64,
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub confidence_explanation: String,
    pub score_components: ScoreComponents,
    pub extracted_text: String,
    pub credibility_assessment: String,
    pub fact_verification_results: Vec<FactCheck>,
    pub sources_used: BTreeSet<String>,
    pub full_analysis: String,
    pub metadata_assessment: BTreeMap<String, String>,
    pub processing_time_seconds: f64,
    pub extraction_tokens_used: i64,
    pub analysis_calls_made: i64,
    pub extraction_model: String,
    pub first_verified_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: i64,
    pub expires_at: DateTime<Utc>,
    pub cache_status: CacheStatus,
}

impl VerificationRecord {
    /// An empty zero-confidence record for `url`, stamped at `now`.
    pub fn empty(url: &str, now: DateTime<Utc>, retention: chrono::Duration) -> Self {
        Self {
            url: url.to_string(),
            url_hash: url_hash(url),
            domain: domain_of(url),
            title: String::new(),
            author: String::new(),
            publication_date: String::new(),
            content_type: String::new(),
            content_length: 0,
            confidence_score: 0.0,
            confidence_level: ConfidenceLevel::None,
            confidence_explanation: ConfidenceLevel::None.explain(0.0),
            score_components: ScoreComponents::default(),
            extracted_text: String::new(),
            credibility_assessment: String::new(),
            fact_verification_results: Vec::new(),
            sources_used: BTreeSet::new(),
            full_analysis: String::new(),
            metadata_assessment: BTreeMap::new(),
            processing_time_seconds: 0.0,
            extraction_tokens_used: 0,
            analysis_calls_made: 0,
            extraction_model: String::new(),
            first_verified_at: now,
            last_accessed_at: now,
            access_count: 0,
            expires_at: expiry(now, retention),
            cache_status: CacheStatus::Fresh,
        }
    }
}

/// Summary line kept in the in-process run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}
