//! TOML configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! [`load_config`] parses and validates; [`Config::minimal`] builds the same
//! defaults in code for tests and for commands that run without a file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Default configuration with no file behind it.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            domains: DomainsConfig::default(),
            scoring: ScoringConfig::default(),
            fetch: FetchConfig::default(),
            extraction: ExtractionConfig::default(),
            analysis: AnalysisConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/credence.sqlite"),
        }
    }
}

/// Prior domain reputations used by the source-credibility heuristic.
///
/// The keys of `trusted` double as the scoring engine's trusted allowlist.
#[derive(Debug, Deserialize, Clone)]
pub struct DomainsConfig {
    #[serde(default = "default_trusted_domains")]
    pub trusted: BTreeMap<String, f64>,
    #[serde(default = "default_untrusted_domains")]
    pub untrusted: BTreeMap<String, f64>,
    #[serde(default = "default_domain_score")]
    pub default_score: f64,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            trusted: default_trusted_domains(),
            untrusted: default_untrusted_domains(),
            default_score: default_domain_score(),
        }
    }
}

impl DomainsConfig {
    pub fn is_trusted(&self, domain: &str) -> bool {
        self.trusted.contains_key(domain)
    }
}

fn default_trusted_domains() -> BTreeMap<String, f64> {
    [
        ("nytimes.com", 0.98),
        ("bbc.com", 0.98),
        ("reuters.com", 0.95),
        ("washingtonpost.com", 0.95),
        ("theguardian.com", 0.95),
        ("apnews.com", 0.90),
        ("npr.org", 0.90),
        ("cnn.com", 0.85),
        ("aljazeera.com", 0.85),
    ]
    .into_iter()
    .map(|(d, s)| (d.to_string(), s))
    .collect()
}

fn default_untrusted_domains() -> BTreeMap<String, f64> {
    [
        ("example.com", 0.05),
        ("blogspot.com", 0.15),
        ("wordpress.com", 0.15),
        ("medium.com", 0.2),
        ("infowars.com", 0.05),
        ("breitbart.com", 0.1),
    ]
    .into_iter()
    .map(|(d, s)| (d.to_string(), s))
    .collect()
}

fn default_domain_score() -> f64 {
    0.35
}

/// Weight triple applied to the three sub-scores.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Weights {
    pub source_credibility: f64,
    pub content_consistency: f64,
    pub verification_coverage: f64,
}

/// Deltas added to the consistency and coverage weights for sensitive topics.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SensitiveAdjustments {
    pub content_consistency: f64,
    pub verification_coverage: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_trusted_weights")]
    pub trusted_weights: Weights,
    #[serde(default = "default_default_weights")]
    pub default_weights: Weights,
    #[serde(default = "default_sensitive_adjustments")]
    pub sensitive_adjustments: SensitiveAdjustments,
    #[serde(default = "default_sensitive_topics")]
    pub sensitive_topics: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            trusted_weights: default_trusted_weights(),
            default_weights: default_default_weights(),
            sensitive_adjustments: default_sensitive_adjustments(),
            sensitive_topics: default_sensitive_topics(),
        }
    }
}

fn default_trusted_weights() -> Weights {
    Weights {
        source_credibility: 0.4,
        content_consistency: 0.5,
        verification_coverage: 0.1,
    }
}
fn default_default_weights() -> Weights {
    Weights {
        source_credibility: 0.35,
        content_consistency: 0.45,
        verification_coverage: 0.2,
    }
}
fn default_sensitive_adjustments() -> SensitiveAdjustments {
    SensitiveAdjustments {
        content_consistency: 0.05,
        verification_coverage: -0.05,
    }
}
fn default_sensitive_topics() -> Vec<String> {
    [
        "politics", "health", "science", "election", "vaccine", "climate", "war", "conflict",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_validate_timeout")]
    pub validate_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            validate_timeout_secs: default_validate_timeout(),
            user_agent: default_user_agent(),
            max_content_length: default_max_content_length(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}
fn default_validate_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 credence".to_string()
}
fn default_max_content_length() -> usize {
    500_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default = "default_extraction_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_extraction_endpoint(),
            model: default_extraction_model(),
            max_tokens: default_extraction_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_ai_timeout(),
            api_key_env: default_openai_key_env(),
        }
    }
}

fn default_extraction_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_extraction_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_extraction_max_tokens() -> u32 {
    15_000
}
fn default_temperature() -> f64 {
    0.2
}
fn default_ai_timeout() -> u64 {
    60
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_analysis_model")]
    pub model: String,
    #[serde(default = "default_analysis_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_perplexity_key_env")]
    pub api_key_env: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            model: default_analysis_model(),
            max_tokens: default_analysis_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_ai_timeout(),
            api_key_env: default_perplexity_key_env(),
        }
    }
}

fn default_analysis_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}
fn default_analysis_model() -> String {
    "sonar".to_string()
}
fn default_analysis_max_tokens() -> u32 {
    2_000
}
fn default_perplexity_key_env() -> String {
    "PERPLEXITY_API_KEY".to_string()
}

/// About a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Write full pipeline results to the result cache during persistence.
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            auto_commit: default_auto_commit(),
        }
    }
}

impl CacheConfig {
    /// Retention window, clamped to the range `validate` accepts.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days.clamp(1, MAX_RETENTION_DAYS))
    }
}

fn default_retention_days() -> i64 {
    30
}
fn default_auto_commit() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks value ranges that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    for (name, w) in [
        ("scoring.trusted_weights", &config.scoring.trusted_weights),
        ("scoring.default_weights", &config.scoring.default_weights),
    ] {
        if ![w.source_credibility, w.content_consistency, w.verification_coverage]
            .iter()
            .all(|v| v.is_finite())
        {
            anyhow::bail!("{} must contain finite numbers", name);
        }
    }

    let adj = &config.scoring.sensitive_adjustments;
    if !adj.content_consistency.is_finite() || !adj.verification_coverage.is_finite() {
        anyhow::bail!("scoring.sensitive_adjustments must contain finite numbers");
    }

    for (domain, score) in config
        .domains
        .trusted
        .iter()
        .chain(config.domains.untrusted.iter())
    {
        if !(0.0..=1.0).contains(score) {
            anyhow::bail!("domain prior for '{}' must be in [0.0, 1.0]", domain);
        }
    }
    if !(0.0..=1.0).contains(&config.domains.default_score) {
        anyhow::bail!("domains.default_score must be in [0.0, 1.0]");
    }

    if config.fetch.timeout_secs == 0 || config.fetch.validate_timeout_secs == 0 {
        anyhow::bail!("fetch timeouts must be > 0");
    }
    if config.extraction.timeout_secs == 0 || config.analysis.timeout_secs == 0 {
        anyhow::bail!("extraction.timeout_secs and analysis.timeout_secs must be > 0");
    }
    for (name, t) in [
        ("extraction.temperature", config.extraction.temperature),
        ("analysis.temperature", config.analysis.temperature),
    ] {
        if !(0.0..=2.0).contains(&t) {
            anyhow::bail!("{} must be in [0.0, 2.0]", name);
        }
    }

    if !(1..=MAX_RETENTION_DAYS).contains(&config.cache.retention_days) {
        anyhow::bail!("cache.retention_days must be in [1, {}]", MAX_RETENTION_DAYS);
    }

    Ok(())
}
