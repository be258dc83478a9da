//! Collaborator traits consumed by the verification pipeline.
//!
//! The orchestrator only sees these seams. Production adapters live in
//! [`crate::validator`], [`crate::fetcher`], [`crate::extractor`],
//! [`crate::analyzer`], and [`crate::credibility`]; tests drive the pipeline
//! with in-process fakes.
//!
//! ```text
//!   url ─▶ UrlValidator ─▶ PageFetcher::fetch ─▶ PageFetcher::clean
//!                                                      │
//!        SourceEvaluator ◀─ metadata ──────────────────┤
//!                                                      ▼
//!                 CredibilityAnalyzer ◀─ TextExtractor ◀┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::VerifyError;
use crate::models::{
    AnalysisResult, CleanStats, ExtractionMetadata, PageMetadata, TransportMetadata,
};

/// Outcome of a URL validity check. The message distinguishes malformed
/// URLs, disallowed schemes, and unreachable hosts.
#[derive(Debug, Clone)]
pub struct UrlCheck {
    pub valid: bool,
    pub message: String,
}

impl UrlCheck {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: "URL is valid and accessible".to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Raw response body plus transport facts.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub body: String,
    pub transport: TransportMetadata,
}

/// Readable page text with scraped metadata.
#[derive(Debug, Clone, Default)]
pub struct CleanedPage {
    pub content: String,
    pub stats: CleanStats,
    pub metadata: PageMetadata,
}

/// Structured text produced by the extraction service.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

#[async_trait]
pub trait UrlValidator: Send + Sync {
    async fn validate(&self, url: &str) -> UrlCheck;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    /// Pure transformation of a fetched body; never fails.
    fn clean(&self, raw: &str, url: &str) -> CleanedPage;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        cleaned: &str,
        metadata: &PageMetadata,
        api_key: &str,
    ) -> Result<Extraction>;
}

#[async_trait]
pub trait CredibilityAnalyzer: Send + Sync {
    async fn analyze(&self, extracted_text: &str, api_key: &str) -> Result<AnalysisResult>;
}

/// Independent source-credibility heuristic, output in [0,1].
pub trait SourceEvaluator: Send + Sync {
    fn evaluate(&self, metadata: &PageMetadata) -> f64;
}

/// The full set of collaborators one [`crate::pipeline::Verifier`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub validator: Arc<dyn UrlValidator>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn TextExtractor>,
    pub analyzer: Arc<dyn CredibilityAnalyzer>,
    pub evaluator: Arc<dyn SourceEvaluator>,
}

impl Collaborators {
    /// Production HTTP adapters configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            validator: Arc::new(crate::validator::HttpUrlValidator::new(&config.fetch)?),
            fetcher: Arc::new(crate::fetcher::HttpPageFetcher::new(&config.fetch)?),
            extractor: Arc::new(crate::extractor::OpenAiExtractor::new(&config.extraction)?),
            analyzer: Arc::new(crate::analyzer::PerplexityAnalyzer::new(&config.analysis)?),
            evaluator: Arc::new(crate::credibility::HeuristicEvaluator::new(
                config.domains.clone(),
            )),
        })
    }
}

/// Per-request credential overrides for the two AI collaborators.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
}

/// Keys resolved for one full pipeline run.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    pub extraction: String,
    pub analysis: String,
}

impl Credentials {
    pub fn new(openai_api_key: Option<String>, perplexity_api_key: Option<String>) -> Self {
        Self {
            openai_api_key: non_blank(openai_api_key),
            perplexity_api_key: non_blank(perplexity_api_key),
        }
    }

    /// Request overrides first, then the configured environment variables.
    pub fn resolve(&self, config: &Config) -> Result<ApiKeys, VerifyError> {
        self.resolve_with(config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(&self, config: &Config, env: F) -> Result<ApiKeys, VerifyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: &Option<String>, var: &str, label: &str| {
            explicit
                .clone()
                .or_else(|| non_blank(env(var)))
                .ok_or_else(|| {
                    VerifyError::InvalidInput(format!(
                        "{} API key not provided and {} is not set",
                        label, var
                    ))
                })
        };

        Ok(ApiKeys {
            extraction: pick(
                &self.openai_api_key,
                &config.extraction.api_key_env,
                "OpenAI",
            )?,
            analysis: pick(
                &self.perplexity_api_key,
                &config.analysis.api_key_env,
                "Perplexity",
            )?,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_beats_environment() {
        let config = Config::minimal();
        let creds = Credentials::new(Some("sk-override".into()), None);
        let keys = creds
            .resolve_with(&config, |name| Some(format!("env-{}", name)))
            .unwrap();
        assert_eq!(keys.extraction, "sk-override");
        assert_eq!(keys.analysis, "env-PERPLEXITY_API_KEY");
    }

    #[test]
    fn test_missing_key_is_invalid_input() {
        let config = Config::minimal();
        let creds = Credentials::new(Some("  ".into()), Some("pplx".into()));
        let err = creds.resolve_with(&config, |_| None).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
