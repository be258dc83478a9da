//! Verification pipeline orchestrator.
//!
//! ```text
//! START ─▶ cache hit ─────────────────────────────────────────▶ CACHE
//!   │
//!   ├────▶ trust store hit ───────────────────────────────────▶ SHORTCUT
//!   ▼
//! VALIDATING ─▶ FETCHING ─▶ EXTRACTING ─▶ ANALYZING ─▶ SCORING ─▶ PERSISTING ─▶ DONE
//!      │            │            │             │
//!      └────────────┴────────────┴─────────────┴────────────────▶ FAILED
//! ```
//!
//! Every path ends in a well-formed [`VerificationResult`]. Collaborator
//! failures are terminal and never retried; persistence failures become
//! warnings on an otherwise successful result. Nothing is written before
//! PERSISTING, so dropping the future mid-run leaves both stores untouched.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analyzer::DOMAIN_CREDIBILITY;
use crate::config::Config;
use crate::error::{Stage, VerifyError};
use crate::models::{
    domain_of, CleanStats, ConfidenceLevel, HistoryEntry, ScoreComponents, TransportMetadata,
    TrustUpdate, VerificationRecord,
};
use crate::scoring::{self, ScoringInput};
use crate::session::Session;
use crate::store::{ResultCache, TrustStore};
use crate::traits::{Collaborators, Credentials};

const CHATTER_BASE: f64 = 0.5;
const CHATTER_PER_SOURCE: f64 = 0.1;
const CHATTER_MIN: f64 = 0.3;
const CHATTER_MAX: f64 = 1.0;

/// One verification request. Owned by a single run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub url: String,
    pub credentials: Credentials,
    pub requested_at: DateTime<Utc>,
    pub request_id: Uuid,
}

impl PipelineRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: Credentials::default(),
            requested_at: Utc::now(),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// How a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Served from the Result Cache.
    Cache,
    /// Stored domain trust score reported directly.
    Shortcut,
    /// Full pipeline ran to completion.
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub request_id: String,
    pub resolution: Resolution,
    pub record: VerificationRecord,
    pub reliability_score: f64,
    pub online_chatter_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_stats: Option<CleanStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
    /// Non-fatal problems, e.g. a failed store write.
    pub warnings: Vec<String>,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        self.resolution != Resolution::Failed
    }
}

/// Drives one request at a time through the pipeline. Cheap to share behind
/// an `Arc`; concurrent `verify` calls are independent.
pub struct Verifier {
    config: Arc<Config>,
    trust: Arc<dyn TrustStore>,
    cache: Arc<dyn ResultCache>,
    collaborators: Collaborators,
    session: Arc<Session>,
}

impl Verifier {
    pub fn new(
        config: Arc<Config>,
        trust: Arc<dyn TrustStore>,
        cache: Arc<dyn ResultCache>,
        collaborators: Collaborators,
        session: Arc<Session>,
    ) -> Self {
        Self {
            config,
            trust,
            cache,
            collaborators,
            session,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn verify(&self, request: PipelineRequest) -> VerificationResult {
        let span = info_span!(
            "verify",
            request_id = %request.request_id,
            url = %request.url,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: PipelineRequest) -> VerificationResult {
        let started = Instant::now();

        match self.cache.get(&request.url).await {
            Ok(Some(record)) => {
                info!(score = record.confidence_score, access_count = record.access_count, "cache hit");
                let result = finished(&request, Resolution::Cache, record, Vec::new());
                self.session.remember(result.record.clone());
                return result;
            }
            Ok(None) => debug!("cache miss"),
            Err(e) => warn!(error = %format!("{:#}", e), "cache lookup failed, continuing"),
        }

        let domain = domain_of(&request.url);
        if !domain.is_empty() {
            match self.trust.lookup(&domain).await {
                Ok(Some(trust_score)) => {
                    info!(%domain, score = trust_score, "trust store shortcut");
                    let result = self.shortcut(&request, &domain, trust_score, started);
                    self.record_success(&result);
                    return result;
                }
                Ok(None) => debug!(%domain, "no trust override"),
                Err(e) => warn!(%domain, error = %format!("{:#}", e), "trust lookup failed, continuing"),
            }
        }

        match self.run_full(&request, started).await {
            Ok(result) => {
                self.record_success(&result);
                result
            }
            Err((stage, err)) => {
                warn!(stage = %stage, kind = err.kind(), error = %err, "verification failed");
                self.failed(&request, stage, err, started)
            }
        }
    }

    async fn run_full(
        &self,
        request: &PipelineRequest,
        started: Instant,
    ) -> Result<VerificationResult, (Stage, VerifyError)> {
        let config = &*self.config;
        let c = &self.collaborators;
        let url = request.url.as_str();

        let keys = request
            .credentials
            .resolve(config)
            .map_err(|e| (Stage::Validating, e))?;

        debug!(stage = %Stage::Validating, "validating url");
        let check = tokio::time::timeout(
            Duration::from_secs(config.fetch.validate_timeout_secs),
            c.validator.validate(url),
        )
        .await
        .map_err(|_| {
            (
                Stage::Validating,
                VerifyError::InvalidInput(format!(
                    "Cannot access URL: validation timed out after {}s",
                    config.fetch.validate_timeout_secs
                )),
            )
        })?;
        if !check.valid {
            return Err((Stage::Validating, VerifyError::InvalidInput(check.message)));
        }

        debug!(stage = %Stage::Fetching, "fetching page");
        let fetched = bounded(Stage::Fetching, config.fetch.timeout_secs, c.fetcher.fetch(url)).await?;
        let cleaned = c.fetcher.clean(&fetched.body, url);
        let mut metadata = cleaned.metadata;
        if metadata.domain.is_empty() {
            metadata.domain = domain_of(url);
        }
        let source_credibility = c.evaluator.evaluate(&metadata).clamp(0.0, 1.0);
        debug!(
            domain = %metadata.domain,
            cleaned_size = cleaned.stats.cleaned_size,
            source_credibility,
            "page cleaned"
        );

        debug!(stage = %Stage::Extracting, "extracting text");
        let extraction = bounded(
            Stage::Extracting,
            config.extraction.timeout_secs,
            c.extractor.extract(&cleaned.content, &metadata, &keys.extraction),
        )
        .await?;

        debug!(stage = %Stage::Analyzing, tokens = extraction.metadata.tokens_used, "analyzing credibility");
        let analysis = bounded(
            Stage::Analyzing,
            config.analysis.timeout_secs,
            c.analyzer.analyze(&extraction.text, &keys.analysis),
        )
        .await?;

        let outcome = scoring::score(
            &ScoringInput {
                analysis: &analysis,
                extracted_text: &extraction.text,
                metadata: &metadata,
                source_credibility,
                url_valid: true,
            },
            &config.scoring,
            &config.domains,
        );
        info!(
            stage = %Stage::Scoring,
            score = outcome.score,
            level = %outcome.level,
            "scored"
        );

        let mut record = VerificationRecord::empty(url, request.requested_at, config.cache.retention());
        record.domain = metadata.domain.clone();
        record.title = metadata.title.clone().unwrap_or_default();
        record.author = metadata.author.clone().unwrap_or_default();
        record.publication_date = metadata.publication_date.clone().unwrap_or_default();
        record.content_type = fetched.transport.content_type.clone();
        record.content_length = fetched.transport.content_length;
        record.confidence_score = outcome.score;
        record.confidence_level = outcome.level;
        record.confidence_explanation = outcome.explanation;
        record.score_components = outcome.components;
        record.extracted_text = extraction.text;
        record.credibility_assessment = analysis.credibility_assessment;
        record.fact_verification_results = analysis.fact_verification;
        record.sources_used = analysis.sources;
        record.full_analysis = analysis.full_analysis;
        record.metadata_assessment = analysis.metadata_assessment;
        record.extraction_tokens_used = extraction.metadata.tokens_used;
        record.analysis_calls_made = 1;
        record.extraction_model = extraction.metadata.model;
        record.processing_time_seconds = started.elapsed().as_secs_f64();

        let warnings = self.persist(&record).await;

        let mut result = finished(request, Resolution::Done, record, warnings);
        result.transport = Some(fetched.transport);
        result.clean_stats = Some(cleaned.stats);
        Ok(result)
    }

    /// Best-effort writes to both stores. Failures are returned as warnings.
    async fn persist(&self, record: &VerificationRecord) -> Vec<String> {
        let mut warnings = Vec::new();

        if !record.domain.is_empty() {
            match self.trust.get_domain(&record.domain).await {
                Ok(Some(existing)) if !existing.is_active => {
                    debug!(domain = %record.domain, "trust row inactive, left unchanged");
                }
                Ok(_) => {
                    let update = TrustUpdate::new(&record.domain, record.confidence_score).notes(
                        format!(
                            "Automatically added domain based on analysis: {}",
                            record.credibility_assessment
                        ),
                    );
                    if let Err(e) = self.trust.upsert(&update).await {
                        warnings.push(persist_warning("trust store", e));
                    }
                }
                Err(e) => warnings.push(persist_warning("trust store", e)),
            }
        }

        if self.config.cache.auto_commit {
            if let Err(e) = self.cache.put(record, record.processing_time_seconds).await {
                warnings.push(persist_warning("result cache", e));
            }
        }

        warnings
    }

    fn shortcut(
        &self,
        request: &PipelineRequest,
        domain: &str,
        trust_score: f64,
        started: Instant,
    ) -> VerificationResult {
        let score = trust_score.clamp(0.0, 1.0);
        let level = ConfidenceLevel::classify(score);

        let mut record =
            VerificationRecord::empty(&request.url, request.requested_at, self.config.cache.retention());
        record.domain = domain.to_string();
        record.confidence_score = score;
        record.confidence_level = level;
        record.confidence_explanation = level.explain(score);
        record.score_components = ScoreComponents {
            source_credibility: score,
            content_consistency: 0.0,
            verification_coverage: 0.0,
        };
        record.credibility_assessment = format!(
            "Domain {} found in credibility database with trust score {:.2}%",
            domain,
            score * 100.0
        );
        record
            .metadata_assessment
            .insert(DOMAIN_CREDIBILITY.to_string(), format!("Trust score: {}", score));
        record.processing_time_seconds = started.elapsed().as_secs_f64();

        let mut result = finished(request, Resolution::Shortcut, record, Vec::new());
        result.reliability_score = score;
        result
    }

    fn failed(
        &self,
        request: &PipelineRequest,
        stage: Stage,
        err: VerifyError,
        started: Instant,
    ) -> VerificationResult {
        let message = err.user_message();
        let mut record =
            VerificationRecord::empty(&request.url, request.requested_at, self.config.cache.retention());
        record.confidence_explanation = format!("{} - {}", ConfidenceLevel::None.explain(0.0), message);
        record.credibility_assessment = message.clone();
        record.processing_time_seconds = started.elapsed().as_secs_f64();

        VerificationResult {
            request_id: request.request_id.to_string(),
            resolution: Resolution::Failed,
            record,
            reliability_score: 0.0,
            online_chatter_score: 0.0,
            transport: None,
            clean_stats: None,
            failure: Some(FailureInfo {
                stage,
                kind: err.kind(),
                message,
            }),
            warnings: Vec::new(),
        }
    }

    fn record_success(&self, result: &VerificationResult) {
        self.session.record_run(HistoryEntry {
            url: result.record.url.clone(),
            score: result.record.confidence_score,
            timestamp: Utc::now(),
        });
        self.session.remember(result.record.clone());
    }

    /// Persists the in-memory result for `url` to the Result Cache.
    pub async fn commit(&self, url: &str, processing_time: f64) -> Result<(), VerifyError> {
        let record = self
            .session
            .result(url)
            .ok_or_else(|| VerifyError::NotFound(url.to_string()))?;
        self.cache.put(&record, processing_time).await?;
        info!(url, "result committed to cache");
        Ok(())
    }

    pub fn history(&self, n: usize) -> Vec<HistoryEntry> {
        self.session.history(n)
    }

    /// Clears run history and in-memory results. Durable stores are untouched.
    pub fn reset(&self) {
        self.session.reset();
    }
}

fn finished(
    request: &PipelineRequest,
    resolution: Resolution,
    record: VerificationRecord,
    warnings: Vec<String>,
) -> VerificationResult {
    let reliability_score =
        (record.confidence_score + record.score_components.source_credibility) / 2.0;
    let online_chatter_score = online_chatter(record.sources_used.len());
    VerificationResult {
        request_id: request.request_id.to_string(),
        resolution,
        record,
        reliability_score,
        online_chatter_score,
        transport: None,
        clean_stats: None,
        failure: None,
        warnings,
    }
}

pub fn online_chatter(sources: usize) -> f64 {
    (CHATTER_BASE + CHATTER_PER_SOURCE * sources as f64).clamp(CHATTER_MIN, CHATTER_MAX)
}

fn persist_warning(store: &str, err: anyhow::Error) -> String {
    let err = VerifyError::from(err);
    warn!(stage = %Stage::Persisting, store, error = %err, "persistence failed, result still returned");
    format!("{} write failed: {}", store, err)
}

/// Runs a collaborator call under its configured bound.
async fn bounded<T, F>(stage: Stage, secs: u64, fut: F) -> Result<T, (Stage, VerifyError)>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err((stage, VerifyError::collaborator(stage, format!("{:#}", e)))),
        Err(_) => Err((
            stage,
            VerifyError::collaborator(stage, format!("{} timed out after {}s", stage, secs)),
        )),
    }
}
