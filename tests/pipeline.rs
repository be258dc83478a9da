use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use credence::config::Config;
use credence::error::Stage;
use credence::models::{
    AnalysisResult, Assessment, ClaimStatus, CleanStats, ConfidenceLevel, CredibilitySignals,
    DomainTrustRecord, ExtractionMetadata, FactCheck, PageMetadata, TransportMetadata,
    TrustUpdate, VerificationRecord,
};
use credence::pipeline::{PipelineRequest, Resolution, Verifier};
use credence::session::Session;
use credence::store::memory::InMemoryStore;
use credence::store::{ResultCache, SweepReport, TrustStore};
use credence::traits::{
    CleanedPage, Collaborators, CredibilityAnalyzer, Credentials, Extraction, FetchedPage,
    PageFetcher, SourceEvaluator, TextExtractor, UrlCheck, UrlValidator,
};

// ============ Fakes ============

#[derive(Default)]
struct Calls {
    validate: AtomicUsize,
    fetch: AtomicUsize,
    extract: AtomicUsize,
    analyze: AtomicUsize,
}

impl Calls {
    fn total(&self) -> usize {
        self.validate.load(Ordering::SeqCst)
            + self.fetch.load(Ordering::SeqCst)
            + self.extract.load(Ordering::SeqCst)
            + self.analyze.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
enum Failure {
    #[default]
    None,
    Validate,
    Fetch,
    Extract,
    Analyze,
    SlowExtract(Duration),
}

struct FakeValidator {
    calls: Arc<Calls>,
    failure: Failure,
}

#[async_trait]
impl UrlValidator for FakeValidator {
    async fn validate(&self, _url: &str) -> UrlCheck {
        self.calls.validate.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Validate => UrlCheck::invalid("URL is not accessible (Status code: 404)"),
            _ => UrlCheck::ok(),
        }
    }
}

struct FakeFetcher {
    calls: Arc<Calls>,
    failure: Failure,
    metadata: PageMetadata,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        if let Failure::Fetch = self.failure {
            return Err(anyhow!("Failed to fetch content: HTTP 503"));
        }
        Ok(FetchedPage {
            body: "<html><body><article>page</article></body></html>".into(),
            transport: TransportMetadata {
                content_length: 48,
                content_type: "text/html".into(),
                status_code: 200,
                final_url: url.to_string(),
            },
        })
    }

    fn clean(&self, _raw: &str, _url: &str) -> CleanedPage {
        CleanedPage {
            content: "page".into(),
            stats: CleanStats {
                original_size: 48,
                cleaned_size: 4,
                reduction_percent: 91.67,
                content_found: true,
            },
            metadata: self.metadata.clone(),
        }
    }
}

struct FakeExtractor {
    calls: Arc<Calls>,
    failure: Failure,
    text: String,
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(
        &self,
        _cleaned: &str,
        _metadata: &PageMetadata,
        api_key: &str,
    ) -> Result<Extraction> {
        self.calls.extract.fetch_add(1, Ordering::SeqCst);
        assert_eq!(api_key, "sk-openai");
        match &self.failure {
            Failure::Extract => return Err(anyhow!("OpenAI extraction failed: quota")),
            Failure::SlowExtract(delay) => tokio::time::sleep(*delay).await,
            _ => {}
        }
        Ok(Extraction {
            text: self.text.clone(),
            metadata: ExtractionMetadata {
                tokens_used: 321,
                model: "gpt-4o-mini".into(),
            },
        })
    }
}

struct FakeAnalyzer {
    calls: Arc<Calls>,
    failure: Failure,
    result: AnalysisResult,
}

#[async_trait]
impl CredibilityAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _text: &str, api_key: &str) -> Result<AnalysisResult> {
        self.calls.analyze.fetch_add(1, Ordering::SeqCst);
        assert_eq!(api_key, "pplx-key");
        if let Failure::Analyze = self.failure {
            return Err(anyhow!("Perplexity analysis failed: 500"));
        }
        Ok(self.result.clone())
    }
}

struct FixedEvaluator(f64);

impl SourceEvaluator for FixedEvaluator {
    fn evaluate(&self, _metadata: &PageMetadata) -> f64 {
        self.0
    }
}

/// Store whose writes always fail and whose reads always miss.
struct BrokenStore;

#[async_trait]
impl TrustStore for BrokenStore {
    async fn lookup(&self, _domain: &str) -> Result<Option<f64>> {
        Ok(None)
    }
    async fn get_domain(&self, _domain: &str) -> Result<Option<DomainTrustRecord>> {
        Ok(None)
    }
    async fn upsert(&self, _update: &TrustUpdate) -> Result<()> {
        Err(anyhow!("disk I/O error"))
    }
}

#[async_trait]
impl ResultCache for BrokenStore {
    async fn get(&self, _url: &str) -> Result<Option<VerificationRecord>> {
        Err(anyhow!("database is locked"))
    }
    async fn peek(&self, _url: &str) -> Result<Option<VerificationRecord>> {
        Ok(None)
    }
    async fn put(&self, _record: &VerificationRecord, _processing_time: f64) -> Result<()> {
        Err(anyhow!("disk I/O error"))
    }
    async fn sweep(&self, _now: DateTime<Utc>) -> Result<SweepReport> {
        Ok(SweepReport::default())
    }
}

// ============ Harness ============

struct Scenario {
    failure: Failure,
    text: String,
    analysis: AnalysisResult,
    source_credibility: f64,
    domain: String,
}

impl Scenario {
    /// 50-word text, 2 verified claims, 1 source, no metadata bias.
    fn b() -> Self {
        Self {
            failure: Failure::None,
            text: words(50),
            analysis: AnalysisResult {
                full_analysis: "Claim 1: ok - Verified\nClaim 2: ok - Verified".into(),
                credibility_assessment: "Claims verified".into(),
                sources: BTreeSet::from(["https://ref.example/1".to_string()]),
                metadata_assessment: BTreeMap::new(),
                fact_verification: vec![
                    FactCheck {
                        claim: "Claim 1: ok - Verified".into(),
                        status: ClaimStatus::Verified,
                    },
                    FactCheck {
                        claim: "Claim 2: ok - Verified".into(),
                        status: ClaimStatus::Verified,
                    },
                ],
                signals: CredibilitySignals::default(),
            },
            source_credibility: 0.4,
            domain: "news.example.net".into(),
        }
    }

    /// No claims, sources or indicators; 200 words; domain not trusted.
    fn c() -> Self {
        Self {
            text: words(200),
            analysis: AnalysisResult {
                full_analysis: "Nothing of note was found.".into(),
                credibility_assessment: "Assessment not clearly stated".into(),
                ..AnalysisResult::default()
            },
            ..Self::b()
        }
    }

    fn failing(failure: Failure) -> Self {
        Self {
            failure,
            ..Self::b()
        }
    }
}

fn words(n: usize) -> String {
    vec!["lorem"; n].join(" ")
}

struct Harness {
    verifier: Verifier,
    store: Arc<InMemoryStore>,
    calls: Arc<Calls>,
}

fn collaborators(scenario: &Scenario, calls: &Arc<Calls>) -> Collaborators {
    Collaborators {
        validator: Arc::new(FakeValidator {
            calls: calls.clone(),
            failure: scenario.failure.clone(),
        }),
        fetcher: Arc::new(FakeFetcher {
            calls: calls.clone(),
            failure: scenario.failure.clone(),
            metadata: PageMetadata {
                domain: scenario.domain.clone(),
                title: Some("Story".into()),
                author: Some("Jane Doe".into()),
                publication_date: Some("2024-01-02".into()),
                description: None,
            },
        }),
        extractor: Arc::new(FakeExtractor {
            calls: calls.clone(),
            failure: scenario.failure.clone(),
            text: scenario.text.clone(),
        }),
        analyzer: Arc::new(FakeAnalyzer {
            calls: calls.clone(),
            failure: scenario.failure.clone(),
            result: scenario.analysis.clone(),
        }),
        evaluator: Arc::new(FixedEvaluator(scenario.source_credibility)),
    }
}

fn harness_with(scenario: Scenario, config: Config) -> Harness {
    let calls = Arc::new(Calls::default());
    let store = Arc::new(InMemoryStore::new(config.cache.retention()));
    let verifier = Verifier::new(
        Arc::new(config),
        store.clone(),
        store.clone(),
        collaborators(&scenario, &calls),
        Arc::new(Session::new()),
    );
    Harness {
        verifier,
        store,
        calls,
    }
}

fn harness(scenario: Scenario) -> Harness {
    harness_with(scenario, Config::minimal())
}

fn request(url: &str) -> PipelineRequest {
    PipelineRequest::new(url).with_credentials(Credentials::new(
        Some("sk-openai".into()),
        Some("pplx-key".into()),
    ))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============ Shortcut and cache paths ============

#[tokio::test]
async fn test_scenario_a_trust_store_shortcut() {
    let h = harness(Scenario::b());
    h.store
        .upsert(&TrustUpdate::new("example.org", 0.82))
        .await
        .unwrap();

    let result = h
        .verifier
        .verify(PipelineRequest::new("https://example.org/any/page"))
        .await;

    assert_eq!(result.resolution, Resolution::Shortcut);
    let rec = &result.record;
    assert_eq!(rec.confidence_score, 0.82);
    assert_eq!(rec.confidence_level, ConfidenceLevel::High);
    assert_eq!(rec.score_components.source_credibility, 0.82);
    assert_eq!(rec.score_components.content_consistency, 0.0);
    assert_eq!(rec.score_components.verification_coverage, 0.0);
    assert_eq!(
        rec.credibility_assessment,
        "Domain example.org found in credibility database with trust score 82.00%"
    );
    assert_eq!(rec.metadata_assessment["domain_credibility"], "Trust score: 0.82");
    assert_eq!(result.reliability_score, 0.82);
    assert_eq!(h.calls.total(), 0, "shortcut must not call collaborators");
    assert_eq!(h.verifier.history(5).len(), 1);
}

#[tokio::test]
async fn test_shortcut_needs_exact_domain() {
    let h = harness(Scenario::b());
    h.store
        .upsert(&TrustUpdate::new("example.org", 0.82))
        .await
        .unwrap();

    let result = h.verifier.verify(request("https://www.example.org/")).await;
    assert_eq!(result.resolution, Resolution::Done);
    assert!(h.calls.total() > 0);
}

#[tokio::test]
async fn test_cache_hit_beats_trust_store() {
    let h = harness(Scenario::b());
    let url = "https://example.org/cached";
    let mut cached = VerificationRecord::empty(url, Utc::now(), chrono::Duration::days(30));
    cached.confidence_score = 0.33;
    cached.confidence_level = ConfidenceLevel::Medium;
    h.store.put(&cached, 4.0).await.unwrap();
    h.store
        .upsert(&TrustUpdate::new("example.org", 0.82))
        .await
        .unwrap();

    let result = h.verifier.verify(PipelineRequest::new(url)).await;
    assert_eq!(result.resolution, Resolution::Cache);
    assert_eq!(result.record.confidence_score, 0.33);
    assert_eq!(result.record.access_count, 1);
    assert_eq!(h.calls.total(), 0);

    let again = h.verifier.verify(PipelineRequest::new(url)).await;
    assert_eq!(again.record.access_count, 2);
}

// ============ Full pipeline ============

#[tokio::test]
async fn test_scenario_b_reference_score() {
    let h = harness(Scenario::b());
    let url = "https://news.example.net/story";

    let result = h.verifier.verify(request(url)).await;
    assert_eq!(result.resolution, Resolution::Done, "{:?}", result.failure);

    let rec = &result.record;
    assert!(approx(rec.score_components.content_consistency, 0.475));
    assert!(approx(rec.score_components.verification_coverage, 0.35));
    assert!(approx(rec.score_components.source_credibility, 0.4));
    let expected = 0.4 * 0.35 + 0.475 * 0.45 + 0.35 * 0.2;
    assert!(approx(rec.confidence_score, expected));
    assert_eq!(rec.confidence_level, ConfidenceLevel::Medium);
    assert!(rec.confidence_explanation.starts_with("Confidence Level: MEDIUM (42.3"));
    assert!(approx(result.reliability_score, (expected + 0.4) / 2.0));
    assert!(approx(result.online_chatter_score, 0.6));
    assert!(result.warnings.is_empty());

    assert_eq!(rec.title, "Story");
    assert_eq!(rec.author, "Jane Doe");
    assert_eq!(rec.publication_date, "2024-01-02");
    assert_eq!(rec.content_type, "text/html");
    assert_eq!(rec.extraction_tokens_used, 321);
    assert_eq!(rec.analysis_calls_made, 1);
    assert_eq!(rec.extraction_model, "gpt-4o-mini");
    assert_eq!(result.clean_stats.as_ref().map(|s| s.cleaned_size), Some(4));
}

#[tokio::test]
async fn test_scenario_c_floors() {
    let h = harness(Scenario::c());
    let result = h.verifier.verify(request("https://news.example.net/c")).await;

    assert_eq!(result.resolution, Resolution::Done);
    let components = result.record.score_components;
    assert_eq!(components.content_consistency, 0.15);
    assert_eq!(components.verification_coverage, 0.05);
    assert!(approx(result.online_chatter_score, 0.5));
}

#[tokio::test]
async fn test_full_run_persists_to_both_stores() {
    let h = harness(Scenario::b());
    let url = "https://news.example.net/story";
    let result = h.verifier.verify(request(url)).await;

    let trust = h.store.get_domain("news.example.net").await.unwrap().unwrap();
    assert!(approx(trust.trust_score, result.record.confidence_score));
    assert_eq!(trust.category, "general");
    assert!(trust
        .notes
        .starts_with("Automatically added domain based on analysis: "));

    let cached = h.store.peek(url).await.unwrap().unwrap();
    assert_eq!(cached.access_count, 0);
    assert!(approx(cached.confidence_score, result.record.confidence_score));

    // The next request for the same URL is a cache hit.
    let again = h.verifier.verify(request(url)).await;
    assert_eq!(again.resolution, Resolution::Cache);
    assert_eq!(again.record.access_count, 1);

    // A different URL on the same domain now takes the shortcut.
    let sibling = h
        .verifier
        .verify(request("https://news.example.net/other"))
        .await;
    assert_eq!(sibling.resolution, Resolution::Shortcut);
}

#[tokio::test]
async fn test_auto_commit_disabled_skips_cache_write() {
    let mut config = Config::minimal();
    config.cache.auto_commit = false;
    let h = harness_with(Scenario::b(), config);
    let url = "https://news.example.net/story";

    let result = h.verifier.verify(request(url)).await;
    assert_eq!(result.resolution, Resolution::Done);
    assert!(h.store.peek(url).await.unwrap().is_none());

    h.verifier.commit(url, 1.5).await.unwrap();
    let cached = h.store.peek(url).await.unwrap().unwrap();
    assert_eq!(cached.processing_time_seconds, 1.5);
}

#[tokio::test]
async fn test_domain_signals_bias_the_score() {
    let mut negative = Scenario::b();
    negative.analysis.signals = CredibilitySignals {
        domain: Assessment::Negative,
        author: Assessment::Negative,
    };
    let neutral = harness(Scenario::b())
        .verifier
        .verify(request("https://news.example.net/n"))
        .await;
    let biased = harness(negative)
        .verifier
        .verify(request("https://news.example.net/n"))
        .await;

    assert!(approx(
        biased.record.confidence_score,
        neutral.record.confidence_score * 0.4 * 0.6
    ));
}

// ============ Failures ============

async fn assert_failed_at(failure: Failure, stage: Stage, kind: &str) {
    let h = harness(Scenario::failing(failure));
    let url = "https://news.example.net/story";
    let result = h.verifier.verify(request(url)).await;

    assert_eq!(result.resolution, Resolution::Failed);
    let info = result.failure.as_ref().unwrap();
    assert_eq!(info.stage, stage);
    assert_eq!(info.kind, kind);
    assert!(!info.message.is_empty());

    let rec = &result.record;
    assert_eq!(rec.confidence_score, 0.0);
    assert_eq!(rec.confidence_level, ConfidenceLevel::None);
    assert_eq!(rec.score_components.source_credibility, 0.0);
    assert_eq!(rec.score_components.content_consistency, 0.0);
    assert_eq!(rec.score_components.verification_coverage, 0.0);
    assert_eq!(rec.credibility_assessment, info.message);
    assert!(rec.confidence_explanation.starts_with("Confidence Level: NONE (0.00%)"));

    assert!(h.store.peek(url).await.unwrap().is_none());
    assert!(h.store.get_domain("news.example.net").await.unwrap().is_none());
    assert!(h.verifier.history(5).is_empty());
}

#[tokio::test]
async fn test_invalid_url_fails_validation() {
    assert_failed_at(Failure::Validate, Stage::Validating, "invalid_input").await;
}

#[tokio::test]
async fn test_fetch_failure() {
    assert_failed_at(Failure::Fetch, Stage::Fetching, "collaborator_failure").await;
}

#[tokio::test]
async fn test_extraction_failure() {
    assert_failed_at(Failure::Extract, Stage::Extracting, "collaborator_failure").await;
}

#[tokio::test]
async fn test_analysis_failure() {
    assert_failed_at(Failure::Analyze, Stage::Analyzing, "collaborator_failure").await;
}

#[tokio::test]
async fn test_collaborator_timeout_is_a_failure() {
    let mut config = Config::minimal();
    config.extraction.timeout_secs = 1;
    let h = harness_with(
        Scenario::failing(Failure::SlowExtract(Duration::from_secs(5))),
        config,
    );

    let result = h.verifier.verify(request("https://news.example.net/slow")).await;
    assert_eq!(result.resolution, Resolution::Failed);
    let info = result.failure.unwrap();
    assert_eq!(info.stage, Stage::Extracting);
    assert!(info.message.contains("timed out"));
}

#[tokio::test]
async fn test_missing_credentials_only_matter_for_full_runs() {
    let mut config = Config::minimal();
    config.extraction.api_key_env = "CREDENCE_TEST_UNSET_OPENAI_KEY".into();
    config.analysis.api_key_env = "CREDENCE_TEST_UNSET_PPLX_KEY".into();
    let h = harness_with(Scenario::b(), config);

    let result = h
        .verifier
        .verify(PipelineRequest::new("https://news.example.net/story"))
        .await;
    assert_eq!(result.resolution, Resolution::Failed);
    assert_eq!(result.failure.unwrap().kind, "invalid_input");
    assert_eq!(h.calls.total(), 0);

    h.store
        .upsert(&TrustUpdate::new("news.example.net", 0.6))
        .await
        .unwrap();
    let result = h
        .verifier
        .verify(PipelineRequest::new("https://news.example.net/story"))
        .await;
    assert_eq!(result.resolution, Resolution::Shortcut);
}

#[tokio::test]
async fn test_persistence_failure_still_returns_result() {
    let calls = Arc::new(Calls::default());
    let scenario = Scenario::b();
    let broken = Arc::new(BrokenStore);
    let verifier = Verifier::new(
        Arc::new(Config::minimal()),
        broken.clone(),
        broken,
        collaborators(&scenario, &calls),
        Arc::new(Session::new()),
    );

    let result = verifier.verify(request("https://news.example.net/story")).await;
    assert_eq!(result.resolution, Resolution::Done);
    assert!(result.record.confidence_score > 0.0);
    assert_eq!(result.warnings.len(), 2);
    assert!(result.warnings[0].starts_with("trust store write failed"));
    assert!(result.warnings[1].starts_with("result cache write failed"));
    assert_eq!(verifier.history(5).len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let h = harness(Scenario::failing(Failure::SlowExtract(Duration::from_secs(30))));
    let url = "https://news.example.net/story";

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        h.verifier.verify(request(url)),
    )
    .await;
    assert!(outcome.is_err(), "run should have been abandoned");

    assert!(h.store.peek(url).await.unwrap().is_none());
    assert!(h.store.get_domain("news.example.net").await.unwrap().is_none());
    assert!(h.verifier.history(5).is_empty());
}

// ============ Session operations ============

#[tokio::test]
async fn test_history_commit_and_reset() {
    let h = harness(Scenario::b());
    h.store
        .upsert(&TrustUpdate::new("example.org", 0.82))
        .await
        .unwrap();

    for i in 0..7 {
        h.verifier
            .verify(PipelineRequest::new(format!("https://example.org/{}", i)))
            .await;
    }
    let history = h.verifier.history(5);
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].url, "https://example.org/2");
    assert_eq!(history[4].url, "https://example.org/6");
    assert!(history.iter().all(|e| e.score == 0.82));

    // Shortcut results are not cached until committed.
    let url = "https://example.org/6";
    assert!(h.store.peek(url).await.unwrap().is_none());
    h.verifier.commit(url, 0.0).await.unwrap();
    let cached = h.store.peek(url).await.unwrap().unwrap();
    assert_eq!(cached.confidence_score, 0.82);

    let err = h
        .verifier
        .commit("https://never.example/", 0.0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    h.verifier.reset();
    assert!(h.verifier.history(5).is_empty());
    assert_eq!(
        h.verifier
            .commit(url, 0.0)
            .await
            .unwrap_err()
            .kind(),
        "not_found"
    );
    // Durable stores are untouched by reset.
    assert!(h.store.peek(url).await.unwrap().is_some());
    assert_eq!(h.store.lookup("example.org").await.unwrap(), Some(0.82));
}

#[tokio::test]
async fn test_oversized_retention_never_panics() {
    let mut config = Config::minimal();
    config.cache.retention_days = 200_000_000;
    let h = harness_with(Scenario::b(), config);
    h.store
        .upsert(&TrustUpdate::new("example.org", 0.82))
        .await
        .unwrap();

    let shortcut = h.verifier.verify(PipelineRequest::new("https://example.org/a")).await;
    assert_eq!(shortcut.resolution, Resolution::Shortcut);
    assert!(shortcut.record.expires_at > shortcut.record.first_verified_at);

    let full = h.verifier.verify(request("https://news.example.net/story")).await;
    assert_eq!(full.resolution, Resolution::Done);
    assert!(h.store.peek("https://news.example.net/story").await.unwrap().is_some());
}

#[tokio::test]
async fn test_in_memory_results_stay_bounded() {
    let h = harness(Scenario::b());
    h.store
        .upsert(&TrustUpdate::new("example.org", 0.7))
        .await
        .unwrap();

    for i in 0..500 {
        h.verifier
            .verify(PipelineRequest::new(format!("https://example.org/{}", i)))
            .await;
    }
    assert_eq!(h.verifier.history(usize::MAX).len(), 100);

    let evicted = h.verifier.commit("https://example.org/0", 0.0).await;
    assert_eq!(evicted.unwrap_err().kind(), "not_found");
    h.verifier
        .commit("https://example.org/499", 0.0)
        .await
        .unwrap();
}
