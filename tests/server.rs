use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use credence::config::Config;
use credence::models::{AnalysisResult, PageMetadata, TrustUpdate};
use credence::pipeline::Verifier;
use credence::server::router;
use credence::session::Session;
use credence::store::memory::InMemoryStore;
use credence::store::{ResultCache, TrustStore};
use credence::traits::{
    CleanedPage, Collaborators, CredibilityAnalyzer, Extraction, FetchedPage, PageFetcher,
    SourceEvaluator, TextExtractor, UrlCheck, UrlValidator,
};

/// Every collaborator refuses: a full run ends at validation.
struct Offline;

#[async_trait]
impl UrlValidator for Offline {
    async fn validate(&self, _url: &str) -> UrlCheck {
        UrlCheck::invalid("Cannot access URL: connection refused")
    }
}

#[async_trait]
impl PageFetcher for Offline {
    async fn fetch(&self, _url: &str) -> Result<FetchedPage> {
        Err(anyhow!("offline"))
    }

    fn clean(&self, _raw: &str, _url: &str) -> CleanedPage {
        CleanedPage::default()
    }
}

#[async_trait]
impl TextExtractor for Offline {
    async fn extract(
        &self,
        _cleaned: &str,
        _metadata: &PageMetadata,
        _api_key: &str,
    ) -> Result<Extraction> {
        Err(anyhow!("offline"))
    }
}

#[async_trait]
impl CredibilityAnalyzer for Offline {
    async fn analyze(&self, _text: &str, _api_key: &str) -> Result<AnalysisResult> {
        Err(anyhow!("offline"))
    }
}

impl SourceEvaluator for Offline {
    fn evaluate(&self, _metadata: &PageMetadata) -> f64 {
        0.5
    }
}

struct TestServer {
    base: String,
    store: Arc<InMemoryStore>,
    client: reqwest::Client,
}

async fn spawn() -> TestServer {
    let store = Arc::new(InMemoryStore::default());
    let offline = Arc::new(Offline);
    let collaborators = Collaborators {
        validator: offline.clone(),
        fetcher: offline.clone(),
        extractor: offline.clone(),
        analyzer: offline.clone(),
        evaluator: offline,
    };
    let verifier = Arc::new(Verifier::new(
        Arc::new(Config::minimal()),
        store.clone(),
        store.clone(),
        collaborators,
        Arc::new(Session::new()),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(verifier)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        store,
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health() {
    let srv = spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_verify_shortcut_then_commit() {
    let srv = spawn().await;
    srv.store
        .upsert(&TrustUpdate::new("example.org", 0.82))
        .await
        .unwrap();

    let url = "https://example.org/article";
    let (status, body) = srv.post("/verify", json!({ "url": url })).await;
    assert_eq!(status, 200);
    assert_eq!(body["resolution"], "shortcut");
    assert_eq!(body["record"]["confidence_score"], 0.82);
    assert_eq!(body["record"]["confidence_level"], "HIGH");
    assert!(body.get("failure").is_none());

    let (status, body) = srv.post("/cache", json!({ "url": url, "processing_time": 2.0 })).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Results added to cache");
    let cached = srv.store.peek(url).await.unwrap().unwrap();
    assert_eq!(cached.processing_time_seconds, 2.0);

    let (_, body) = srv.post("/verify", json!({ "url": url })).await;
    assert_eq!(body["resolution"], "cache");
    assert_eq!(body["record"]["access_count"], 1);
}

#[tokio::test]
async fn test_failed_verification_is_still_ok() {
    let srv = spawn().await;
    let (status, body) = srv
        .post(
            "/verify",
            json!({
                "url": "https://unreachable.example.net/",
                "openai_api_key": "sk-test",
                "perplexity_api_key": "pplx-test"
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["resolution"], "failed");
    assert_eq!(body["failure"]["stage"], "validating");
    assert_eq!(body["failure"]["kind"], "invalid_input");
    assert_eq!(body["record"]["confidence_score"], 0.0);
    assert_eq!(body["record"]["confidence_level"], "NONE");
}

#[tokio::test]
async fn test_empty_url_is_bad_request() {
    let srv = spawn().await;
    let (status, body) = srv.post("/verify", json!({ "url": "   " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "url must not be empty");
}

#[tokio::test]
async fn test_commit_unknown_url_is_not_found() {
    let srv = spawn().await;
    let (status, body) = srv
        .post("/cache", json!({ "url": "https://nothing.example/" }))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_history_and_clear() {
    let srv = spawn().await;
    srv.store
        .upsert(&TrustUpdate::new("example.org", 0.6))
        .await
        .unwrap();

    for i in 0..3 {
        srv.post("/verify", json!({ "url": format!("https://example.org/{}", i) }))
            .await;
    }

    let (status, body) = srv.get("/history?n=2").await;
    assert_eq!(status, 200);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["url"], "https://example.org/1");
    assert_eq!(entries[1]["url"], "https://example.org/2");
    assert_eq!(entries[1]["score"], 0.6);

    let (_, body) = srv.get("/history").await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = srv.post("/clear_history", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "History cleared successfully");

    let (_, body) = srv.get("/history").await;
    assert!(body.as_array().unwrap().is_empty());
}
