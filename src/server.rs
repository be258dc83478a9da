//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/verify` | Run one verification request |
//! | `POST` | `/cache` | Commit the in-memory result for a URL to the Result Cache |
//! | `GET`  | `/history` | Most recent runs (`?n=`, default 5) |
//! | `POST` | `/clear_history` | Clear run history and in-memory results |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! A failed verification is still a `200` carrying a zero-confidence result;
//! HTTP errors are reserved for malformed requests and store failures:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "url must not be empty" } }
//! ```

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::error::VerifyError;
use crate::models::HistoryEntry;
use crate::pipeline::{PipelineRequest, VerificationResult, Verifier};
use crate::session::{Session, DEFAULT_HISTORY_LIMIT};
use crate::store::sqlite::SqliteStore;
use crate::traits::{Collaborators, Credentials};

/// Starts the HTTP server on `[server].bind` with SQLite stores and the
/// production collaborators. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let collaborators = Collaborators::from_config(config)?;
    let verifier = Arc::new(Verifier::new(
        Arc::new(config.clone()),
        store.clone(),
        store,
        collaborators,
        Arc::new(Session::new()),
    ));

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server listening");
    println!("credence listening on http://{}", bind_addr);

    axum::serve(listener, router(verifier)).await?;
    Ok(())
}

pub fn router(verifier: Arc<Verifier>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/verify", post(handle_verify))
        .route("/cache", post(handle_cache))
        .route("/history", get(handle_history))
        .route("/clear_history", post(handle_clear_history))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(verifier)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        let status = match &err {
            VerifyError::NotFound(_) => StatusCode::NOT_FOUND,
            VerifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ POST /verify ============

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub url: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub perplexity_api_key: Option<String>,
}

async fn handle_verify(
    State(verifier): State<Arc<Verifier>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerificationResult>, AppError> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(bad_request("url must not be empty"));
    }

    let request = PipelineRequest::new(url)
        .with_credentials(Credentials::new(req.openai_api_key, req.perplexity_api_key));
    Ok(Json(verifier.verify(request).await))
}

// ============ POST /cache ============

#[derive(Deserialize)]
pub struct CacheRequest {
    pub url: String,
    #[serde(default)]
    pub processing_time: f64,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_cache(
    State(verifier): State<Arc<Verifier>>,
    Json(req): Json<CacheRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    verifier.commit(&req.url, req.processing_time).await?;
    Ok(Json(MessageResponse {
        message: "Results added to cache".to_string(),
    }))
}

// ============ GET /history ============

#[derive(Deserialize)]
struct HistoryParams {
    n: Option<usize>,
}

async fn handle_history(
    State(verifier): State<Arc<Verifier>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<HistoryEntry>> {
    Json(verifier.history(params.n.unwrap_or(DEFAULT_HISTORY_LIMIT)))
}

// ============ POST /clear_history ============

async fn handle_clear_history(State(verifier): State<Arc<Verifier>>) -> Json<MessageResponse> {
    verifier.reset();
    Json(MessageResponse {
        message: "History cleared successfully".to_string(),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
