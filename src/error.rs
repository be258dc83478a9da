//! Error taxonomy for the verification pipeline.
//!
//! Degenerate computations (empty claim lists, zero indicator counts) have no
//! variant here: the scoring engine resolves them to floor constants.

use serde::Serialize;
use std::fmt;

/// Pipeline states, used to label failures and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validating,
    Fetching,
    Extracting,
    Analyzing,
    Scoring,
    Persisting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Analyzing => "analyzing",
            Stage::Scoring => "scoring",
            Stage::Persisting => "persisting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// Malformed, disallowed, or unreachable URL, or missing credentials.
    #[error("{0}")]
    InvalidInput(String),

    /// Fetch, extraction, or analysis failure, including timeouts.
    #[error("{stage} failed: {message}")]
    CollaboratorFailure { stage: Stage, message: String },

    /// Store read or write error.
    #[error("persistence failed: {0}")]
    PersistenceFailure(String),

    /// No in-memory result exists for the URL being committed.
    #[error("no verification result for {0}")]
    NotFound(String),
}

impl VerifyError {
    pub fn collaborator(stage: Stage, message: impl Into<String>) -> Self {
        VerifyError::CollaboratorFailure {
            stage,
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in results and HTTP responses.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::InvalidInput(_) => "invalid_input",
            VerifyError::CollaboratorFailure { .. } => "collaborator_failure",
            VerifyError::PersistenceFailure(_) => "persistence_failure",
            VerifyError::NotFound(_) => "not_found",
        }
    }

    /// Message shown to the user in place of a credibility assessment.
    pub fn user_message(&self) -> String {
        match self {
            VerifyError::CollaboratorFailure { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for VerifyError {
    fn from(err: anyhow::Error) -> Self {
        VerifyError::PersistenceFailure(format!("{:#}", err))
    }
}
