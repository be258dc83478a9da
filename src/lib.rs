//! # credence
//!
//! Assesses the credibility of web content reachable by URL and returns a
//! bounded confidence score with supporting evidence.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   request ────▶ │   pipeline   │ ──▶ validator / fetcher / extractor / analyzer
//!                 │ (Verifier)   │
//!                 └──┬───────┬───┘
//!                    │       │ scoring::score (pure)
//!          ┌─────────┘       └─────────┐
//!          ▼                           ▼
//!   ┌─────────────┐            ┌──────────────┐
//!   │ TrustStore  │            │ ResultCache  │   store::{memory, sqlite}
//!   │ domain→score│            │ url→record   │
//!   └─────────────┘            └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Failure taxonomy and pipeline stages |
//! | [`scoring`] | Confidence scoring engine |
//! | [`pipeline`] | Verification state machine |
//! | [`session`] | Run history and in-memory results |
//! | [`store`] | Trust store and result cache backends |
//! | [`traits`] | Collaborator seams |
//! | [`validator`], [`fetcher`], [`extractor`], [`analyzer`], [`credibility`] | Collaborator adapters |
//! | [`chat`] | Chat-completions client shared by the AI adapters |
//! | [`housekeeping`] | Cache freshness sweep |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and seeding |

pub mod analyzer;
pub mod cache_cmd;
pub mod chat;
pub mod config;
pub mod credibility;
pub mod db;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod housekeeping;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod server;
pub mod session;
pub mod store;
pub mod traits;
pub mod trust_cmd;
pub mod validator;
pub mod verify_cmd;
