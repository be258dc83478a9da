//! `credence verify <url>`: one pipeline run against the SQLite stores.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::{PipelineRequest, Resolution, VerificationResult, Verifier};
use crate::session::Session;
use crate::store::sqlite::SqliteStore;
use crate::traits::{Collaborators, Credentials};

pub async fn run_verify(
    config: &Config,
    url: &str,
    credentials: Credentials,
    json: bool,
) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let verifier = Verifier::new(
        Arc::new(config.clone()),
        store.clone(),
        store,
        Collaborators::from_config(config)?,
        Arc::new(Session::new()),
    );

    let result = verifier
        .verify(PipelineRequest::new(url).with_credentials(credentials))
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &VerificationResult) {
    let rec = &result.record;
    let resolution = match result.resolution {
        Resolution::Cache => "cache",
        Resolution::Shortcut => "trust store",
        Resolution::Done => "full analysis",
        Resolution::Failed => "failed",
    };

    println!("URL:         {}", rec.url);
    println!("Resolution:  {}", resolution);
    println!("{}", rec.confidence_explanation);
    println!(
        "Components:  source {:.2}, consistency {:.2}, coverage {:.2}",
        rec.score_components.source_credibility,
        rec.score_components.content_consistency,
        rec.score_components.verification_coverage
    );
    println!("Reliability: {:.2}", result.reliability_score);
    if let Some(failure) = &result.failure {
        println!("Failed at:   {} ({})", failure.stage, failure.kind);
    }
    if !rec.title.is_empty() {
        println!("Title:       {}", rec.title);
    }
    if !rec.credibility_assessment.is_empty() {
        println!("\n{}", rec.credibility_assessment);
    }
    if !rec.fact_verification_results.is_empty() {
        println!("\nClaims:");
        for fact in &rec.fact_verification_results {
            println!("  [{:?}] {}", fact.status, fact.claim);
        }
    }
    if !rec.sources_used.is_empty() {
        println!("\nSources:");
        for source in &rec.sources_used {
            println!("  {}", source);
        }
    }
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
}
