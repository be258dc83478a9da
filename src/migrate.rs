//! Schema creation and optional reference seeding.
//!
//! Two tables: `domain_trust` (keyed by lower-cased domain) and
//! `verification_cache` (keyed by the exact original URL). Timestamps are
//! Unix seconds. Every statement is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Creates the schema and, when `seed` is set, inserts the reference trust rows.
/// Returns the number of seeded rows that were new.
pub async fn run_migrations(config: &Config, seed: bool) -> Result<u64> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    let seeded = if seed {
        seed_reference_domains(&pool).await?
    } else {
        0
    };
    pool.close().await;
    Ok(seeded)
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS domain_trust (
            domain TEXT PRIMARY KEY,
            trust_score REAL NOT NULL CHECK (trust_score >= 0.0 AND trust_score <= 1.0),
            category TEXT NOT NULL DEFAULT 'general',
            bias_level TEXT NOT NULL DEFAULT 'unknown'
                CHECK (bias_level IN ('low', 'medium', 'high', 'unknown')),
            reliability TEXT NOT NULL DEFAULT 'unknown'
                CHECK (reliability IN ('very_high', 'high', 'medium', 'low', 'very_low', 'unknown')),
            notes TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            last_checked_at INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verification_cache (
            url TEXT PRIMARY KEY,
            url_hash TEXT NOT NULL,
            domain TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '',
            publication_date TEXT NOT NULL DEFAULT '',
            content_type TEXT NOT NULL DEFAULT '',
            content_length INTEGER NOT NULL DEFAULT 0,
            confidence_score REAL NOT NULL
                CHECK (confidence_score >= 0.0 AND confidence_score <= 1.0),
            confidence_level TEXT NOT NULL,
            confidence_explanation TEXT NOT NULL DEFAULT '',
            source_credibility_score REAL NOT NULL DEFAULT 0.0,
            content_consistency_score REAL NOT NULL DEFAULT 0.0,
            verification_coverage_score REAL NOT NULL DEFAULT 0.0,
            extracted_text TEXT NOT NULL DEFAULT '',
            credibility_assessment TEXT NOT NULL DEFAULT '',
            fact_verification_results TEXT NOT NULL DEFAULT '[]',
            sources_used TEXT NOT NULL DEFAULT '[]',
            full_analysis TEXT NOT NULL DEFAULT '',
            metadata_assessment TEXT NOT NULL DEFAULT '{}',
            processing_time_seconds REAL NOT NULL DEFAULT 0.0,
            extraction_tokens_used INTEGER NOT NULL DEFAULT 0,
            analysis_calls_made INTEGER NOT NULL DEFAULT 0,
            extraction_model TEXT NOT NULL DEFAULT '',
            first_verified_at INTEGER NOT NULL,
            last_accessed_at INTEGER NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            expires_at INTEGER NOT NULL,
            cache_status TEXT NOT NULL DEFAULT 'fresh'
                CHECK (cache_status IN ('fresh', 'stale', 'expired'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_verification_cache_url_hash ON verification_cache(url_hash)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_verification_cache_domain ON verification_cache(domain)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_verification_cache_status_expiry ON verification_cache(cache_status, expires_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Reference trust rows inserted by `credence init --seed`.
///
/// Existing rows are left untouched, so re-seeding never overwrites a
/// score an operator or a pipeline run has since changed.
pub const REFERENCE_DOMAINS: &[(&str, f64, &str, &str, &str, &str)] = &[
    ("nytimes.com", 0.98, "news", "low", "high", "Highly reputable news outlet"),
    ("bbc.com", 0.98, "news", "low", "high", "Trusted global news source"),
    ("infowars.com", 0.05, "news", "high", "very_low", "Known for misinformation"),
    ("wikipedia.org", 0.85, "reference", "medium", "high", "Crowdsourced but generally reliable"),
    ("blogspot.com", 0.15, "blog", "unknown", "low", "User-generated, varies widely"),
];

pub async fn seed_reference_domains(pool: &SqlitePool) -> Result<u64> {
    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0u64;

    for (domain, score, category, bias, reliability, notes) in REFERENCE_DOMAINS {
        let result = sqlx::query(
            r#"
            INSERT INTO domain_trust (domain, trust_score, category, bias_level, reliability,
                                      notes, created_at, updated_at, last_checked_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(domain) DO NOTHING
            "#,
        )
        .bind(domain)
        .bind(score)
        .bind(category)
        .bind(bias)
        .bind(reliability)
        .bind(notes)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
