//! SQLite-backed [`TrustStore`] and [`ResultCache`].
//!
//! Every read-modify-write is a single SQL statement, so SQLite's write lock
//! serializes writers to a key for the duration of that statement only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::models::{
    expiry, url_hash, BiasLevel, CacheStatus, ConfidenceLevel, DomainTrustRecord, Reliability,
    ScoreComponents, TrustUpdate, VerificationRecord,
};

use super::{ResultCache, SweepReport, TrustStore};

pub struct SqliteStore {
    pool: SqlitePool,
    retention: chrono::Duration,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, retention: chrono::Duration) -> Self {
        Self { pool, retention }
    }

    /// Connects to the configured database and ensures the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = crate::db::connect(config).await?;
        crate::migrate::create_schema(&pool).await?;
        Ok(Self::new(pool, config.cache.retention()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Marks a domain active or inactive. Returns false when it is unknown.
    pub async fn set_active(&self, domain: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE domain_trust SET is_active = ?, updated_at = ? WHERE domain = ?")
            .bind(active)
            .bind(Utc::now().timestamp())
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn trust_from_row(row: &SqliteRow) -> DomainTrustRecord {
    let bias: String = row.get("bias_level");
    let reliability: String = row.get("reliability");
    DomainTrustRecord {
        domain: row.get("domain"),
        trust_score: row.get("trust_score"),
        category: row.get("category"),
        bias_level: BiasLevel::parse_lenient(&bias),
        reliability: Reliability::parse_lenient(&reliability),
        notes: row.get("notes"),
        created_at: ts(row.get("created_at")),
        updated_at: ts(row.get("updated_at")),
        last_checked_at: ts(row.get("last_checked_at")),
        is_active: row.get("is_active"),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<VerificationRecord> {
    let url: String = row.get("url");
    let level: String = row.get("confidence_level");
    let status: String = row.get("cache_status");
    let facts: String = row.get("fact_verification_results");
    let sources: String = row.get("sources_used");
    let metadata: String = row.get("metadata_assessment");

    Ok(VerificationRecord {
        url_hash: row.get("url_hash"),
        domain: row.get("domain"),
        title: row.get("title"),
        author: row.get("author"),
        publication_date: row.get("publication_date"),
        content_type: row.get("content_type"),
        content_length: row.get("content_length"),
        confidence_score: row.get("confidence_score"),
        confidence_level: level
            .parse::<ConfidenceLevel>()
            .map_err(anyhow::Error::msg)?,
        confidence_explanation: row.get("confidence_explanation"),
        score_components: ScoreComponents {
            source_credibility: row.get("source_credibility_score"),
            content_consistency: row.get("content_consistency_score"),
            verification_coverage: row.get("verification_coverage_score"),
        },
        extracted_text: row.get("extracted_text"),
        credibility_assessment: row.get("credibility_assessment"),
        fact_verification_results: serde_json::from_str(&facts)
            .with_context(|| format!("corrupt fact_verification_results for {}", url))?,
        sources_used: serde_json::from_str(&sources)
            .with_context(|| format!("corrupt sources_used for {}", url))?,
        full_analysis: row.get("full_analysis"),
        metadata_assessment: serde_json::from_str(&metadata)
            .with_context(|| format!("corrupt metadata_assessment for {}", url))?,
        processing_time_seconds: row.get("processing_time_seconds"),
        extraction_tokens_used: row.get("extraction_tokens_used"),
        analysis_calls_made: row.get("analysis_calls_made"),
        extraction_model: row.get("extraction_model"),
        first_verified_at: ts(row.get("first_verified_at")),
        last_accessed_at: ts(row.get("last_accessed_at")),
        access_count: row.get("access_count"),
        expires_at: ts(row.get("expires_at")),
        cache_status: status.parse::<CacheStatus>().map_err(anyhow::Error::msg)?,
        url,
    })
}

#[async_trait]
impl TrustStore for SqliteStore {
    async fn lookup(&self, domain: &str) -> Result<Option<f64>> {
        let score: Option<f64> = sqlx::query_scalar(
            "SELECT trust_score FROM domain_trust WHERE domain = ? AND is_active = 1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(score)
    }

    async fn get_domain(&self, domain: &str) -> Result<Option<DomainTrustRecord>> {
        let row = sqlx::query("SELECT * FROM domain_trust WHERE domain = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(trust_from_row))
    }

    async fn upsert(&self, update: &TrustUpdate) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO domain_trust (domain, trust_score, category, bias_level, reliability,
                                      notes, created_at, updated_at, last_checked_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(domain) DO UPDATE SET
                trust_score = excluded.trust_score,
                category = excluded.category,
                bias_level = excluded.bias_level,
                reliability = excluded.reliability,
                notes = excluded.notes,
                updated_at = excluded.updated_at,
                last_checked_at = excluded.last_checked_at
            "#,
        )
        .bind(&update.domain)
        .bind(update.trust_score)
        .bind(&update.category)
        .bind(update.bias_level.as_str())
        .bind(update.reliability.as_str())
        .bind(&update.notes)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("trust upsert failed for {}", update.domain))?;
        Ok(())
    }
}

#[async_trait]
impl ResultCache for SqliteStore {
    async fn get(&self, url: &str) -> Result<Option<VerificationRecord>> {
        let row = sqlx::query(
            r#"
            UPDATE verification_cache
            SET access_count = access_count + 1,
                last_accessed_at = ?,
                cache_status = 'fresh'
            WHERE url = ? AND cache_status IN ('fresh', 'stale')
            RETURNING *
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn peek(&self, url: &str) -> Result<Option<VerificationRecord>> {
        let row = sqlx::query("SELECT * FROM verification_cache WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn put(&self, record: &VerificationRecord, processing_time: f64) -> Result<()> {
        let now = Utc::now();
        let expires_at = expiry(now, self.retention);
        let facts = serde_json::to_string(&record.fact_verification_results)?;
        let sources = serde_json::to_string(&record.sources_used)?;
        let metadata = serde_json::to_string(&record.metadata_assessment)?;

        sqlx::query(
            r#"
            INSERT INTO verification_cache (
                url, url_hash, domain, title, author, publication_date, content_type,
                content_length, confidence_score, confidence_level, confidence_explanation,
                source_credibility_score, content_consistency_score, verification_coverage_score,
                extracted_text, credibility_assessment, fact_verification_results, sources_used,
                full_analysis, metadata_assessment, processing_time_seconds,
                extraction_tokens_used, analysis_calls_made, extraction_model,
                first_verified_at, last_accessed_at, access_count, expires_at, cache_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, ?, 'fresh')
            ON CONFLICT(url) DO UPDATE SET
                url_hash = excluded.url_hash,
                domain = excluded.domain,
                title = excluded.title,
                author = excluded.author,
                publication_date = excluded.publication_date,
                content_type = excluded.content_type,
                content_length = excluded.content_length,
                confidence_score = excluded.confidence_score,
                confidence_level = excluded.confidence_level,
                confidence_explanation = excluded.confidence_explanation,
                source_credibility_score = excluded.source_credibility_score,
                content_consistency_score = excluded.content_consistency_score,
                verification_coverage_score = excluded.verification_coverage_score,
                extracted_text = excluded.extracted_text,
                credibility_assessment = excluded.credibility_assessment,
                fact_verification_results = excluded.fact_verification_results,
                sources_used = excluded.sources_used,
                full_analysis = excluded.full_analysis,
                metadata_assessment = excluded.metadata_assessment,
                processing_time_seconds = excluded.processing_time_seconds,
                extraction_tokens_used = excluded.extraction_tokens_used,
                analysis_calls_made = excluded.analysis_calls_made,
                extraction_model = excluded.extraction_model,
                last_accessed_at = excluded.last_accessed_at,
                access_count = verification_cache.access_count + 1,
                expires_at = excluded.expires_at,
                cache_status = 'fresh'
            "#,
        )
        .bind(&record.url)
        .bind(url_hash(&record.url))
        .bind(&record.domain)
        .bind(&record.title)
        .bind(&record.author)
        .bind(&record.publication_date)
        .bind(&record.content_type)
        .bind(record.content_length)
        .bind(record.confidence_score.clamp(0.0, 1.0))
        .bind(record.confidence_level.as_str())
        .bind(&record.confidence_explanation)
        .bind(record.score_components.source_credibility)
        .bind(record.score_components.content_consistency)
        .bind(record.score_components.verification_coverage)
        .bind(&record.extracted_text)
        .bind(&record.credibility_assessment)
        .bind(facts)
        .bind(sources)
        .bind(&record.full_analysis)
        .bind(metadata)
        .bind(processing_time)
        .bind(record.extraction_tokens_used)
        .bind(record.analysis_calls_made)
        .bind(&record.extraction_model)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .bind(record.access_count)
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("cache put failed for {}", record.url))?;

        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let now_secs = now.timestamp();
        let retention_secs = self.retention.num_seconds();

        // Expired first so a row far past its window moves once, straight to expired.
        let expired = sqlx::query(
            "UPDATE verification_cache SET cache_status = 'expired' \
             WHERE cache_status != 'expired' AND expires_at + ? < ?",
        )
        .bind(retention_secs)
        .bind(now_secs)
        .execute(&self.pool)
        .await?;

        let stale = sqlx::query(
            "UPDATE verification_cache SET cache_status = 'stale' \
             WHERE cache_status = 'fresh' AND expires_at < ?",
        )
        .bind(now_secs)
        .execute(&self.pool)
        .await?;

        Ok(SweepReport {
            marked_stale: stale.rows_affected(),
            marked_expired: expired.rows_affected(),
        })
    }
}
