//! Credibility analysis through a Perplexity chat model, plus the
//! deterministic adapter that turns its free-text answer into an
//! [`AnalysisResult`].
//!
//! The adapter is where the fuzzy "credible"/"not credible" reading happens;
//! the scoring engine only sees the typed [`CredibilitySignals`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::chat::{self, ChatRequest};
use crate::config::AnalysisConfig;
use crate::models::{AnalysisResult, Assessment, ClaimStatus, CredibilitySignals, FactCheck};
use crate::traits::CredibilityAnalyzer;

pub const DOMAIN_CREDIBILITY: &str = "domain_credibility";
pub const AUTHOR_CREDIBILITY: &str = "author_credibility";
pub const DATE_RELEVANCE: &str = "date_relevance";

const NOT_ASSESSED: &str = "Not assessed";

const ASSESSMENT_KEYWORDS: &[&str] = &[
    "credible",
    "reliable",
    "accurate",
    "verified",
    "trustworthy",
    "false",
    "misleading",
    "disputed",
    "controversial",
    "unverifiable",
];

const SYSTEM_PROMPT: &str =
    "You are a fact-checker. Analyze content for credibility, focusing on metadata.";

pub struct PerplexityAnalyzer {
    client: Client,
    config: AnalysisConfig,
}

impl PerplexityAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl CredibilityAnalyzer for PerplexityAnalyzer {
    async fn analyze(&self, extracted_text: &str, api_key: &str) -> Result<AnalysisResult> {
        let prepared = prepare_content(extracted_text, self.config.max_tokens as usize);
        let prompt = research_prompt(&prepared);
        let reply = chat::complete(
            &self.client,
            &ChatRequest {
                endpoint: &self.config.endpoint,
                api_key,
                model: &self.config.model,
                system: SYSTEM_PROMPT,
                user: &prompt,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        )
        .await
        .context("Perplexity analysis failed")?;

        Ok(parse_analysis(&reply.content))
    }
}

fn research_prompt(content: &str) -> String {
    format!(
        "You are a professional fact-checker analyzing web content for credibility.

CONTENT TO VERIFY:
{content}

INSTRUCTIONS:
1. Focus on metadata (domain, author, date) for credibility.
2. Search for evidence from reliable sources.
3. Verify the specific claims in the KEY CLAIMS section, aiming for 3-5 claims.
4. Assess domain reputation.
5. Evaluate author expertise or recognition.
6. Check whether the publication date affects claim relevance.

OUTPUT:
1. SOURCE CREDIBILITY ASSESSMENT:
   - Domain reliability (e.g. 'Highly credible', 'Unreliable')
   - Author credibility (e.g. 'Recognized journalist', 'Unknown')
   - Date relevance (e.g. 'Recent', 'Outdated')
2. FACT VERIFICATION:
   - One line per claim: 'Claim N: ... - Verified/Disputed/Unverifiable'
   - Supporting or contradicting sources
3. OVERALL CREDIBILITY RATING:
   - Highly Credible / Moderately Credible / Low Credibility / Not Credible
4. KEY SOURCES:
   - 2-3 sources used for verification, with URLs"
    )
}

/// Fits `text` into roughly `max_tokens` tokens (four characters each).
///
/// The METADATA and KEY CLAIMS sections are kept first; remaining sections
/// follow in order until the budget runs out, the last one cut short.
pub fn prepare_content(text: &str, max_tokens: usize) -> String {
    let budget = max_tokens.saturating_mul(4);
    if text.chars().count() / 4 <= max_tokens {
        return text.to_string();
    }

    let sections: Vec<&str> = text.split("\n\n").collect();
    let mut metadata = None;
    let mut key_claims = None;
    for (i, section) in sections.iter().enumerate() {
        let upper = section.to_uppercase();
        if upper.contains("METADATA") || section.contains("Website Domain") {
            metadata = Some(i);
        } else if upper.contains("KEY CLAIMS")
            || section
                .trim_start()
                .chars()
                .next()
                .is_some_and(|c| ('1'..='9').contains(&c))
        {
            key_claims = Some(i);
        }
    }

    let mut kept: Vec<String> = [metadata, key_claims]
        .into_iter()
        .flatten()
        .map(|i| sections[i].to_string())
        .collect();
    let mut used: usize = kept.iter().map(|s| s.chars().count()).sum();

    for (i, section) in sections.iter().enumerate() {
        if Some(i) == metadata || Some(i) == key_claims {
            continue;
        }
        let len = section.chars().count();
        if used + len < budget {
            kept.push(section.to_string());
            used += len;
        } else {
            let remaining = budget.saturating_sub(used);
            if remaining > 50 {
                let cut: String = section.chars().take(remaining - 10).collect();
                kept.push(format!("{}...", cut));
            }
            break;
        }
    }

    kept.join("\n\n")
}

/// Parses a free-text analysis into its structured parts.
pub fn parse_analysis(analysis: &str) -> AnalysisResult {
    let metadata_assessment = extract_metadata_assessment(analysis);
    let signals = CredibilitySignals {
        domain: metadata_assessment
            .get(DOMAIN_CREDIBILITY)
            .map(|t| Assessment::classify(t))
            .unwrap_or_default(),
        author: metadata_assessment
            .get(AUTHOR_CREDIBILITY)
            .map(|t| Assessment::classify(t))
            .unwrap_or_default(),
    };

    AnalysisResult {
        full_analysis: analysis.to_string(),
        credibility_assessment: extract_credibility_assessment(analysis),
        sources: extract_sources(analysis),
        metadata_assessment,
        fact_verification: extract_fact_verification(analysis),
        signals,
    }
}

pub fn extract_sources(analysis: &str) -> BTreeSet<String> {
    let mut sources = BTreeSet::new();
    if let Ok(url_re) = Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]*"#) {
        for m in url_re.find_iter(analysis) {
            sources.insert(m.as_str().to_string());
        }
    }
    for line in analysis.lines() {
        let lower = line.to_lowercase();
        if lower.contains("source:") || lower.contains("reference:") {
            sources.insert(line.trim().to_string());
        }
    }
    sources
}

pub fn extract_credibility_assessment(analysis: &str) -> String {
    let lines: Vec<&str> = analysis
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            ASSESSMENT_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(str::trim)
        .collect();

    if lines.is_empty() {
        "Assessment not clearly stated".to_string()
    } else {
        lines.join(" ")
    }
}

/// Domain, author and date judgements. Each takes the matching line and the
/// one after it; a later match replaces an earlier one.
pub fn extract_metadata_assessment(analysis: &str) -> BTreeMap<String, String> {
    let mut assessment: BTreeMap<String, String> = [DOMAIN_CREDIBILITY, AUTHOR_CREDIBILITY, DATE_RELEVANCE]
        .iter()
        .map(|k| (k.to_string(), NOT_ASSESSED.to_string()))
        .collect();

    let lower = analysis.to_lowercase();
    let lines: Vec<&str> = lower.split('\n').collect();
    for (i, line) in lines.iter().enumerate() {
        let key = if line.contains("domain") && (line.contains("credib") || line.contains("reliab")) {
            DOMAIN_CREDIBILITY
        } else if line.contains("author") && (line.contains("credib") || line.contains("expert")) {
            AUTHOR_CREDIBILITY
        } else if line.contains("date") || line.contains("publication") {
            DATE_RELEVANCE
        } else {
            continue;
        };
        let end = (i + 2).min(lines.len());
        assessment.insert(key.to_string(), lines[i..end].join(" ").trim().to_string());
    }

    assessment
}

pub fn extract_fact_verification(analysis: &str) -> Vec<FactCheck> {
    let Ok(fact_re) = Regex::new(
        r"(?i)(claim|fact|statement)\s*(\d+)?\s*?:.*?(verified|disputed|false|true|unverifiable)",
    ) else {
        return Vec::new();
    };

    analysis
        .lines()
        .filter_map(|line| {
            let caps = fact_re.captures(line)?;
            let verdict = caps.get(3)?.as_str().to_lowercase();
            let status = if verdict == "verified" || verdict == "true" {
                ClaimStatus::Verified
            } else {
                ClaimStatus::Disputed
            };
            Some(FactCheck {
                claim: line.trim().to_string(),
                status,
            })
        })
        .collect()
}
