//! Confidence scoring engine.
//!
//! [`score`] is a pure function of its inputs and the configuration it is
//! handed. It combines three sub-scores with a weight triple chosen per
//! request, applies the analysis' credibility signals as multiplicative
//! biases, clamps to `[0, 1]`, and classifies the result.
//!
//! ```text
//! claims ──▶ consistency ─┐
//! sources ─▶ coverage ────┼─▶ length adj ─▶ Σ wᵢ·cᵢ ─▶ domain bias ─▶ author bias ─▶ clamp
//! source credibility ─────┘
//! ```
//!
//! The order of the multiplicative steps is significant and fixed.

use crate::config::{DomainsConfig, ScoringConfig, Weights};
use crate::models::{
    AnalysisResult, Assessment, ClaimStatus, ConfidenceLevel, PageMetadata, ScoreComponents,
};

const POSITIVE_INDICATORS: &[&str] = &[
    "verified",
    "confirmed",
    "accurate",
    "reliable",
    "credible",
    "supported",
];

const NEGATIVE_INDICATORS: &[&str] = &[
    "false",
    "misleading",
    "disputed",
    "incorrect",
    "misinformation",
    "contradicted",
];

const CLAIM_CONSISTENCY_SCALE: f64 = 0.95;
const LEXICAL_CONSISTENCY_SCALE: f64 = 0.9;
const DISPUTED_PENALTY: f64 = 0.3;
const NO_SIGNAL_CONSISTENCY: f64 = 0.15;
const TRUSTED_NO_SIGNAL_BONUS: f64 = 0.3;

const COVERAGE_PER_SOURCE: f64 = 0.3;
const COVERAGE_PER_CLAIM: f64 = 0.2;
const COVERAGE_CAP: f64 = 0.95;
const COVERAGE_FLOOR: f64 = 0.05;

const SHORT_TEXT_WORDS: usize = 100;
const LONG_TEXT_WORDS: usize = 600;
const SHORT_TEXT_FACTOR: f64 = 0.5;
const LONG_TEXT_BONUS: f64 = 0.05;

const DOMAIN_NEGATIVE_FACTOR: f64 = 0.4;
const DOMAIN_POSITIVE_FACTOR: f64 = 1.2;
const AUTHOR_POSITIVE_FACTOR: f64 = 1.15;
const AUTHOR_NEGATIVE_FACTOR: f64 = 0.6;

/// Everything the engine reads for one request.
pub struct ScoringInput<'a> {
    pub analysis: &'a AnalysisResult,
    pub extracted_text: &'a str,
    pub metadata: &'a PageMetadata,
    pub source_credibility: f64,
    pub url_valid: bool,
}

/// Final score, its classification, and the sub-scores that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub explanation: String,
    pub components: ScoreComponents,
}

impl ScoreOutcome {
    /// The absolute override for an invalid URL.
    pub fn none() -> Self {
        Self {
            score: 0.0,
            level: ConfidenceLevel::None,
            explanation: format!(
                "{} - Invalid or inaccessible URL",
                ConfidenceLevel::None.explain(0.0)
            ),
            components: ScoreComponents::default(),
        }
    }

    fn classified(score: f64, components: ScoreComponents) -> Self {
        let level = ConfidenceLevel::classify(score);
        Self {
            score,
            level,
            explanation: level.explain(score),
            components,
        }
    }
}

/// Scores one verification request.
pub fn score(
    input: &ScoringInput<'_>,
    scoring: &ScoringConfig,
    domains: &DomainsConfig,
) -> ScoreOutcome {
    if !input.url_valid {
        return ScoreOutcome::none();
    }

    let domain = input.metadata.domain.to_lowercase();
    let trusted = domains.is_trusted(&domain);
    let analysis = input.analysis;

    let mut consistency = content_consistency(analysis, trusted);
    let mut coverage = verification_coverage(analysis);

    let words = input.extracted_text.split_whitespace().count();
    if words < SHORT_TEXT_WORDS {
        consistency *= SHORT_TEXT_FACTOR;
        coverage *= SHORT_TEXT_FACTOR;
    } else if words > LONG_TEXT_WORDS {
        consistency += LONG_TEXT_BONUS;
        coverage += LONG_TEXT_BONUS;
    }

    let components = ScoreComponents {
        source_credibility: input.source_credibility,
        content_consistency: consistency,
        verification_coverage: coverage,
    };

    let weights = select_weights(scoring, trusted, input.extracted_text);
    let mut final_score = components.source_credibility * weights.source_credibility
        + components.content_consistency * weights.content_consistency
        + components.verification_coverage * weights.verification_coverage;

    final_score *= match analysis.signals.domain {
        Assessment::Negative => DOMAIN_NEGATIVE_FACTOR,
        Assessment::Positive => DOMAIN_POSITIVE_FACTOR,
        Assessment::Unassessed => 1.0,
    };
    final_score *= match analysis.signals.author {
        Assessment::Positive => AUTHOR_POSITIVE_FACTOR,
        Assessment::Negative => AUTHOR_NEGATIVE_FACTOR,
        Assessment::Unassessed => 1.0,
    };

    ScoreOutcome::classified(clamp_unit(final_score), components)
}

/// Content-consistency sub-score before the text-length adjustment.
pub fn content_consistency(analysis: &AnalysisResult, trusted_domain: bool) -> f64 {
    let facts = &analysis.fact_verification;
    if !facts.is_empty() {
        let verified = facts
            .iter()
            .filter(|f| f.status == ClaimStatus::Verified)
            .count();
        let ratio = ratio(verified, facts.len());
        let mut consistency = ratio * CLAIM_CONSISTENCY_SCALE;
        if ratio < 0.5 {
            consistency *= DISPUTED_PENALTY;
        }
        return consistency;
    }

    let text = analysis.full_analysis.to_lowercase();
    let positive = count_present(&text, POSITIVE_INDICATORS);
    let negative = count_present(&text, NEGATIVE_INDICATORS);

    if positive + negative > 0 {
        let mut consistency = ratio(positive, positive + negative) * LEXICAL_CONSISTENCY_SCALE;
        if negative > positive {
            consistency *= DISPUTED_PENALTY;
        }
        consistency
    } else if trusted_domain {
        NO_SIGNAL_CONSISTENCY + TRUSTED_NO_SIGNAL_BONUS
    } else {
        NO_SIGNAL_CONSISTENCY
    }
}

/// Verification-coverage sub-score before the text-length adjustment.
pub fn verification_coverage(analysis: &AnalysisResult) -> f64 {
    let sources = analysis.sources.len();
    let claims = analysis.fact_verification.len();
    if sources == 0 && claims == 0 {
        return COVERAGE_FLOOR;
    }
    (COVERAGE_PER_SOURCE * sources as f64 + COVERAGE_PER_CLAIM * claims as f64).min(COVERAGE_CAP)
}

/// Request-scoped weights. The configuration is never mutated.
pub fn select_weights(scoring: &ScoringConfig, trusted_domain: bool, text: &str) -> Weights {
    let mut weights = if trusted_domain {
        scoring.trusted_weights
    } else {
        scoring.default_weights
    };

    if is_sensitive(scoring, text) {
        weights.content_consistency += scoring.sensitive_adjustments.content_consistency;
        weights.verification_coverage += scoring.sensitive_adjustments.verification_coverage;
    }

    weights
}

pub fn is_sensitive(scoring: &ScoringConfig, text: &str) -> bool {
    let lower = text.to_lowercase();
    scoring
        .sensitive_topics
        .iter()
        .any(|topic| !topic.is_empty() && lower.contains(&topic.to_lowercase()))
}

/// Each vocabulary word counts once, however often it appears.
fn count_present(text: &str, vocabulary: &[&str]) -> usize {
    vocabulary.iter().filter(|w| text.contains(*w)).count()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// NaN collapses to zero.
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
