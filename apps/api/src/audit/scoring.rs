//! Content scoring — weighted composite of term coverage, length, and
//! heading structure against a guideline profile.
//!
//! This is a pure function: same inputs always produce the same outputs.
//! Every other component's correctness is judged through it, so it carries
//! the bulk of the unit tests.

use serde::Serialize;

use crate::models::guidelines::ContentGuidelinesRow;
use crate::nlp::TextAnalyzer;

pub const TERM_COVERAGE_WEIGHT: f64 = 0.5;
pub const LENGTH_WEIGHT: f64 = 0.3;
pub const HEADINGS_WEIGHT: f64 = 0.2;

/// Human-readable priority bucket derived from the content score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    PerformingWell,
    Monitor,
    NeedsOptimization,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::PerformingWell => "Performing Well",
            Recommendation::Monitor => "Monitor",
            Recommendation::NeedsOptimization => "Needs Optimization",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub term_coverage_score: f64,
    pub length_score: f64,
    pub headings_score: f64,
    pub term_coverage_weight: f64,
    pub length_weight: f64,
    pub headings_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentScore {
    pub content_score: i32,
    pub recommendation: Recommendation,
    /// Inverse priority: worst-scoring pages surface first.
    pub recommendation_score: i32,
    pub breakdown: ScoreBreakdown,
}

/// Scores page text against its guideline profile.
pub fn score(
    analyzer: &TextAnalyzer,
    page_text: &str,
    guidelines: &ContentGuidelinesRow,
) -> ContentScore {
    let terms = guidelines.terms();
    let coverage = analyzer.term_coverage(page_text, &terms);
    let term_coverage_score = coverage.score as f64;

    let stats = analyzer.analyze(page_text);
    let length_score = length_score(
        stats.word_count,
        guidelines.min_words.unwrap_or(0),
        guidelines.max_words.unwrap_or(0),
    );

    // Heading-structure analysis is a placeholder in this version.
    let headings_score = 100.0;

    let content_score = (term_coverage_score * TERM_COVERAGE_WEIGHT
        + length_score * LENGTH_WEIGHT
        + headings_score * HEADINGS_WEIGHT)
        .round() as i32;

    ContentScore {
        content_score,
        recommendation: recommendation_for(content_score),
        recommendation_score: 100 - content_score,
        breakdown: ScoreBreakdown {
            term_coverage_score,
            length_score,
            headings_score,
            term_coverage_weight: TERM_COVERAGE_WEIGHT,
            length_weight: LENGTH_WEIGHT,
            headings_weight: HEADINGS_WEIGHT,
        },
    }
}

/// Length sub-score. Inside [min, max] (or with no bounds configured) scores
/// 100. Thin content is penalized at twice the rate of overage.
fn length_score(actual: usize, min: i32, max: i32) -> f64 {
    let actual = actual as f64;
    let min = min as f64;
    let max = max as f64;

    if min == 0.0 && max == 0.0 {
        return 100.0;
    }
    if actual >= min && (max == 0.0 || actual <= max) {
        return 100.0;
    }
    if actual < min {
        return (100.0 - ((min - actual) / min) * 100.0).max(0.0);
    }
    (100.0 - ((actual - max) / max) * 50.0).max(0.0)
}

pub fn recommendation_for(score: i32) -> Recommendation {
    if score >= 80 {
        Recommendation::PerformingWell
    } else if score >= 50 {
        Recommendation::Monitor
    } else {
        Recommendation::NeedsOptimization
    }
}
