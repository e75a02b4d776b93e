//! Text analysis primitives: token counts, key-term extraction, and weighted
//! term coverage. Pure functions over text; no I/O, no hidden state.

mod stopwords;

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::guidelines::ImportantTerm;

use self::stopwords::STOP_WORDS;

/// Tokens must be at least this many characters to count as key terms.
const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub word_count: usize,
    pub sentence_count: usize,
}

/// A frequency-ranked term. `importance` is the term's frequency rescaled to
/// 1..=10 relative to the top term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyTerm {
    pub term: String,
    pub count: usize,
    pub importance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermCoverage {
    pub score: u32,
    pub missing_terms: Vec<String>,
    pub present_terms: Vec<String>,
}

/// Tokenizer and term-statistics engine. Construct once and inject into
/// whichever component needs it; there is no process-global instance.
pub struct TextAnalyzer {
    stop_words: HashSet<&'static str>,
}

impl Default for TextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextAnalyzer {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Basic stats over a text. Empty input yields zero counts, never an error.
    pub fn analyze(&self, text: &str) -> TextStats {
        TextStats {
            word_count: words(text).count(),
            sentence_count: sentence_count(text),
        }
    }

    /// Frequency-ranked key terms: lowercased, stop words and tokens shorter
    /// than three characters removed, ties broken by first occurrence so the
    /// ranking is deterministic.
    pub fn extract_key_terms(&self, text: &str, limit: usize) -> Vec<KeyTerm> {
        let lower = text.to_lowercase();
        let mut frequency: HashMap<&str, (usize, usize)> = HashMap::new();

        for (position, token) in words(&lower).enumerate() {
            if token.chars().count() < MIN_TERM_CHARS || self.stop_words.contains(token) {
                continue;
            }
            let entry = frequency.entry(token).or_insert((0, position));
            entry.0 += 1;
        }

        let mut ranked: Vec<(&str, usize, usize)> = frequency
            .into_iter()
            .map(|(term, (count, first_seen))| (term, count, first_seen))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.truncate(limit);

        let max_count = ranked.first().map(|(_, count, _)| *count).unwrap_or(1);

        ranked
            .into_iter()
            .map(|(term, count, _)| KeyTerm {
                term: term.to_string(),
                count,
                importance: ((count as f64 / max_count as f64 * 10.0).round() as u32).max(1),
            })
            .collect()
    }

    /// Weighted coverage of `terms` in `text`. A term is present when its
    /// normalized form occurs as a case-insensitive substring; stemming is
    /// deliberately not applied. An empty term list is a vacuous pass (100).
    pub fn term_coverage(&self, text: &str, terms: &[ImportantTerm]) -> TermCoverage {
        if terms.is_empty() {
            return TermCoverage {
                score: 100,
                missing_terms: vec![],
                present_terms: vec![],
            };
        }

        let haystack = text.to_lowercase();
        let mut total_weight = 0.0_f64;
        let mut present_weight = 0.0_f64;
        let mut missing_terms = Vec::new();
        let mut present_terms = Vec::new();

        for term in terms {
            let needle = term.term_normalized.to_lowercase();
            let importance = if term.importance > 0.0 {
                term.importance
            } else {
                1.0
            };
            total_weight += importance;

            if haystack.contains(&needle) {
                present_weight += importance;
                present_terms.push(needle);
            } else {
                missing_terms.push(needle);
            }
        }

        let score = if total_weight > 0.0 {
            (present_weight / total_weight * 100.0).round() as u32
        } else {
            100
        };

        TermCoverage {
            score,
            missing_terms,
            present_terms,
        }
    }

    /// Occurrences of `term` as a whole token in `text` (case-insensitive).
    pub fn term_count(&self, text: &str, term: &str) -> usize {
        let lower = text.to_lowercase();
        let needle = term.to_lowercase();
        words(&lower).filter(|token| *token == needle).count()
    }
}

/// Splits on whitespace/punctuation, keeping apostrophes and hyphens inside
/// tokens. Pure-punctuation fragments are not words.
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
        .filter(|token| !token.is_empty() && token.chars().any(char::is_alphanumeric))
}

/// Counts sentence segments: spans delimited by runs of `.`, `!`, `?` that
/// contain at least one word. Trailing text without a terminator still counts.
fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|segment| words(segment).next().is_some())
        .count()
}
