//! Auto-optimize — AI-drafted content edits driven by guideline term gaps.
//! Regeneration is idempotent: pending suggestions are replaced wholesale,
//! applied/rejected history is preserved.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::ai::{DraftChange, SuggestionGenerator, SuggestionInput};
use crate::errors::AppError;
use crate::models::guidelines::{fetch_guidelines, ImportantTerm, TermUsage};
use crate::models::page::fetch_page;
use crate::models::suggestion::{AutoOptimizeChangeRow, ChangeStatus};
use crate::nlp::TextAnalyzer;
use crate::serp::fetch::PageFetcher;

/// How many terms of each category are passed to the generator.
const MAX_PROMPT_TERMS: usize = 5;
/// How many extracted page terms are counted against the guideline list.
const PAGE_TERM_SAMPLE: usize = 100;

/// Splits guideline terms into missing and underused buckets based on how the
/// page currently uses them. A term is missing when absent and important
/// (> 0.6); underused when used at less than half its competitive average and
/// still important (> 0.5).
pub fn classify_term_usage(
    terms: &[ImportantTerm],
    page_counts: &HashMap<String, usize>,
) -> (Vec<ImportantTerm>, Vec<TermUsage>) {
    let mut missing = Vec::new();
    let mut underused = Vec::new();

    for term in terms {
        let current = page_counts
            .get(&term.term_normalized)
            .copied()
            .unwrap_or(0);

        if current == 0 && term.importance > 0.6 {
            missing.push(term.clone());
        } else if (current as f64) < term.avg_count * 0.5 && term.importance > 0.5 {
            underused.push(TermUsage {
                term: term.clone(),
                current_count: current,
            });
        }
    }

    (missing, underused)
}

/// Generates and persists a fresh set of suggested changes for a page.
pub async fn generate_suggestions(
    pool: &PgPool,
    analyzer: &TextAnalyzer,
    fetcher: &dyn PageFetcher,
    generator: &dyn SuggestionGenerator,
    page_id: Uuid,
) -> Result<Vec<AutoOptimizeChangeRow>, AppError> {
    info!("Generating auto-optimize suggestions for page {page_id}");

    let page = fetch_page(pool, page_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Page not found: {page_id}")))?;

    let guidelines = fetch_guidelines(pool, page_id).await?.ok_or_else(|| {
        AppError::PreconditionFailed(
            "No content guidelines available for this page. Run keyword analysis first."
                .to_string(),
        )
    })?;

    let fetched = fetcher
        .fetch(&page.url)
        .await
        .ok_or_else(|| AppError::External(format!("Failed to fetch page content: {}", page.url)))?;
    let page_text = fetched.body_text;

    let stats = analyzer.analyze(&page_text);
    let page_counts: HashMap<String, usize> = analyzer
        .extract_key_terms(&page_text, PAGE_TERM_SAMPLE)
        .into_iter()
        .map(|kt| (kt.term, kt.count))
        .collect();

    let terms = guidelines.terms();
    let (mut missing, mut underused) = classify_term_usage(&terms, &page_counts);
    missing.truncate(MAX_PROMPT_TERMS);
    underused.truncate(MAX_PROMPT_TERMS);

    info!(
        "Term analysis for page {page_id}: {} missing, {} underused",
        missing.len(),
        underused.len()
    );

    let recommended_word_count = guidelines.avg_words.map(|avg| {
        (
            guidelines.min_words.unwrap_or((avg as f64 * 0.8) as i32),
            guidelines.max_words.unwrap_or((avg as f64 * 1.2) as i32),
        )
    });

    let input = SuggestionInput {
        page_text,
        keyword: guidelines.keyword.clone(),
        language_code: guidelines.language_code.clone(),
        missing_terms: missing,
        underused_terms: underused,
        current_word_count: stats.word_count,
        recommended_word_count,
    };

    let drafts = generator.generate(&input).await?;

    // Idempotent replace: clear pending suggestions before inserting the new
    // set. Applied/rejected rows are history and stay untouched.
    sqlx::query("DELETE FROM auto_optimize_changes WHERE audit_page_id = $1 AND status = $2")
        .bind(page_id)
        .bind(ChangeStatus::Suggested)
        .execute(pool)
        .await?;

    let mut changes = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        changes.push(insert_change(pool, page_id, draft).await?);
    }

    info!("Created {} auto-optimize suggestions for page {page_id}", changes.len());
    Ok(changes)
}

async fn insert_change(
    pool: &PgPool,
    page_id: Uuid,
    draft: &DraftChange,
) -> Result<AutoOptimizeChangeRow, sqlx::Error> {
    sqlx::query_as::<_, AutoOptimizeChangeRow>(
        r#"
        INSERT INTO auto_optimize_changes
            (audit_page_id, change_type, location, original_text, suggested_text, reasoning)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(page_id)
    .bind(draft.change_type)
    .bind(&draft.location)
    .bind(&draft.original_text)
    .bind(&draft.suggested_text)
    .bind(&draft.reasoning)
    .fetch_one(pool)
    .await
}

pub async fn apply_change(
    pool: &PgPool,
    change_id: Uuid,
) -> Result<AutoOptimizeChangeRow, AppError> {
    transition_change(pool, change_id, ChangeStatus::Applied).await
}

pub async fn reject_change(
    pool: &PgPool,
    change_id: Uuid,
) -> Result<AutoOptimizeChangeRow, AppError> {
    transition_change(pool, change_id, ChangeStatus::Rejected).await
}

/// Applied/rejected are terminal: only a suggested change may transition.
async fn transition_change(
    pool: &PgPool,
    change_id: Uuid,
    to: ChangeStatus,
) -> Result<AutoOptimizeChangeRow, AppError> {
    let change = sqlx::query_as::<_, AutoOptimizeChangeRow>(
        "SELECT * FROM auto_optimize_changes WHERE id = $1",
    )
    .bind(change_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Change not found: {change_id}")))?;

    if change.status != ChangeStatus::Suggested {
        return Err(AppError::PreconditionFailed(format!(
            "Change is already {}. Only suggested changes can be {}.",
            change.status.as_str(),
            to.as_str()
        )));
    }

    let updated = sqlx::query_as::<_, AutoOptimizeChangeRow>(
        "UPDATE auto_optimize_changes SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(to)
    .bind(change_id)
    .fetch_one(pool)
    .await?;

    info!("Change {change_id} transitioned to {}", to.as_str());
    Ok(updated)
}

pub async fn list_changes(
    pool: &PgPool,
    page_id: Uuid,
    status: Option<ChangeStatus>,
) -> Result<Vec<AutoOptimizeChangeRow>, AppError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, AutoOptimizeChangeRow>(
                "SELECT * FROM auto_optimize_changes WHERE audit_page_id = $1 AND status = $2 ORDER BY created_at DESC",
            )
            .bind(page_id)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, AutoOptimizeChangeRow>(
                "SELECT * FROM auto_optimize_changes WHERE audit_page_id = $1 ORDER BY created_at DESC",
            )
            .bind(page_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(normalized: &str, importance: f64, avg_count: f64) -> ImportantTerm {
        ImportantTerm {
            term: normalized.to_string(),
            term_normalized: normalized.to_string(),
            importance,
            min_count: 0,
            max_count: 10,
            avg_count,
            percentage_present: 80.0,
        }
    }

    fn counts(entries: &[(&str, usize)]) -> HashMap<String, usize> {
        entries
            .iter()
            .map(|(term, count)| (term.to_string(), *count))
            .collect()
    }

    #[test]
    fn test_absent_important_term_is_missing() {
        let terms = vec![term("crawling", 0.8, 4.0)];
        let (missing, underused) = classify_term_usage(&terms, &counts(&[]));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].term_normalized, "crawling");
        assert!(underused.is_empty());
    }

    #[test]
    fn test_absent_low_importance_term_is_not_missing() {
        // importance 0.6 does not clear the > 0.6 bar; with avg_count 0 the
        // underused branch cannot trigger either.
        let terms = vec![term("crawling", 0.6, 0.0)];
        let (missing, underused) = classify_term_usage(&terms, &counts(&[]));
        assert!(missing.is_empty());
        assert!(underused.is_empty());
    }

    #[test]
    fn test_below_half_average_is_underused() {
        let terms = vec![term("schema", 0.7, 6.0)];
        let (missing, underused) = classify_term_usage(&terms, &counts(&[("schema", 2)]));
        assert!(missing.is_empty());
        assert_eq!(underused.len(), 1);
        assert_eq!(underused[0].current_count, 2);
    }

    #[test]
    fn test_at_half_average_is_not_underused() {
        let terms = vec![term("schema", 0.7, 6.0)];
        let (missing, underused) = classify_term_usage(&terms, &counts(&[("schema", 3)]));
        assert!(missing.is_empty());
        assert!(underused.is_empty());
    }

    #[test]
    fn test_underused_requires_importance_above_half() {
        let terms = vec![term("schema", 0.5, 6.0)];
        let (missing, underused) = classify_term_usage(&terms, &counts(&[("schema", 1)]));
        assert!(missing.is_empty());
        assert!(underused.is_empty());
    }

    #[test]
    fn test_well_used_term_is_neither() {
        let terms = vec![term("schema", 0.9, 4.0)];
        let (missing, underused) = classify_term_usage(&terms, &counts(&[("schema", 5)]));
        assert!(missing.is_empty());
        assert!(underused.is_empty());
    }
}
