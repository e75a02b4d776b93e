//! Internal-link suggestions between pages of the same audit project,
//! ranked by keyword and guideline-term relevance.

use std::collections::HashSet;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::guidelines::{fetch_guidelines, ContentGuidelinesRow};
use crate::models::page::{fetch_page, fetch_project_pages, AuditPageRow};
use crate::models::suggestion::{ChangeStatus, InternalLinkSuggestionRow};

pub const RELEVANCE_THRESHOLD: i32 = 60;
pub const MAX_SUGGESTIONS: usize = 10;

/// Terms considered for overlap: high importance only, capped at ten.
const OVERLAP_TERM_LIMIT: usize = 10;
const OVERLAP_IMPORTANCE_FLOOR: f64 = 0.6;

const ANCHOR_MAX_CHARS: usize = 60;

/// Relevance of linking from the source page to a target in the same
/// project: exact keyword match 50 (containment 25), term overlap up to 30,
/// plus a flat 20 for sharing the project.
pub fn relevance_score(
    source_keyword: Option<&str>,
    target_keyword: Option<&str>,
    source_terms: &[String],
    target_terms: &[String],
) -> i32 {
    let mut score = 0.0_f64;

    if let (Some(source), Some(target)) = (source_keyword, target_keyword) {
        let source = source.to_lowercase();
        let source = source.trim();
        let target = target.to_lowercase();
        let target = target.trim();

        if source == target {
            score += 50.0;
        } else if source.contains(target) || target.contains(source) {
            score += 25.0;
        }
    }

    if !source_terms.is_empty() && !target_terms.is_empty() {
        score += overlap_ratio(source_terms, target_terms) * 30.0;
    }

    score += 20.0;

    score.round() as i32
}

/// Shared-term ratio: |intersection| / max(|a|, |b|).
pub fn overlap_ratio(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set: HashSet<&String> = a.iter().collect();
    let intersection = b.iter().filter(|term| set.contains(term)).count();
    intersection as f64 / a.len().max(b.len()) as f64
}

/// High-importance guideline terms used for overlap comparison.
pub fn link_terms(guidelines: &ContentGuidelinesRow) -> Vec<String> {
    guidelines
        .terms()
        .into_iter()
        .filter(|t| t.importance > OVERLAP_IMPORTANCE_FLOOR)
        .map(|t| t.term_normalized.to_lowercase())
        .take(OVERLAP_TERM_LIMIT)
        .collect()
}

/// Anchor text priority: target's main keyword, then truncated title, then a
/// generic fallback.
pub fn anchor_text(main_keyword: Option<&str>, title: Option<&str>) -> String {
    if let Some(keyword) = main_keyword.filter(|k| !k.is_empty()) {
        return keyword.to_string();
    }
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        if title.chars().count() > ANCHOR_MAX_CHARS {
            let truncated: String = title.chars().take(ANCHOR_MAX_CHARS - 3).collect();
            return format!("{truncated}...");
        }
        return title.to_string();
    }
    "related content".to_string()
}

/// Generates and persists link suggestions from `page_id` to relevant pages
/// in the same project. Same idempotent-replace policy as auto-optimize.
pub async fn generate_link_suggestions(
    pool: &PgPool,
    page_id: Uuid,
) -> Result<Vec<InternalLinkSuggestionRow>, AppError> {
    info!("Generating link suggestions for page {page_id}");

    let source = fetch_page(pool, page_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Page not found: {page_id}")))?;

    let source_guidelines = fetch_guidelines(pool, page_id).await?.ok_or_else(|| {
        AppError::PreconditionFailed(
            "No content guidelines available. Run keyword analysis first.".to_string(),
        )
    })?;
    let source_terms = link_terms(&source_guidelines);

    let candidates = fetch_project_pages(pool, source.project_id).await?;
    let mut scored: Vec<(AuditPageRow, i32)> = Vec::new();

    for target in candidates {
        if target.id == page_id {
            continue;
        }
        // Only pages with their own guideline profile can be compared.
        let Some(target_guidelines) = fetch_guidelines(pool, target.id).await? else {
            continue;
        };
        let target_terms = link_terms(&target_guidelines);
        let score = relevance_score(
            source.main_keyword.as_deref(),
            target.main_keyword.as_deref(),
            &source_terms,
            &target_terms,
        );
        if score >= RELEVANCE_THRESHOLD {
            scored.push((target, score));
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(MAX_SUGGESTIONS);

    info!(
        "{} pages passed relevance threshold ({RELEVANCE_THRESHOLD}) for page {page_id}",
        scored.len()
    );

    sqlx::query("DELETE FROM internal_link_suggestions WHERE audit_page_id = $1 AND status = $2")
        .bind(page_id)
        .bind(ChangeStatus::Suggested)
        .execute(pool)
        .await?;

    let mut suggestions = Vec::with_capacity(scored.len());
    for (target, score) in &scored {
        let row = sqlx::query_as::<_, InternalLinkSuggestionRow>(
            r#"
            INSERT INTO internal_link_suggestions
                (audit_page_id, source_url, target_url, anchor_text, relevance_score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(page_id)
        .bind(&source.url)
        .bind(&target.url)
        .bind(anchor_text(
            target.main_keyword.as_deref(),
            target.title.as_deref(),
        ))
        .bind(score)
        .fetch_one(pool)
        .await?;
        suggestions.push(row);
    }

    info!("Created {} internal link suggestions for page {page_id}", suggestions.len());
    Ok(suggestions)
}

pub async fn apply_suggestion(
    pool: &PgPool,
    suggestion_id: Uuid,
) -> Result<InternalLinkSuggestionRow, AppError> {
    transition_suggestion(pool, suggestion_id, ChangeStatus::Applied).await
}

pub async fn reject_suggestion(
    pool: &PgPool,
    suggestion_id: Uuid,
) -> Result<InternalLinkSuggestionRow, AppError> {
    transition_suggestion(pool, suggestion_id, ChangeStatus::Rejected).await
}

async fn transition_suggestion(
    pool: &PgPool,
    suggestion_id: Uuid,
    to: ChangeStatus,
) -> Result<InternalLinkSuggestionRow, AppError> {
    let suggestion = sqlx::query_as::<_, InternalLinkSuggestionRow>(
        "SELECT * FROM internal_link_suggestions WHERE id = $1",
    )
    .bind(suggestion_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Suggestion not found: {suggestion_id}")))?;

    if suggestion.status != ChangeStatus::Suggested {
        return Err(AppError::PreconditionFailed(format!(
            "Suggestion is already {}. Only suggested links can be {}.",
            suggestion.status.as_str(),
            to.as_str()
        )));
    }

    let updated = sqlx::query_as::<_, InternalLinkSuggestionRow>(
        "UPDATE internal_link_suggestions SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(to)
    .bind(suggestion_id)
    .fetch_one(pool)
    .await?;

    info!("Link suggestion {suggestion_id} transitioned to {}", to.as_str());
    Ok(updated)
}

pub async fn list_suggestions(
    pool: &PgPool,
    page_id: Uuid,
    status: Option<ChangeStatus>,
) -> Result<Vec<InternalLinkSuggestionRow>, AppError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, InternalLinkSuggestionRow>(
                "SELECT * FROM internal_link_suggestions WHERE audit_page_id = $1 AND status = $2 ORDER BY created_at DESC",
            )
            .bind(page_id)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, InternalLinkSuggestionRow>(
                "SELECT * FROM internal_link_suggestions WHERE audit_page_id = $1 ORDER BY created_at DESC",
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

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_keyword_match_with_overlap_clears_threshold() {
        // 50 (exact) + 1.0 × 30 (full overlap) + 20 (project) = 100
        let score = relevance_score(
            Some("content audit"),
            Some("Content Audit"),
            &terms(&["audit", "crawl"]),
            &terms(&["audit", "crawl"]),
        );
        assert_eq!(score, 100);
        assert!(score >= RELEVANCE_THRESHOLD);
    }

    #[test]
    fn test_partial_keyword_containment_scores_25() {
        let score = relevance_score(
            Some("seo audit"),
            Some("audit"),
            &terms(&[]),
            &terms(&[]),
        );
        // 25 (containment) + 20 (project) = 45
        assert_eq!(score, 45);
        assert!(score < RELEVANCE_THRESHOLD);
    }

    #[test]
    fn test_no_keywords_scores_project_bonus_plus_overlap() {
        let score = relevance_score(
            None,
            None,
            &terms(&["audit", "crawl", "index", "schema"]),
            &terms(&["audit", "crawl"]),
        );
        // overlap 2/4 = 0.5 → 15, + 20 = 35
        assert_eq!(score, 35);
    }

    #[test]
    fn test_overlap_ratio_uses_larger_set_as_denominator() {
        let ratio = overlap_ratio(
            &terms(&["a", "b", "c", "d"]),
            &terms(&["a", "b"]),
        );
        assert!((ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overlap_ratio_empty_sets() {
        assert_eq!(overlap_ratio(&[], &terms(&["a"])), 0.0);
        assert_eq!(overlap_ratio(&terms(&["a"]), &[]), 0.0);
    }

    #[test]
    fn test_anchor_text_prefers_main_keyword() {
        assert_eq!(
            anchor_text(Some("crawl budget"), Some("A very long title")),
            "crawl budget"
        );
    }

    #[test]
    fn test_anchor_text_truncates_long_titles() {
        let title = "x".repeat(80);
        let anchor = anchor_text(None, Some(&title));
        assert_eq!(anchor.chars().count(), ANCHOR_MAX_CHARS);
        assert!(anchor.ends_with("..."));
    }

    #[test]
    fn test_anchor_text_keeps_short_titles_intact() {
        assert_eq!(
            anchor_text(None, Some("Short title")),
            "Short title"
        );
    }

    #[test]
    fn test_anchor_text_falls_back_to_generic() {
        assert_eq!(anchor_text(None, None), "related content");
        assert_eq!(anchor_text(Some(""), Some("")), "related content");
    }
}
