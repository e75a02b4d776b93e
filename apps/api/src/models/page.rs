use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::metrics::RankedPageMetrics;

/// Where a page sits in the scoring pipeline. Stored on the page row so the
/// analyze-keyword → score-page chain is inspectable from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "analysis_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    AwaitingGuideline,
    Ready,
    Scored,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditProjectRow {
    pub id: Uuid,
    pub gsc_property: String,
    pub primary_country: String,
    pub language_code: String,
    pub max_pages: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditPageRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub main_keyword: Option<String>,
    pub avg_position: Option<f64>,
    pub clicks_30d: Option<i32>,
    pub impressions_30d: Option<i32>,
    pub ctr_30d: Option<f64>,
    pub prev_clicks_30d: Option<i32>,
    pub prev_impressions_30d: Option<i32>,
    pub prev_ctr_30d: Option<f64>,
    pub content_score: Option<i32>,
    pub recommendation: Option<String>,
    pub recommendation_score: Option<i32>,
    pub analysis_state: AnalysisState,
    pub last_analysed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn fetch_page(pool: &PgPool, page_id: Uuid) -> Result<Option<AuditPageRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditPageRow>("SELECT * FROM audit_pages WHERE id = $1")
        .bind(page_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_project(
    pool: &PgPool,
    project_id: Uuid,
) -> Result<Option<AuditProjectRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditProjectRow>("SELECT * FROM audit_projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_project_pages(
    pool: &PgPool,
    project_id: Uuid,
) -> Result<Vec<AuditPageRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditPageRow>("SELECT * FROM audit_pages WHERE project_id = $1")
        .bind(project_id)
        .fetch_all(pool)
        .await
}

pub async fn set_analysis_state(
    pool: &PgPool,
    page_id: Uuid,
    state: AnalysisState,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE audit_pages SET analysis_state = $1, updated_at = NOW() WHERE id = $2")
        .bind(state)
        .bind(page_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Overwrites the page's score fields. Scores are mutable, not versioned.
pub async fn update_score(
    pool: &PgPool,
    page_id: Uuid,
    content_score: i32,
    recommendation: &str,
    recommendation_score: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE audit_pages
        SET content_score = $1,
            recommendation = $2,
            recommendation_score = $3,
            analysis_state = 'scored',
            last_analysed_at = NOW(),
            updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(content_score)
    .bind(recommendation)
    .bind(recommendation_score)
    .bind(page_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Upserts one imported metrics row, keyed (project, url). On update the
/// current window shifts into the prev_* columns so delta alerts have a
/// baseline to compare against.
pub async fn upsert_page_metrics(
    pool: &PgPool,
    project_id: Uuid,
    metrics: &RankedPageMetrics,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_pages (project_id, url, clicks_30d, impressions_30d, ctr_30d, avg_position)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (project_id, url) DO UPDATE SET
            prev_clicks_30d = audit_pages.clicks_30d,
            prev_impressions_30d = audit_pages.impressions_30d,
            prev_ctr_30d = audit_pages.ctr_30d,
            clicks_30d = EXCLUDED.clicks_30d,
            impressions_30d = EXCLUDED.impressions_30d,
            ctr_30d = EXCLUDED.ctr_30d,
            avg_position = EXCLUDED.avg_position,
            updated_at = NOW()
        "#,
    )
    .bind(project_id)
    .bind(&metrics.url)
    .bind(metrics.clicks.round() as i32)
    .bind(metrics.impressions.round() as i32)
    .bind(metrics.ctr)
    .bind(metrics.position)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_state_serde_round_trip() {
        let json = serde_json::to_string(&AnalysisState::AwaitingGuideline).unwrap();
        assert_eq!(json, r#""awaiting_guideline""#);
        let back: AnalysisState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AnalysisState::AwaitingGuideline);
    }
}
