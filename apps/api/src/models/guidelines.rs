use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One term's competitive signal inside a guideline profile.
///
/// `importance` is a relative weight in [0, 1] and is only comparable within
/// the profile that produced it. `term_normalized` is the lowercased join key
/// used for coverage lookups (substring containment, not stemming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportantTerm {
    pub term: String,
    pub term_normalized: String,
    pub importance: f64,
    pub min_count: i32,
    pub max_count: i32,
    pub avg_count: f64,
    pub percentage_present: f64,
}

/// A guideline term together with how often the audited page currently uses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermUsage {
    pub term: ImportantTerm,
    pub current_count: usize,
}

/// The competitive benchmark for one (page, keyword) pair. At most one row
/// per audited page; recreated wholesale on each re-analysis.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentGuidelinesRow {
    pub id: Uuid,
    pub audit_page_id: Uuid,
    pub keyword: String,
    pub language_code: String,
    pub country: String,
    pub min_words: Option<i32>,
    pub max_words: Option<i32>,
    pub avg_words: Option<i32>,
    pub avg_h1_count: Option<i32>,
    pub avg_h2_count: Option<i32>,
    pub avg_h3_count: Option<i32>,
    pub competitor_count: i32,
    pub important_terms: Value,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ContentGuidelinesRow {
    /// Decodes the JSONB term list. A malformed column is a programmer error,
    /// not an expected runtime branch; it degrades to an empty list.
    pub fn terms(&self) -> Vec<ImportantTerm> {
        serde_json::from_value(self.important_terms.clone()).unwrap_or_default()
    }
}

pub async fn fetch_guidelines(
    pool: &PgPool,
    page_id: Uuid,
) -> Result<Option<ContentGuidelinesRow>, sqlx::Error> {
    sqlx::query_as::<_, ContentGuidelinesRow>(
        "SELECT * FROM content_guidelines WHERE audit_page_id = $1",
    )
    .bind(page_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_row(important_terms: Value) -> ContentGuidelinesRow {
        ContentGuidelinesRow {
            id: Uuid::new_v4(),
            audit_page_id: Uuid::new_v4(),
            keyword: "seo audit".to_string(),
            language_code: "en".to_string(),
            country: "us".to_string(),
            min_words: Some(900),
            max_words: Some(1650),
            avg_words: Some(1200),
            avg_h1_count: Some(1),
            avg_h2_count: Some(4),
            avg_h3_count: Some(2),
            competitor_count: 5,
            important_terms,
            last_updated: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_terms_decodes_jsonb_list() {
        let row = make_row(json!([{
            "term": "audit",
            "term_normalized": "audit",
            "importance": 0.8,
            "min_count": 1,
            "max_count": 9,
            "avg_count": 4.2,
            "percentage_present": 100.0
        }]));
        let terms = row.terms();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term_normalized, "audit");
        assert!((terms[0].importance - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_terms_degrades_to_empty_on_malformed_column() {
        let row = make_row(json!({"not": "a list"}));
        assert!(row.terms().is_empty());
    }
}
