use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a proposed edit or link. `applied` and `rejected` are
/// terminal; only `suggested` rows may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "change_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Suggested,
    Applied,
    Rejected,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Suggested => "suggested",
            ChangeStatus::Applied => "applied",
            ChangeStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "change_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Replace,
    Delete,
}

impl ChangeType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(ChangeType::Insert),
            "replace" => Some(ChangeType::Replace),
            "delete" => Some(ChangeType::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Drop,
    Rise,
}

/// An AI-drafted content edit. `location` is an opaque JSON locator only
/// interpreted by the editor collaborator; it round-trips as a string.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AutoOptimizeChangeRow {
    pub id: Uuid,
    pub audit_page_id: Uuid,
    pub change_type: ChangeType,
    pub location: String,
    pub original_text: Option<String>,
    pub suggested_text: String,
    pub reasoning: Option<String>,
    pub status: ChangeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InternalLinkSuggestionRow {
    pub id: Uuid,
    pub audit_page_id: Uuid,
    pub source_url: String,
    pub target_url: String,
    pub anchor_text: String,
    pub relevance_score: i32,
    pub status: ChangeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub audit_page_id: Uuid,
    pub alert_type: AlertType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_parse_accepts_known_kinds() {
        assert_eq!(ChangeType::parse("insert"), Some(ChangeType::Insert));
        assert_eq!(ChangeType::parse("replace"), Some(ChangeType::Replace));
        assert_eq!(ChangeType::parse("delete"), Some(ChangeType::Delete));
    }

    #[test]
    fn test_change_type_parse_rejects_unknown_kinds() {
        assert_eq!(ChangeType::parse("rewrite"), None);
        assert_eq!(ChangeType::parse(""), None);
    }

    #[test]
    fn test_change_status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeStatus::Suggested).unwrap(),
            r#""suggested""#
        );
    }
}
