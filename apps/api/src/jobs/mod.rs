//! Asynchronous job pipeline: typed payloads, the Redis queue substrate, and
//! the worker dispatch loop.

pub mod queue;
pub mod worker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// A unit of queued work. Payloads are a tagged union (one variant per job
/// name), decoded and validated at the queue-consumption boundary before
/// dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum Job {
    ScorePage {
        page_id: Uuid,
        /// Pre-fetched page text; the worker fetches it when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_text: Option<String>,
    },
    AnalyzeKeyword {
        page_id: Uuid,
        keyword: String,
        country: String,
        language: String,
    },
    ImportPages {
        project_id: Uuid,
        user_id: Uuid,
    },
    EvaluatePageChanges {
        page_id: Uuid,
    },
    EvaluateProjectChanges {
        project_id: Uuid,
    },
}

impl Job {
    /// Queue-visible job name, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            Job::ScorePage { .. } => "score-page",
            Job::AnalyzeKeyword { .. } => "analyze-keyword",
            Job::ImportPages { .. } => "import-pages",
            Job::EvaluatePageChanges { .. } => "evaluate-page-changes",
            Job::EvaluateProjectChanges { .. } => "evaluate-project-changes",
        }
    }
}

/// Named job submission. At-least-once delivery is assumed: handlers must be
/// idempotent.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_serializes_with_kebab_case_name_tag() {
        let job = Job::AnalyzeKeyword {
            page_id: Uuid::nil(),
            keyword: "seo".to_string(),
            country: "us".to_string(),
            language: "en".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["name"], "analyze-keyword");
        assert_eq!(value["keyword"], "seo");
    }

    #[test]
    fn test_job_round_trips_through_json() {
        let job = Job::ScorePage {
            page_id: Uuid::new_v4(),
            page_text: None,
        };
        let encoded = serde_json::to_string(&job).unwrap();
        assert!(!encoded.contains("page_text"));
        let decoded: Job = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_unknown_job_name_fails_decoding() {
        let result = serde_json::from_str::<Job>(r#"{"name": "compact-index"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_job_name_matches_serde_tag() {
        let job = Job::EvaluateProjectChanges {
            project_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["name"], job.name());
    }
}
