//! Redis list-backed queue substrate. Delivery is at-least-once; retry
//! bookkeeping travels with the payload in a JSON envelope.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use super::{Job, JobQueue};
use crate::errors::AppError;

pub const QUEUE_KEY: &str = "sitelens:jobs";

/// Delivery attempts per job before it is dropped as failed.
pub const MAX_ATTEMPTS: u32 = 3;

/// What actually sits on the Redis list: the payload plus delivery
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: Job,
    pub attempt: u32,
}

impl JobEnvelope {
    pub fn first(job: Job) -> Self {
        Self { job, attempt: 0 }
    }

    pub fn retry(&self) -> Self {
        Self {
            job: self.job.clone(),
            attempt: self.attempt + 1,
        }
    }
}

pub struct RedisJobQueue {
    client: redis::Client,
}

impl RedisJobQueue {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub async fn push(&self, envelope: &JobEnvelope) -> Result<(), AppError> {
        let payload =
            serde_json::to_string(envelope).map_err(|e| AppError::Internal(e.into()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::External(format!("Redis connection failed: {e}")))?;
        conn.rpush::<_, _, ()>(QUEUE_KEY, payload)
            .await
            .map_err(|e| AppError::External(format!("Redis RPUSH failed: {e}")))?;
        Ok(())
    }

    /// Blocking pop with a timeout. `Ok(None)` means the queue stayed empty.
    /// A payload that fails to decode is a poison message and surfaces as a
    /// Validation error for the caller to drop.
    pub async fn pop(&self, timeout_secs: f64) -> Result<Option<JobEnvelope>, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::External(format!("Redis connection failed: {e}")))?;
        let popped: Option<(String, String)> = conn
            .blpop(QUEUE_KEY, timeout_secs)
            .await
            .map_err(|e| AppError::External(format!("Redis BLPOP failed: {e}")))?;

        match popped {
            Some((_, payload)) => serde_json::from_str::<JobEnvelope>(&payload)
                .map(Some)
                .map_err(|e| AppError::Validation(format!("Malformed job payload: {e}"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), AppError> {
        self.push(&JobEnvelope::first(job)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_envelope_round_trips_with_attempt_counter() {
        let envelope = JobEnvelope::first(Job::EvaluatePageChanges {
            page_id: Uuid::new_v4(),
        });
        let encoded = serde_json::to_string(&envelope).unwrap();
        let decoded: JobEnvelope = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.attempt, 0);
    }

    #[test]
    fn test_retry_increments_attempt_and_keeps_job() {
        let envelope = JobEnvelope::first(Job::ImportPages {
            project_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        });
        let retry = envelope.retry();
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.job, envelope.job);
        assert_eq!(retry.retry().attempt, 2);
    }

    #[test]
    fn test_malformed_payload_is_a_validation_error() {
        let result = serde_json::from_str::<JobEnvelope>(r#"{"job": {"name": "nope"}}"#);
        assert!(result.is_err());
    }
}
