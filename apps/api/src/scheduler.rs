//! Periodic triggers. Stale pages are re-scored and project metrics are
//! re-evaluated for alerts on fixed intervals; both paths only enqueue jobs
//! and leave the actual work to the queue.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::jobs::{Job, JobQueue};

const RESCORE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const ALERTS_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Pages unscored for this long are considered stale.
const STALE_AFTER_DAYS: i32 = 7;
/// Cap per re-scoring sweep so one tick cannot flood the queue.
const RESCORE_BATCH: i64 = 100;

pub async fn run(db: PgPool, queue: Arc<dyn JobQueue>) {
    info!("Scheduler started");
    let mut rescore = tokio::time::interval(RESCORE_INTERVAL);
    let mut alerts = tokio::time::interval(ALERTS_INTERVAL);

    loop {
        tokio::select! {
            _ = rescore.tick() => {
                if let Err(e) = enqueue_stale_rescores(&db, queue.as_ref()).await {
                    error!("Stale re-scoring sweep failed: {e}");
                }
            }
            _ = alerts.tick() => {
                if let Err(e) = enqueue_alert_evaluations(&db, queue.as_ref()).await {
                    error!("Alert evaluation sweep failed: {e}");
                }
            }
        }
    }
}

/// Enqueues score-page for pages never analysed or analysed too long ago,
/// oldest first.
async fn enqueue_stale_rescores(db: &PgPool, queue: &dyn JobQueue) -> anyhow::Result<()> {
    let page_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM audit_pages
        WHERE last_analysed_at IS NULL
           OR last_analysed_at < NOW() - make_interval(days => $1)
        ORDER BY last_analysed_at ASC NULLS FIRST
        LIMIT $2
        "#,
    )
    .bind(STALE_AFTER_DAYS)
    .bind(RESCORE_BATCH)
    .fetch_all(db)
    .await?;

    info!("Queueing re-analysis for {} stale pages", page_ids.len());
    for page_id in page_ids {
        if let Err(e) = queue
            .enqueue(Job::ScorePage {
                page_id,
                page_text: None,
            })
            .await
        {
            error!("Failed to queue re-analysis for page {page_id}: {e}");
        }
    }
    Ok(())
}

async fn enqueue_alert_evaluations(db: &PgPool, queue: &dyn JobQueue) -> anyhow::Result<()> {
    let project_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM audit_projects")
        .fetch_all(db)
        .await?;

    info!("Queueing alert evaluation for {} projects", project_ids.len());
    for project_id in project_ids {
        if let Err(e) = queue
            .enqueue(Job::EvaluateProjectChanges { project_id })
            .await
        {
            error!("Failed to queue alert evaluation for project {project_id}: {e}");
        }
    }
    Ok(())
}
