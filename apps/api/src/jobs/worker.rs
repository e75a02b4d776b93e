//! Worker loop and job handlers. Dependencies between jobs are causal:
//! a handler that produces a dependency re-enqueues the dependent job
//! itself, so forward progress never relies on polling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::queue::{JobEnvelope, RedisJobQueue, MAX_ATTEMPTS};
use super::{Job, JobQueue};
use crate::audit::scoring;
use crate::audit::synthesize::synthesize_guidelines;
use crate::errors::AppError;
use crate::metrics::SearchMetricsProvider;
use crate::models::guidelines::fetch_guidelines;
use crate::models::page::{
    fetch_page, fetch_project, fetch_project_pages, set_analysis_state, update_score,
    upsert_page_metrics, AnalysisState, AuditPageRow,
};
use crate::models::suggestion::AlertType;
use crate::nlp::TextAnalyzer;
use crate::serp::fetch::PageFetcher;
use crate::serp::RankingProvider;

const POP_TIMEOUT_SECS: f64 = 5.0;
const IMPORT_WINDOW_DAYS: i64 = 30;

/// Keyword used when a page carries neither a main keyword nor a title.
const DEFAULT_KEYWORD: &str = "seo";

const DROP_THRESHOLD_PCT: f64 = -30.0;
const RISE_THRESHOLD_PCT: f64 = 50.0;

/// How one job execution ended. Deferral is expected control flow, not an
/// error: scoring defers while guidelines are being synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Deferred,
}

/// Shared dependencies for all job handlers.
pub struct JobWorker {
    db: PgPool,
    queue: Arc<dyn JobQueue>,
    analyzer: Arc<TextAnalyzer>,
    fetcher: Arc<dyn PageFetcher>,
    ranking: Arc<dyn RankingProvider>,
    search_metrics: Arc<dyn SearchMetricsProvider>,
    /// Per-page leases. Duplicate jobs for the same page serialize here
    /// instead of racing on the score fields.
    page_locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
}

/// Consumes the queue until the process exits. Multiple workers run this
/// loop concurrently; ordering holds only within one page's causal chain.
pub async fn run_worker(worker: Arc<JobWorker>, queue: Arc<RedisJobQueue>, worker_id: usize) {
    info!("Job worker {worker_id} started");
    loop {
        match queue.pop(POP_TIMEOUT_SECS).await {
            Ok(Some(envelope)) => worker.process(envelope, &queue).await,
            Ok(None) => continue,
            Err(AppError::Validation(msg)) => {
                // Poison message: drop it, the queue must keep draining.
                error!("Worker {worker_id} dropping undecodable job: {msg}");
            }
            Err(e) => {
                warn!("Worker {worker_id} queue pop failed: {e}");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

impl JobWorker {
    pub fn new(
        db: PgPool,
        queue: Arc<dyn JobQueue>,
        analyzer: Arc<TextAnalyzer>,
        fetcher: Arc<dyn PageFetcher>,
        ranking: Arc<dyn RankingProvider>,
        search_metrics: Arc<dyn SearchMetricsProvider>,
    ) -> Self {
        Self {
            db,
            queue,
            analyzer,
            fetcher,
            ranking,
            search_metrics,
            page_locks: DashMap::new(),
        }
    }

    async fn process(&self, envelope: JobEnvelope, queue: &Arc<RedisJobQueue>) {
        let name = envelope.job.name();
        info!("Processing job {name} (attempt {})", envelope.attempt + 1);

        match self.execute(&envelope.job).await {
            Ok(JobOutcome::Completed) => info!("Job {name} completed"),
            Ok(JobOutcome::Deferred) => info!("Job {name} deferred"),
            Err(e) if e.is_retryable() && envelope.attempt + 1 < MAX_ATTEMPTS => {
                warn!(
                    "Job {name} failed on attempt {}: {e}; re-enqueueing",
                    envelope.attempt + 1
                );
                let retry = envelope.retry();
                let queue = Arc::clone(queue);
                tokio::spawn(async move {
                    tokio::time::sleep(backoff_delay(retry.attempt)).await;
                    if let Err(e) = queue.push(&retry).await {
                        error!("Failed to re-enqueue {}: {e}", retry.job.name());
                    }
                });
            }
            Err(e) if e.is_retryable() => {
                error!("Job {name} failed after {MAX_ATTEMPTS} attempts: {e}")
            }
            Err(e) => error!("Job {name} failed permanently: {e}"),
        }
    }

    /// Dispatches a decoded job to its handler.
    pub async fn execute(&self, job: &Job) -> Result<JobOutcome, AppError> {
        match job {
            Job::ScorePage { page_id, page_text } => {
                self.handle_score_page(*page_id, page_text.as_deref()).await
            }
            Job::AnalyzeKeyword {
                page_id,
                keyword,
                country,
                language,
            } => {
                self.handle_analyze_keyword(*page_id, keyword, country, language)
                    .await
            }
            Job::ImportPages {
                project_id,
                user_id,
            } => self.handle_import_pages(*project_id, *user_id).await,
            Job::EvaluatePageChanges { page_id } => {
                self.handle_evaluate_page_changes(*page_id).await
            }
            Job::EvaluateProjectChanges { project_id } => {
                self.handle_evaluate_project_changes(*project_id).await
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // score-page
    // ────────────────────────────────────────────────────────────────────

    async fn handle_score_page(
        &self,
        page_id: Uuid,
        page_text: Option<&str>,
    ) -> Result<JobOutcome, AppError> {
        let lease = self.page_lease(page_id);
        let _guard = lease.lock().await;

        // Stale-job guard: a page deleted after enqueue fails fast and
        // terminally here.
        let page = fetch_page(&self.db, page_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page not found: {page_id}")))?;

        let Some(guidelines) = fetch_guidelines(&self.db, page_id).await? else {
            let project = fetch_project(&self.db, page.project_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Project not found: {}", page.project_id))
                })?;
            let keyword = resolve_keyword(page.main_keyword.as_deref(), page.title.as_deref());

            info!("Page {page_id} has no guidelines; deferring to keyword analysis (\"{keyword}\")");
            set_analysis_state(&self.db, page_id, AnalysisState::AwaitingGuideline).await?;
            self.queue
                .enqueue(Job::AnalyzeKeyword {
                    page_id,
                    keyword,
                    country: project.primary_country,
                    language: project.language_code,
                })
                .await?;
            return Ok(JobOutcome::Deferred);
        };

        let text = match page_text {
            Some(text) => text.to_string(),
            None => {
                info!("Fetching content for page {page_id} ({})", page.url);
                self.fetcher
                    .fetch(&page.url)
                    .await
                    .map(|fetched| fetched.body_text)
                    .ok_or_else(|| {
                        AppError::External(format!(
                            "Failed to fetch content for page {page_id} ({})",
                            page.url
                        ))
                    })?
            }
        };

        let result = scoring::score(&self.analyzer, &text, &guidelines);
        update_score(
            &self.db,
            page_id,
            result.content_score,
            result.recommendation.as_str(),
            result.recommendation_score,
        )
        .await?;

        info!("Scored page {page_id}: {}", result.content_score);
        Ok(JobOutcome::Completed)
    }

    // ────────────────────────────────────────────────────────────────────
    // analyze-keyword
    // ────────────────────────────────────────────────────────────────────

    async fn handle_analyze_keyword(
        &self,
        page_id: Uuid,
        keyword: &str,
        country: &str,
        language: &str,
    ) -> Result<JobOutcome, AppError> {
        let lease = self.page_lease(page_id);
        let _guard = lease.lock().await;

        fetch_page(&self.db, page_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page not found: {page_id}")))?;

        synthesize_guidelines(
            &self.db,
            &self.analyzer,
            self.ranking.as_ref(),
            self.fetcher.as_ref(),
            page_id,
            keyword,
            country,
            language,
        )
        .await?;

        set_analysis_state(&self.db, page_id, AnalysisState::Ready).await?;

        // Unconditional re-enqueue: scoring resumes without anyone polling.
        self.queue
            .enqueue(Job::ScorePage {
                page_id,
                page_text: None,
            })
            .await?;

        info!("Triggered scoring for page {page_id}");
        Ok(JobOutcome::Completed)
    }

    // ────────────────────────────────────────────────────────────────────
    // import-pages
    // ────────────────────────────────────────────────────────────────────

    async fn handle_import_pages(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<JobOutcome, AppError> {
        let project = fetch_project(&self.db, project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project not found: {project_id}")))?;

        let end_date = Utc::now().date_naive();
        let start_date = end_date - chrono::Duration::days(IMPORT_WINDOW_DAYS);

        info!(
            "Importing pages for project {project_id} (user {user_id}, property {})",
            project.gsc_property
        );

        let rows = self
            .search_metrics
            .fetch_top_pages(
                &project.gsc_property,
                start_date,
                end_date,
                project.max_pages as i64,
            )
            .await?;

        let mut imported = 0usize;
        for row in &rows {
            // Per-row failures never abort the batch.
            match upsert_page_metrics(&self.db, project_id, row).await {
                Ok(()) => imported += 1,
                Err(e) => warn!("Skipping page {}: {e}", row.url),
            }
        }

        info!("Imported {imported}/{} pages for project {project_id}", rows.len());
        Ok(JobOutcome::Completed)
    }

    // ────────────────────────────────────────────────────────────────────
    // evaluate-page-changes / evaluate-project-changes
    // ────────────────────────────────────────────────────────────────────

    async fn handle_evaluate_page_changes(&self, page_id: Uuid) -> Result<JobOutcome, AppError> {
        let page = fetch_page(&self.db, page_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page not found: {page_id}")))?;

        let alerts = evaluate_page(&page);
        for alert in &alerts {
            insert_alert(&self.db, page_id, alert).await?;
        }

        info!("Evaluated page {page_id}: {} alerts created", alerts.len());
        Ok(JobOutcome::Completed)
    }

    async fn handle_evaluate_project_changes(
        &self,
        project_id: Uuid,
    ) -> Result<JobOutcome, AppError> {
        let pages = fetch_project_pages(&self.db, project_id).await?;
        info!("Evaluating {} pages for project {project_id}", pages.len());

        let mut total = 0usize;
        for page in &pages {
            let alerts = evaluate_page(page);
            for alert in &alerts {
                insert_alert(&self.db, page.id, alert).await?;
            }
            total += alerts.len();
        }

        info!("Evaluated project {project_id}: {total} alerts created");
        Ok(JobOutcome::Completed)
    }

    fn page_lease(&self, page_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.page_locks
            .entry(page_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(6))
}

/// Keyword for analysis: main keyword, falling back to the title, then a
/// generic default.
pub fn resolve_keyword(main_keyword: Option<&str>, title: Option<&str>) -> String {
    main_keyword
        .filter(|k| !k.trim().is_empty())
        .or(title.filter(|t| !t.trim().is_empty()))
        .unwrap_or(DEFAULT_KEYWORD)
        .to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub message: String,
}

/// Drafts alerts from a page's current vs previous metric window. Both
/// directions use the same percentage-change formula; a metric without a
/// previous value is skipped.
pub fn evaluate_page(page: &AuditPageRow) -> Vec<AlertDraft> {
    let mut alerts = Vec::new();

    if let (Some(prev), Some(current)) = (page.prev_clicks_30d, page.clicks_30d) {
        if let Some(alert) = metric_alert("Clicks", prev, current) {
            alerts.push(alert);
        }
    }
    if let (Some(prev), Some(current)) = (page.prev_impressions_30d, page.impressions_30d) {
        if let Some(alert) = metric_alert("Impressions", prev, current) {
            alerts.push(alert);
        }
    }

    alerts
}

fn metric_alert(metric: &str, prev: i32, current: i32) -> Option<AlertDraft> {
    let change = percentage_change(prev, current);
    if change <= DROP_THRESHOLD_PCT {
        Some(AlertDraft {
            alert_type: AlertType::Drop,
            message: format!(
                "{metric} dropped by {:.1}% ({prev} → {current})",
                change.abs()
            ),
        })
    } else if change >= RISE_THRESHOLD_PCT {
        Some(AlertDraft {
            alert_type: AlertType::Rise,
            message: format!("{metric} increased by {change:.1}% ({prev} → {current})"),
        })
    } else {
        None
    }
}

/// `(new − old) / old × 100`, with a zero old value defined as +100% when
/// anything appeared and 0% otherwise.
pub fn percentage_change(old: i32, new: i32) -> f64 {
    if old == 0 {
        return if new > 0 { 100.0 } else { 0.0 };
    }
    (new - old) as f64 / old as f64 * 100.0
}

async fn insert_alert(pool: &PgPool, page_id: Uuid, alert: &AlertDraft) -> Result<(), AppError> {
    sqlx::query("INSERT INTO alerts (audit_page_id, alert_type, message) VALUES ($1, $2, $3)")
        .bind(page_id)
        .bind(alert.alert_type)
        .bind(&alert.message)
        .execute(pool)
        .await?;
    Ok(())
}
