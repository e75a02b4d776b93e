use std::sync::Arc;

use sqlx::PgPool;

use crate::ai::SuggestionGenerator;
use crate::config::Config;
use crate::jobs::JobQueue;
use crate::nlp::TextAnalyzer;
use crate::serp::fetch::PageFetcher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Queue used by trigger endpoints; the worker side consumes the same substrate.
    pub queue: Arc<dyn JobQueue>,
    /// Single analyzer instance, constructed once and passed explicitly to
    /// every component that needs it.
    pub analyzer: Arc<TextAnalyzer>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub generator: Arc<dyn SuggestionGenerator>,
    pub config: Config,
}
