//! Search-performance metrics import — the Search Console query API.
//! Token acquisition and refresh are the account service's concern; this
//! client only speaks the query protocol with a token it is handed.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::errors::AppError;

const SEARCH_CONSOLE_API: &str = "https://www.googleapis.com/webmasters/v3/sites";
const QUERY_TIMEOUT_SECS: u64 = 10;

/// One ranked page row from the metrics provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPageMetrics {
    pub url: String,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}

#[async_trait]
pub trait SearchMetricsProvider: Send + Sync {
    async fn fetch_top_pages(
        &self,
        property: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: i64,
    ) -> Result<Vec<RankedPageMetrics>, AppError>;
}

pub struct SearchConsoleClient {
    client: reqwest::Client,
    access_token: String,
}

impl SearchConsoleClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(QUERY_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            access_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

#[async_trait]
impl SearchMetricsProvider for SearchConsoleClient {
    async fn fetch_top_pages(
        &self,
        property: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: i64,
    ) -> Result<Vec<RankedPageMetrics>, AppError> {
        info!("Fetching top pages for {property} from {start_date} to {end_date}");

        let url = format!(
            "{SEARCH_CONSOLE_API}/{}/searchAnalytics/query",
            encode_property(property)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "startDate": start_date.format("%Y-%m-%d").to_string(),
                "endDate": end_date.format("%Y-%m-%d").to_string(),
                "dimensions": ["page"],
                "rowLimit": limit,
                "aggregationType": "byPage",
            }))
            .send()
            .await
            .map_err(|e| AppError::External(format!("Search Console request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "Search Console returned {status}: {body}"
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Search Console parse failed: {e}")))?;

        Ok(rows_to_metrics(body.rows))
    }
}

/// Rows without a page key carry nothing usable and are dropped.
fn rows_to_metrics(rows: Vec<QueryRow>) -> Vec<RankedPageMetrics> {
    rows.into_iter()
        .filter_map(|row| {
            let url = row.keys.into_iter().next()?;
            Some(RankedPageMetrics {
                url,
                clicks: row.clicks,
                impressions: row.impressions,
                ctr: row.ctr,
                position: row.position,
            })
        })
        .collect()
}

/// Percent-encodes a Search Console property id for use as a path segment
/// (e.g. `sc-domain:example.com`, `https://example.com/`).
fn encode_property(property: &str) -> String {
    property.replace('%', "%25").replace(':', "%3A").replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_property_domain_form() {
        assert_eq!(encode_property("sc-domain:example.com"), "sc-domain%3Aexample.com");
    }

    #[test]
    fn test_encode_property_url_prefix_form() {
        assert_eq!(
            encode_property("https://example.com/"),
            "https%3A%2F%2Fexample.com%2F"
        );
    }

    #[test]
    fn test_query_response_rows_without_keys_are_dropped() {
        let body: QueryResponse = serde_json::from_str(
            r#"{"rows": [
                {"keys": ["https://example.com/a"], "clicks": 12, "impressions": 300, "ctr": 0.04, "position": 7.2},
                {"clicks": 5}
            ]}"#,
        )
        .unwrap();
        let rows = rows_to_metrics(body.rows);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, "https://example.com/a");
        assert_eq!(rows[0].clicks, 12.0);
    }
}
