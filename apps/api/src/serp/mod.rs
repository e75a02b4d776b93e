#![allow(dead_code)]

//! Ranking lookup — top organic results for a keyword via the Serper.dev
//! search API. Failures here propagate as retryable job failures; the
//! fallback behavior for unreachable *competitor pages* lives in synthesis.

pub mod fetch;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::errors::AppError;

const SERPER_API_URL: &str = "https://google.serper.dev/search";
const SEARCH_TIMEOUT_SECS: u64 = 10;

/// One organic search result for the target keyword.
#[derive(Debug, Clone, Deserialize)]
pub struct SerpResult {
    pub position: i32,
    pub title: String,
    #[serde(rename = "link")]
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[async_trait]
pub trait RankingProvider: Send + Sync {
    async fn search(
        &self,
        keyword: &str,
        country: &str,
        language: &str,
    ) -> Result<Vec<SerpResult>, AppError>;
}

pub struct SerperClient {
    client: reqwest::Client,
    api_key: String,
}

impl SerperClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(SEARCH_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SerpResult>,
}

#[async_trait]
impl RankingProvider for SerperClient {
    async fn search(
        &self,
        keyword: &str,
        country: &str,
        language: &str,
    ) -> Result<Vec<SerpResult>, AppError> {
        info!("Searching for \"{keyword}\" in {country}/{language} via Serper.dev");

        let response = self
            .client
            .post(SERPER_API_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": keyword, "gl": country, "hl": language }))
            .send()
            .await
            .map_err(|e| AppError::External(format!("Serper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "Serper returned {status}: {body}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Serper response parse failed: {e}")))?;

        Ok(body.organic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serp_result_deserializes_serper_shape() {
        let json = r#"{
            "position": 1,
            "title": "Best SEO audit tools",
            "link": "https://example.com/audit-tools",
            "snippet": "A roundup of audit tooling."
        }"#;
        let result: SerpResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.position, 1);
        assert_eq!(result.url, "https://example.com/audit-tools");
        assert_eq!(result.snippet.as_deref(), Some("A roundup of audit tooling."));
    }

    #[test]
    fn test_search_response_tolerates_missing_organic() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.organic.is_empty());
    }
}
