//! Generative suggestion client — the single point of entry for all
//! generative-AI calls. No other module may call the Gemini API directly.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::guidelines::{ImportantTerm, TermUsage};
use crate::models::suggestion::ChangeType;

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const GENERATION_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const MAX_OUTPUT_TOKENS: u32 = 2048;
const TEMPERATURE: f64 = 0.7;

/// Input for one auto-optimize generation call.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionInput {
    pub page_text: String,
    pub keyword: String,
    pub language_code: String,
    pub missing_terms: Vec<ImportantTerm>,
    pub underused_terms: Vec<TermUsage>,
    pub current_word_count: usize,
    pub recommended_word_count: Option<(i32, i32)>,
}

/// A validated draft returned by the generator, ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftChange {
    pub change_type: ChangeType,
    /// Opaque JSON locator, stored serialized; only the editor interprets it.
    pub location: String,
    pub original_text: Option<String>,
    pub suggested_text: String,
    pub reasoning: Option<String>,
}

#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn generate(&self, input: &SuggestionInput) -> Result<Vec<DraftChange>, AppError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(GENERATION_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SuggestionGenerator for GeminiClient {
    async fn generate(&self, input: &SuggestionInput) -> Result<Vec<DraftChange>, AppError> {
        let prompt = format!(
            "{}\n\n{}",
            prompts::AUTO_OPTIMIZE_SYSTEM,
            prompts::auto_optimize_prompt(input)
        );

        let request_body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            }
        });

        let mut last_error: Option<AppError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Generation attempt {attempt} failed, retrying after {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(GEMINI_API_URL)
                .query(&[("key", self.api_key.as_str())])
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AppError::Ai(format!("Gemini request failed: {e}")));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Gemini returned {status}: {body}");
                last_error = Some(AppError::Ai(format!("Gemini returned {status}")));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Ai(format!("Gemini returned {status}: {body}")));
            }

            let parsed: GeminiResponse = response
                .json()
                .await
                .map_err(|e| AppError::Ai(format!("Gemini response parse failed: {e}")))?;

            let text = parsed
                .candidates
                .first()
                .and_then(|c| c.content.parts.first())
                .map(|p| p.text.as_str())
                .ok_or_else(|| AppError::Ai("Gemini returned empty content".to_string()))?;

            debug!("Gemini response: {}...", text.chars().take(200).collect::<String>());
            return parse_drafts(text);
        }

        Err(last_error.unwrap_or_else(|| AppError::Ai("Gemini call exhausted retries".to_string())))
    }
}

/// Parses and validates the model's JSON output. Malformed entries are
/// skipped with a warning, never coerced. The one exception is a structured
/// `location` object, which is normalized into its serialized form.
pub fn parse_drafts(text: &str) -> Result<Vec<DraftChange>, AppError> {
    let cleaned = strip_code_fences(text);

    let mut parsed: Value = serde_json::from_str(cleaned)
        .map_err(|e| AppError::Ai(format!("Suggestion payload is not valid JSON: {e}")))?;

    // Tolerate a wrapping {"changes": [...]} object.
    if let Some(inner) = parsed.get_mut("changes").map(Value::take) {
        parsed = inner;
    }

    let entries = parsed
        .as_array()
        .ok_or_else(|| AppError::Ai("Suggestion payload is not a JSON array".to_string()))?;

    let mut drafts = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match validate_draft(entry) {
            Some(draft) => drafts.push(draft),
            None => warn!("Skipping malformed suggestion draft at index {index}"),
        }
    }

    Ok(drafts)
}

fn validate_draft(entry: &Value) -> Option<DraftChange> {
    let change_type = entry
        .get("changeType")
        .and_then(Value::as_str)
        .and_then(ChangeType::parse)?;

    let suggested_text = entry
        .get("suggestedText")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())?
        .to_string();

    let location = match entry.get("location") {
        None | Some(Value::Null) => "{}".to_string(),
        Some(Value::Object(obj)) => serde_json::to_string(obj).ok()?,
        Some(Value::String(raw)) => {
            if serde_json::from_str::<Value>(raw).is_ok() {
                raw.clone()
            } else {
                warn!("Invalid location JSON in suggestion draft, using default");
                r#"{"paragraphIndex":0}"#.to_string()
            }
        }
        Some(_) => return None,
    };

    Some(DraftChange {
        change_type,
        location,
        original_text: entry
            .get("originalText")
            .and_then(Value::as_str)
            .map(str::to_string),
        suggested_text,
        reasoning: entry
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_json_tag() {
        let input = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fences(input), "[{\"a\": 1}]");
    }

    #[test]
    fn test_strip_code_fences_without_tag() {
        let input = "```\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fences(input), "[{\"a\": 1}]");
    }

    #[test]
    fn test_strip_code_fences_no_fences() {
        assert_eq!(strip_code_fences("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn test_parse_drafts_valid_array() {
        let text = r#"[
            {
                "changeType": "insert",
                "location": "{\"paragraphIndex\": 2}",
                "suggestedText": "Add a section on crawl budget.",
                "reasoning": "Covers a missing term."
            },
            {
                "changeType": "replace",
                "location": "{\"paragraphIndex\": 0}",
                "originalText": "old sentence",
                "suggestedText": "new sentence"
            }
        ]"#;
        let drafts = parse_drafts(text).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].change_type, ChangeType::Insert);
        assert_eq!(drafts[1].original_text.as_deref(), Some("old sentence"));
    }

    #[test]
    fn test_parse_drafts_unwraps_changes_object() {
        let text = r#"{"changes": [{"changeType": "delete", "suggestedText": "x"}]}"#;
        let drafts = parse_drafts(text).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].change_type, ChangeType::Delete);
        assert_eq!(drafts[0].location, "{}");
    }

    #[test]
    fn test_parse_drafts_skips_unknown_change_type() {
        let text = r#"[
            {"changeType": "rewrite", "suggestedText": "nope"},
            {"changeType": "insert", "suggestedText": "kept"}
        ]"#;
        let drafts = parse_drafts(text).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].suggested_text, "kept");
    }

    #[test]
    fn test_parse_drafts_skips_missing_suggested_text() {
        let text = r#"[{"changeType": "insert"}]"#;
        let drafts = parse_drafts(text).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_parse_drafts_normalizes_object_location() {
        let text = r#"[{
            "changeType": "insert",
            "location": {"paragraphIndex": 3, "sentenceIndex": 1},
            "suggestedText": "text"
        }]"#;
        let drafts = parse_drafts(text).unwrap();
        let location: Value = serde_json::from_str(&drafts[0].location).unwrap();
        assert_eq!(location["paragraphIndex"], 3);
        assert_eq!(location["sentenceIndex"], 1);
    }

    #[test]
    fn test_parse_drafts_defaults_unparseable_location_string() {
        let text = r#"[{
            "changeType": "insert",
            "location": "paragraph two",
            "suggestedText": "text"
        }]"#;
        let drafts = parse_drafts(text).unwrap();
        assert_eq!(drafts[0].location, r#"{"paragraphIndex":0}"#);
    }

    #[test]
    fn test_parse_drafts_rejects_non_array_payload() {
        assert!(parse_drafts(r#"{"notchanges": true}"#).is_err());
        assert!(parse_drafts("not json at all").is_err());
    }
}
