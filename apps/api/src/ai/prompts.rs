//! Prompt construction for the auto-optimize suggestion call.

use super::SuggestionInput;

pub const AUTO_OPTIMIZE_SYSTEM: &str = "You are an expert SEO content optimizer.";

/// Builds the auto-optimize prompt. The model must return a JSON array of
/// change drafts; anything else is rejected at parse time.
pub fn auto_optimize_prompt(input: &SuggestionInput) -> String {
    let missing_terms = if input.missing_terms.is_empty() {
        "(none)".to_string()
    } else {
        input
            .missing_terms
            .iter()
            .map(|t| format!("- \"{}\" (importance: {:.2})", t.term, t.importance))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let underused_terms = if input.underused_terms.is_empty() {
        "(none)".to_string()
    } else {
        input
            .underused_terms
            .iter()
            .map(|u| {
                format!(
                    "- \"{}\" (current: {}, recommended: {:.0})",
                    u.term.term, u.current_count, u.term.avg_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let word_count_guidance = match input.recommended_word_count {
        Some((min, max)) => format!("Recommended: {min}-{max} words"),
        None => "No specific word count guidance".to_string(),
    };

    format!(
        r#"CONTEXT:
- Target keyword: "{keyword}"
- Language: {language}
- Current word count: {current_word_count}
- {word_count_guidance}

MISSING IMPORTANT TERMS:
{missing_terms}

UNDERUSED TERMS:
{underused_terms}

CURRENT CONTENT:
{page_text}

TASK:
Generate 3-7 minimal, natural content improvements to boost SEO while maintaining readability.

RULES:
1. Use natural, fluent language matching the original tone
2. Integrate missing/underused terms contextually, not force them
3. Preserve the page's core message and style
4. Focus on semantic relevance, not keyword stuffing
5. Suggest specific edits with clear locations

OUTPUT FORMAT (JSON array):
[
  {{
    "changeType": "insert|replace|delete",
    "location": "{{\"paragraphIndex\": 2, \"sentenceIndex\": 1}}",
    "originalText": "text to replace (for replace type only)",
    "suggestedText": "new or replacement text",
    "reasoning": "Brief explanation of why this improves SEO"
  }}
]

LOCATION FORMAT:
- location is a JSON string with paragraphIndex (0-indexed) and optionally sentenceIndex
- For insert: position where to add new content
- For replace: position of text to replace
- For delete: position of text to remove

Return ONLY the JSON array, no additional text."#,
        keyword = input.keyword,
        language = input.language_code,
        current_word_count = input.current_word_count,
        word_count_guidance = word_count_guidance,
        missing_terms = missing_terms,
        underused_terms = underused_terms,
        page_text = input.page_text,
    )
}
