//! Text structuring: ask a language model to turn extracted text into a
//! lesson outline.
//!
//! The answer must be a JSON object `{ title, introduction, mainConcepts[],
//! conclusion }`. Anything else is an [`RecastError::InvalidOutline`]; a call
//! that keeps failing is a [`RecastError::StructuringFailed`].

use crate::config::RecastConfig;
use crate::error::RecastError;
use crate::pipeline::llm::{build_options, chat_with_retry, resolve_provider, RetryPolicy};
use crate::pipeline::postprocess::extract_json;
use crate::prompts::{
    structure_user_message, STRUCTURE_SYSTEM_PROMPT, TRANSCRIPT_SYSTEM_PROMPT, TRUNCATION_MARKER,
};
use edgequake_llm::{ChatMessage, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Token budget for a transcript summary; it is a single section.
const TRANSCRIPT_MAX_TOKENS: usize = 1000;

/// One main concept of the outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSection {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// A structured lesson produced from the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutline {
    pub title: String,
    pub introduction: String,
    #[serde(rename = "mainConcepts", alias = "sections")]
    pub sections: Vec<OutlineSection>,
    pub conclusion: String,
}

impl DocumentOutline {
    /// Reject outlines with empty required fields.
    pub fn validate(&self) -> Result<(), RecastError> {
        let missing = |field: &str| RecastError::InvalidOutline(format!("'{field}' is missing or empty"));
        if self.title.trim().is_empty() {
            return Err(missing("title"));
        }
        if self.introduction.trim().is_empty() {
            return Err(missing("introduction"));
        }
        if self.conclusion.trim().is_empty() {
            return Err(missing("conclusion"));
        }
        Ok(())
    }
}

/// A single lesson section produced from a video transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSummary {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Parse and validate a structuring answer.
pub fn parse_outline(answer: &str) -> Result<DocumentOutline, RecastError> {
    let json = extract_json(answer);
    let outline: DocumentOutline =
        serde_json::from_str(&json).map_err(|e| RecastError::InvalidOutline(e.to_string()))?;
    outline.validate()?;
    Ok(outline)
}

/// Parse and validate a transcript summary answer.
pub fn parse_transcript_summary(answer: &str) -> Result<TranscriptSummary, RecastError> {
    let json = extract_json(answer);
    let summary: TranscriptSummary =
        serde_json::from_str(&json).map_err(|e| RecastError::InvalidOutline(e.to_string()))?;
    if summary.title.trim().is_empty() || summary.content.trim().is_empty() {
        return Err(RecastError::InvalidOutline(
            "transcript summary needs a title and content".into(),
        ));
    }
    Ok(summary)
}

/// Structure `text` with the provider resolved from `config`.
pub async fn structure_text(
    text: &str,
    image_count: usize,
    config: &RecastConfig,
) -> Result<DocumentOutline, RecastError> {
    let provider = resolve_provider(config)?;
    structure_text_with(&provider, text, image_count, config).await
}

/// Structure `text` with an explicit provider.
pub async fn structure_text_with(
    provider: &Arc<dyn LLMProvider>,
    text: &str,
    image_count: usize,
    config: &RecastConfig,
) -> Result<DocumentOutline, RecastError> {
    if text.trim().is_empty() {
        return Err(RecastError::InvalidInput {
            input: "empty source text".into(),
        });
    }

    let input = truncate_input(text, config.max_input_chars);
    debug!(
        "Structuring {} chars ({} images)",
        input.chars().count(),
        image_count
    );

    let system = config
        .system_prompt
        .as_deref()
        .unwrap_or(STRUCTURE_SYSTEM_PROMPT);
    let messages = vec![
        ChatMessage::system(system),
        ChatMessage::user(structure_user_message(&input, image_count)),
    ];
    let options = build_options(config.temperature, config.max_tokens);
    let policy = RetryPolicy::from_config(config);

    let answer = chat_with_retry(provider, &messages, &options, policy, "Structuring")
        .await
        .map_err(|detail| RecastError::StructuringFailed {
            retries: config.max_retries,
            detail,
        })?;

    let outline = parse_outline(&answer)?;
    info!(
        "Outline '{}' with {} sections",
        outline.title,
        outline.sections.len()
    );
    Ok(outline)
}

/// Summarise a video transcript into one lesson section.
pub async fn summarize_transcript_with(
    provider: &Arc<dyn LLMProvider>,
    transcript: &str,
    config: &RecastConfig,
) -> Result<TranscriptSummary, RecastError> {
    if transcript.trim().is_empty() {
        return Err(RecastError::InvalidInput {
            input: "empty transcript".into(),
        });
    }

    let messages = vec![
        ChatMessage::system(TRANSCRIPT_SYSTEM_PROMPT),
        ChatMessage::user(truncate_input(transcript, config.max_input_chars)),
    ];
    let options = build_options(config.temperature, TRANSCRIPT_MAX_TOKENS);
    let policy = RetryPolicy::from_config(config);

    let answer = chat_with_retry(provider, &messages, &options, policy, "Transcript")
        .await
        .map_err(|detail| RecastError::StructuringFailed {
            retries: config.max_retries,
            detail,
        })?;
    parse_transcript_summary(&answer)
}

/// Summarise a video transcript with the provider resolved from `config`.
pub async fn summarize_transcript(
    transcript: &str,
    config: &RecastConfig,
) -> Result<TranscriptSummary, RecastError> {
    let provider = resolve_provider(config)?;
    summarize_transcript_with(&provider, transcript, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = r#"```json
{
  "title": "Plate tectonics",
  "introduction": "The crust moves.",
  "mainConcepts": [
    {"title": "Plates", "content": "Rigid slabs.", "keyPoints": ["seven major plates"]},
    {"title": "Boundaries", "content": "Where plates meet."}
  ],
  "conclusion": "Everything moves, slowly."
}
```"#;

    #[test]
    fn parses_fenced_answer() {
        let outline = parse_outline(ANSWER).unwrap();
        assert_eq!(outline.title, "Plate tectonics");
        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[0].key_points, vec!["seven major plates"]);
        assert!(outline.sections[1].key_points.is_empty());
    }

    #[test]
    fn accepts_sections_alias() {
        let json = r#"{"title":"T","introduction":"I","sections":[],"conclusion":"C"}"#;
        assert!(parse_outline(json).unwrap().sections.is_empty());
    }

    #[test]
    fn rejects_empty_conclusion() {
        let json = r#"{"title":"T","introduction":"I","mainConcepts":[],"conclusion":"  "}"#;
        assert!(matches!(
            parse_outline(json),
            Err(RecastError::InvalidOutline(_))
        ));
    }

    #[test]
    fn rejects_missing_sections() {
        let json = r#"{"title":"T","introduction":"I","conclusion":"C"}"#;
        assert!(matches!(
            parse_outline(json),
            Err(RecastError::InvalidOutline(_))
        ));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_outline("I cannot help with that.").is_err());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(10);
        let cut = truncate_input(&text, 4);
        assert!(cut.starts_with("éééé\n["));
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncate_input("short", 10), "short");
    }

    #[test]
    fn transcript_summary_parses() {
        let s = parse_transcript_summary(
            r#"{"title":"Intro","content":"Body","keyPoints":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(s.key_points.len(), 2);
    }

    #[test]
    fn outline_serialises_with_camel_case_keys() {
        let outline = parse_outline(ANSWER).unwrap();
        let json = serde_json::to_string(&outline).unwrap();
        assert!(json.contains("\"mainConcepts\""));
        assert!(json.contains("\"keyPoints\""));
    }
}
