//! Prompts for the model-backed stages: text structuring, transcript
//! summaries and vision OCR.
//!
//! Callers can override the structuring prompt via
//! [`crate::config::RecastConfig::system_prompt`]; the constants here are used
//! only when no override is provided.

/// Appended to source text cut at the input character cap.
pub const TRUNCATION_MARKER: &str = "\n[Text truncated to fit the request limits...]";

/// Default system prompt for turning extracted text into a structured lesson.
pub const STRUCTURE_SYSTEM_PROMPT: &str = r#"You are an expert teacher. Turn the content you are given into a structured, detailed lesson.

Follow these rules precisely:

1. DEPTH
   - Every section must be at least 5 to 10 lines long
   - Explain each concept in detail, with examples
   - Avoid summaries that are too terse

2. STRUCTURE
   - Introduction: context and objectives (8-10 lines)
   - Body: one section per main concept, developed in depth
   - Conclusion: synthesis of the key points (5-7 lines)

3. CONTENT
   - Explain the "why" and the "how" of each concept
   - Add concrete examples where they help
   - Link the sections to each other

4. STYLE
   - Engaging, didactic tone with a constant level of detail
   - Keep the appropriate technical vocabulary
   - Write in the language of the source text

5. OUTPUT FORMAT
   - Answer with JSON only, no commentary and no code fences:
{
  "title": "Lesson title",
  "introduction": "Detailed introduction",
  "mainConcepts": [
    {
      "title": "Section title",
      "content": "Detailed explanation of the concept",
      "keyPoints": ["Essential point to remember"]
    }
  ],
  "conclusion": "Synthesis of what was learned"
}"#;

/// System prompt for summarising a video transcript into one lesson section.
pub const TRANSCRIPT_SYSTEM_PROMPT: &str = r#"You are an expert teacher. Turn this video transcript into one detailed section of a lesson.

Follow these rules precisely:

1. Open with context, develop the main concepts, close with a short synthesis
2. The content must be at least 5 to 10 lines long
3. Explain the "why" and the "how", with concrete examples
4. Write in the language of the transcript

Answer with JSON only, no commentary and no code fences:
{
  "title": "Title of this part of the lesson",
  "content": "Detailed explanation of the concepts",
  "keyPoints": ["Essential point to remember"]
}"#;

/// System prompt for transcribing one page image.
///
/// `{language}` is replaced by the configured OCR language code.
const TRANSCRIBE_PAGE_PROMPT: &str = r#"You are an OCR engine. Transcribe all the text visible in the page image.

Rules:
- The page is written in the language with ISO 639 code "{language}"
- Keep the reading order a human would follow
- Output plain text only: no Markdown, no code fences, no commentary
- Separate paragraphs with one blank line
- Skip page numbers and decorative elements
- If the page contains no text, output nothing"#;

/// Build the transcription prompt for a language code.
pub fn transcribe_prompt(language: &str) -> String {
    TRANSCRIBE_PAGE_PROMPT.replace("{language}", language)
}

/// Build the user message for a structuring request.
pub fn structure_user_message(text: &str, image_count: usize) -> String {
    if image_count == 0 {
        text.to_string()
    } else {
        format!(
            "{text}\n\n[The source document also contains {image_count} page image(s).]"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcribe_prompt_names_language() {
        let p = transcribe_prompt("fra");
        assert!(p.contains("\"fra\""));
        assert!(!p.contains("{language}"));
    }

    #[test]
    fn structure_prompt_describes_outline_shape() {
        for key in ["\"title\"", "\"introduction\"", "\"mainConcepts\"", "\"keyPoints\"", "\"conclusion\""] {
            assert!(STRUCTURE_SYSTEM_PROMPT.contains(key), "missing {key}");
        }
    }

    #[test]
    fn user_message_mentions_images() {
        assert_eq!(structure_user_message("abc", 0), "abc");
        assert!(structure_user_message("abc", 3).contains("3 page image(s)"));
    }
}
