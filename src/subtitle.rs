//! SubRip (`.srt`) import: flatten a subtitle file into one paragraph of
//! transcript text, ready for [`crate::pipeline::structure::summarize_transcript`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// One cue of a subtitle file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    /// Cue number; `None` when the first line is not a number.
    pub index: Option<u32>,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Parse every cue. Blocks with fewer than three lines are skipped; a cue
/// whose timing line has no `-->` keeps its text with empty timestamps.
pub fn parse_entries(content: &str) -> Vec<SubtitleEntry> {
    let content = content.replace("\r\n", "\n");
    RE_BLOCK_SEPARATOR
        .split(content.trim())
        .filter_map(|block| {
            let lines: Vec<&str> = block.trim().lines().collect();
            if lines.len() < 3 {
                return None;
            }
            let (start, end) = lines[1].split_once("-->").unwrap_or(("", ""));
            let text = lines[2..]
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            Some(SubtitleEntry {
                index: lines[0].trim().parse().ok(),
                start: start.trim().to_string(),
                end: end.trim().to_string(),
                text,
            })
        })
        .collect()
}

/// All cue texts joined into a single paragraph.
pub fn parse_srt(content: &str) -> String {
    parse_entries(content)
        .into_iter()
        .map(|e| e.text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\r\n00:00:01,000 --> 00:00:03,000\r\nHello\r\nworld\r\n\r\n2\r\n00:00:04,000 --> 00:00:05,500\r\nSecond cue\r\n\r\n3\r\nbroken\r\n\r\n4\r\n00:00:07,000 --> 00:00:08,000\r\nLast one.\r\n";

    #[test]
    fn flattens_cues_into_one_paragraph() {
        assert_eq!(parse_srt(SAMPLE), "Hello world Second cue Last one.");
    }

    #[test]
    fn cue_without_timing_keeps_its_text() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n2\nno timing here\nStill spoken\n\n3\n00:00:03,000 --> 00:00:04,000\nThird\n";
        let entries = parse_entries(srt);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].index, Some(2));
        assert_eq!(entries[1].start, "");
        assert_eq!(entries[1].end, "");
        assert_eq!(entries[1].text, "Still spoken");
        assert_eq!(parse_srt(srt), "First Still spoken Third");
    }

    #[test]
    fn parses_timings() {
        let entries = parse_entries(SAMPLE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].index, Some(1));
        assert_eq!(entries[0].start, "00:00:01,000");
        assert_eq!(entries[1].end, "00:00:05,500");
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_srt(""), "");
        assert!(parse_entries("  \n\n ").is_empty());
    }
}
