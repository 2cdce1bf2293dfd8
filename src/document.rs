//! Document data model: what ingestion produces and what the renderer
//! consumes.
//!
//! ```text
//! PageOutcome* ──assemble──▶ IntermediateDocument ──curate──▶ BlockList ──▶ render
//! ```
//!
//! [`IntermediateDocument`] is immutable once assembled. [`BlockList`] is the
//! editable, ordered list of [`ContentBlock`]s a user reviews before
//! rendering; block ids are assigned once and never rewritten.

use crate::error::PageError;
use crate::pipeline::encode::{base64_bytes, to_data_url, JPEG_MIME};
use crate::pipeline::structure::{DocumentOutline, TranscriptSummary};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Title used when no line of text can be found on the first page.
pub const UNTITLED: &str = "Untitled document";

/// Id of the cover block created by [`BlockList::from_outline`].
pub const COVER_BLOCK_ID: &str = "first-page";

// ── Ingestion output ─────────────────────────────────────────────────────────

/// A JPEG capture of one source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRaster {
    /// 1-indexed source page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    #[serde(with = "base64_bytes")]
    pub jpeg: Vec<u8>,
}

impl PageRaster {
    pub fn to_data_url(&self) -> String {
        to_data_url(JPEG_MIME, &self.jpeg)
    }
}

/// Everything ingestion learned about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Native text layer; empty for scanned pages or on extraction failure.
    pub native_text: String,
    /// Recognised text, present only when non-blank.
    pub ocr_text: Option<String>,
    /// `None` when rasterisation or encoding failed.
    pub raster: Option<PageRaster>,
    pub errors: Vec<PageError>,
}

impl PageOutcome {
    /// Characters of text this page contributes.
    pub fn text_len(&self) -> usize {
        self.native_text.chars().count()
            + self.ocr_text.as_ref().map_or(0, |t| t.chars().count())
    }

    /// Append this page's text to `buf`: native text plus a blank line,
    /// then the tagged OCR text when there is any.
    pub fn append_text(&self, buf: &mut String) {
        buf.push_str(&self.native_text);
        buf.push_str("\n\n");
        if let Some(ocr) = &self.ocr_text {
            buf.push_str(&format!("\n[OCR text, page {}]\n{}\n\n", self.page_num, ocr));
        }
    }
}

/// The source-agnostic result of ingesting one PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateDocument {
    /// Native and OCR text of every page, in page order.
    pub full_text: String,
    /// Captures of pages 2..n that rasterised successfully, in page order.
    pub page_images: Vec<PageRaster>,
    /// Capture of page 1, or the first of `page_images` when page 1 failed.
    pub cover_image: Option<PageRaster>,
    pub page_count: usize,
    /// Every absorbed page failure, in page order.
    pub failures: Vec<PageError>,
    /// First line of text on page 1, or [`UNTITLED`].
    pub title: String,
}

impl IntermediateDocument {
    /// Build the document from page outcomes. Outcomes may arrive in any
    /// order and may cover only a prefix of the pages.
    pub fn assemble(page_count: usize, outcomes: impl IntoIterator<Item = PageOutcome>) -> Self {
        let mut outcomes: Vec<PageOutcome> = outcomes.into_iter().collect();
        outcomes.sort_by_key(|o| o.page_num);

        let mut full_text = String::new();
        let mut first_page = None;
        let mut page_images = Vec::new();
        let mut failures = Vec::new();

        for outcome in &outcomes {
            outcome.append_text(&mut full_text);
            failures.extend(outcome.errors.iter().cloned());
            if let Some(raster) = &outcome.raster {
                if outcome.page_num == 1 {
                    first_page = Some(raster.clone());
                } else {
                    page_images.push(raster.clone());
                }
            }
        }

        let title = outcomes
            .first()
            .filter(|o| o.page_num == 1)
            .map(detect_title)
            .unwrap_or_else(|| UNTITLED.to_string());

        Self {
            full_text,
            cover_image: select_cover(first_page, &page_images),
            page_images,
            page_count,
            failures,
            title,
        }
    }

    /// Pages that produced at least one failure.
    pub fn failed_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.failures.iter().map(PageError::page).collect();
        pages.dedup();
        pages
    }

    /// Title of the recast lesson: the title found on page 1, or the
    /// outline's title when page 1 had none.
    pub fn lesson_title(&self, outline: &DocumentOutline) -> String {
        if self.title == UNTITLED && !outline.title.trim().is_empty() {
            outline.title.clone()
        } else {
            self.title.clone()
        }
    }
}

/// Page 1's raster when it exists, else the first other page image.
pub fn select_cover(first_page: Option<PageRaster>, page_images: &[PageRaster]) -> Option<PageRaster> {
    first_page.or_else(|| page_images.first().cloned())
}

/// First non-empty line of page 1: OCR text first, then the native text.
pub fn detect_title(first_page: &PageOutcome) -> String {
    let first_line = |text: &str| {
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    };
    first_page
        .ocr_text
        .as_deref()
        .and_then(first_line)
        .or_else(|| first_line(&first_page.native_text))
        .unwrap_or_else(|| UNTITLED.to_string())
}

// ── Content blocks ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// One unit of the output document.
///
/// For image blocks `body` is the image payload as a data URL (or bare
/// base64).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    pub kind: BlockKind,
    pub title: String,
    pub body: String,
    #[serde(default = "default_included")]
    pub included: bool,
}

fn default_included() -> bool {
    true
}

impl ContentBlock {
    pub fn text(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BlockKind::Text,
            title: title.into(),
            body: body.into(),
            included: true,
        }
    }

    pub fn image(id: impl Into<String>, title: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BlockKind::Image,
            title: title.into(),
            body: data_url.into(),
            included: true,
        }
    }

    pub fn excluded(mut self) -> Self {
        self.included = false;
        self
    }
}

/// Section body followed by its key points as a bullet list.
fn section_body(content: &str, key_points: &[String]) -> String {
    let points: Vec<String> = key_points
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| format!("• {p}"))
        .collect();
    if points.is_empty() {
        content.to_string()
    } else {
        format!("{}\n\n{}", content.trim_end(), points.join("\n"))
    }
}

/// Ordered, editable list of content blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockList {
    blocks: Vec<ContentBlock>,
    #[serde(default)]
    next_custom: u64,
}

impl BlockList {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks,
            next_custom: 0,
        }
    }

    /// Default curation of an outline and its ingested document:
    ///
    /// 1. cover image (`first-page`), included
    /// 2. introduction, titled with `title`
    /// 3. one block per section (`concept-<i>`), key points as bullets
    /// 4. conclusion
    /// 5. one block per page image (`image-<i>`, "Figure <i+1>"), excluded
    pub fn from_outline(outline: &DocumentOutline, doc: &IntermediateDocument, title: &str) -> Self {
        let mut blocks = Vec::new();

        if let Some(cover) = &doc.cover_image {
            blocks.push(ContentBlock::image(COVER_BLOCK_ID, "Cover page", cover.to_data_url()));
        }

        blocks.push(ContentBlock::text("introduction", title, &outline.introduction));

        for (i, section) in outline.sections.iter().enumerate() {
            blocks.push(ContentBlock::text(
                format!("concept-{i}"),
                &section.title,
                section_body(&section.content, &section.key_points),
            ));
        }

        blocks.push(ContentBlock::text("conclusion", "Conclusion", &outline.conclusion));

        for (i, raster) in doc.page_images.iter().enumerate() {
            blocks.push(
                ContentBlock::image(format!("image-{i}"), format!("Figure {}", i + 1), raster.to_data_url())
                    .excluded(),
            );
        }

        Self::new(blocks)
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Blocks that will be rendered, in order.
    pub fn included(&self) -> Vec<&ContentBlock> {
        self.blocks.iter().filter(|b| b.included).collect()
    }

    /// Move block `id` to the position currently held by `target`.
    /// Returns false when either id is unknown.
    pub fn move_to(&mut self, id: &str, target: &str) -> bool {
        let (Some(from), Some(to)) = (self.position(id), self.position(target)) else {
            return false;
        };
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        true
    }

    /// Flip a block's inclusion; returns the new state.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let block = self.blocks.iter_mut().find(|b| b.id == id)?;
        block.included = !block.included;
        Some(block.included)
    }

    pub fn remove(&mut self, id: &str) -> Option<ContentBlock> {
        let pos = self.position(id)?;
        Some(self.blocks.remove(pos))
    }

    /// Replace a block's title and/or body.
    pub fn update(&mut self, id: &str, title: Option<&str>, body: Option<&str>) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        if let Some(title) = title {
            block.title = title.to_string();
        }
        if let Some(body) = body {
            block.body = body.to_string();
        }
        true
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            let id = format!("{prefix}-{}", self.next_custom);
            self.next_custom += 1;
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    /// Append a user-written text block; returns its id.
    pub fn push_text(&mut self, title: &str, body: &str) -> String {
        let id = self.fresh_id("custom");
        self.blocks.push(ContentBlock::text(id.clone(), title, body));
        id
    }

    /// Append a user-supplied image block; returns its id.
    pub fn push_image(&mut self, title: &str, data_url: &str) -> String {
        let id = self.fresh_id("custom");
        self.blocks.push(ContentBlock::image(id.clone(), title, data_url));
        id
    }

    /// Append a transcript summary as a text block; returns its id.
    pub fn push_transcript_summary(&mut self, summary: &TranscriptSummary) -> String {
        let id = self.fresh_id("video");
        self.blocks.push(ContentBlock::text(
            id.clone(),
            &summary.title,
            section_body(&summary.content, &summary.key_points),
        ));
        id
    }
}

// ── File names ───────────────────────────────────────────────────────────────

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase, replace every run of characters outside `[a-z0-9]` with one
/// `_`, trim leading/trailing `_`. Falls back to `"document"`.
pub fn sanitize_file_name(title: &str) -> String {
    let lower = title.to_lowercase();
    let replaced = RE_NON_ALNUM.replace_all(&lower, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<sanitized title>.pdf`
pub fn output_file_name(title: &str) -> String {
    format!("{}.pdf", sanitize_file_name(title))
}
