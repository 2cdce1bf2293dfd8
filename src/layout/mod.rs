//! Layout engine: paginate an ordered list of content blocks.
//!
//! The engine makes one forward pass over the included blocks and turns them
//! into a flat list of [`DrawOp`]s against a fixed [`PageGeometry`]. All the
//! page-break decisions happen here; the renderer only executes the ops.
//!
//! ## Page-break policy
//!
//! * An image block always starts a fresh page (unless it is the very first
//!   block) and is scaled to fit the content box, centered on the page.
//! * A text block that follows an image starts a fresh page.
//! * Consecutive text blocks flow on the same page. Before a text block is
//!   placed, its full height (title and body box) is measured; if it would
//!   cross the bottom margin the engine breaks once, before the title, so a
//!   title is never stranded at the foot of a page.
//! * A block taller than a whole page cannot be kept together. Its body box
//!   moves to a fresh page when it fits there; otherwise it is placed as is
//!   and overflows.
//!
//! The only mutable state is the [`LayoutCursor`] owned by a single pass, so
//! layouts for different documents can run concurrently.

pub mod metrics;

use crate::error::RecastError;
use metrics::{measure, FontWeight, PageGeometry, Typography, PT_TO_MM};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use metrics::{text_height, text_width, wrap_text};

const TITLE_COLOR: Rgb8 = Rgb8(50, 50, 50);
const BODY_COLOR: Rgb8 = Rgb8(60, 60, 60);
const PANEL_FILL: Rgb8 = Rgb8(252, 252, 252);
const PANEL_STROKE: Rgb8 = Rgb8(235, 235, 235);

/// One block as seen by the layout engine.
///
/// Image payloads are decoded before layout; the engine only needs their
/// pixel dimensions to compute the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutItem<'a> {
    Text {
        id: &'a str,
        title: &'a str,
        body: &'a str,
    },
    Image {
        id: &'a str,
        width: u32,
        height: u32,
    },
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb8(pub u8, pub u8, pub u8);

/// Horizontal anchoring of a [`TextRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    /// `x` is the left edge of the line.
    Left,
    /// `x` is the horizontal centre of the line.
    Center,
}

/// A single line of text. Coordinates are millimetres from the top-left
/// corner of the page; `baseline` is the y of the text baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub block_id: String,
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub weight: FontWeight,
    pub color: Rgb8,
    pub align: TextAlign,
}

/// Rounded background box behind a text body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub block_id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub fill: Rgb8,
    pub stroke: Rgb8,
}

/// Where an image block lands; `x`/`y` is its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub block_id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A drawing instruction. The first page is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawOp {
    NewPage,
    Text(TextRun),
    Panel(Panel),
    Image(ImagePlacement),
}

/// Result of a layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub title: String,
    pub geometry: PageGeometry,
    pub ops: Vec<DrawOp>,
}

impl Layout {
    /// Number of output pages.
    pub fn page_count(&self) -> usize {
        1 + self
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::NewPage))
            .count()
    }

    /// Ops grouped by page, without the `NewPage` markers.
    pub fn pages(&self) -> Vec<Vec<&DrawOp>> {
        let mut pages = vec![Vec::new()];
        for op in &self.ops {
            match op {
                DrawOp::NewPage => pages.push(Vec::new()),
                other => {
                    if let Some(page) = pages.last_mut() {
                        page.push(other);
                    }
                }
            }
        }
        pages
    }

    /// 0-indexed page on which each block id first appears, in op order.
    pub fn block_pages(&self) -> Vec<(String, usize)> {
        let mut seen: Vec<(String, usize)> = Vec::new();
        for (page, ops) in self.pages().into_iter().enumerate() {
            for op in ops {
                let id = match op {
                    DrawOp::Text(run) => &run.block_id,
                    DrawOp::Panel(panel) => &panel.block_id,
                    DrawOp::Image(img) => &img.block_id,
                    DrawOp::NewPage => continue,
                };
                if !seen.iter().any(|(s, _)| s == id) {
                    seen.push((id.clone(), page));
                }
            }
        }
        seen
    }
}

/// Mutable state of one layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCursor {
    /// 0-indexed current page.
    pub page: usize,
    /// Vertical offset from the top edge, in millimetres.
    pub y: f32,
    pub last_was_image: bool,
    pub is_first: bool,
    /// Nothing has been drawn on the current page yet.
    pub fresh_page: bool,
}

impl LayoutCursor {
    fn new(geometry: &PageGeometry) -> Self {
        Self {
            page: 0,
            y: geometry.margin,
            last_was_image: false,
            is_first: true,
            fresh_page: true,
        }
    }

    fn break_page(&mut self, geometry: &PageGeometry, ops: &mut Vec<DrawOp>) {
        ops.push(DrawOp::NewPage);
        self.page += 1;
        self.y = geometry.margin;
        self.fresh_page = true;
    }
}

/// Scale `width × height` (any unit) to the largest size that fits
/// `max_width × max_height` with the same aspect ratio.
///
/// Landscape images are fitted to the width first, portrait and square ones
/// to the height; the other dimension is then shrunk if it still overflows.
pub fn fit_image(width: u32, height: u32, max_width: f32, max_height: f32) -> (f32, f32) {
    let aspect = width.max(1) as f32 / height.max(1) as f32;

    if aspect > 1.0 {
        let mut w = max_width;
        let mut h = w / aspect;
        if h > max_height {
            h = max_height;
            w = h * aspect;
        }
        (w, h)
    } else {
        let mut h = max_height;
        let mut w = h * aspect;
        if w > max_width {
            w = max_width;
            h = w / aspect;
        }
        (w, h)
    }
}

/// Paginates content blocks against a fixed geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutEngine {
    pub geometry: PageGeometry,
    pub typography: Typography,
}

impl LayoutEngine {
    pub fn new(geometry: PageGeometry, typography: Typography) -> Self {
        Self {
            geometry,
            typography,
        }
    }

    /// Run one layout pass.
    ///
    /// # Errors
    /// [`RecastError::EmptyInput`] when `items` is empty.
    pub fn layout(&self, items: &[LayoutItem<'_>], title: &str) -> Result<Layout, RecastError> {
        if items.is_empty() {
            return Err(RecastError::EmptyInput);
        }

        let mut cursor = LayoutCursor::new(&self.geometry);
        let mut ops = Vec::new();

        for item in items {
            match *item {
                LayoutItem::Image { id, width, height } => {
                    self.place_image(&mut cursor, &mut ops, id, width, height)
                }
                LayoutItem::Text { id, title, body } => {
                    self.place_text(&mut cursor, &mut ops, id, title, body)
                }
            }
            cursor.is_first = false;
        }

        let layout = Layout {
            title: title.to_string(),
            geometry: self.geometry,
            ops,
        };
        debug!(
            blocks = items.len(),
            pages = layout.page_count(),
            "Layout pass complete"
        );
        Ok(layout)
    }

    fn place_image(
        &self,
        cursor: &mut LayoutCursor,
        ops: &mut Vec<DrawOp>,
        id: &str,
        width: u32,
        height: u32,
    ) {
        let g = &self.geometry;
        if !cursor.is_first {
            cursor.break_page(g, ops);
        }

        let (w, h) = fit_image(width, height, g.content_width(), g.content_height());
        ops.push(DrawOp::Image(ImagePlacement {
            block_id: id.to_string(),
            x: (g.width - w) / 2.0,
            y: (g.height - h) / 2.0,
            width: w,
            height: h,
        }));

        // The image owns its page.
        cursor.y = g.bottom_limit();
        cursor.fresh_page = false;
        cursor.last_was_image = true;
    }

    fn place_text(
        &self,
        cursor: &mut LayoutCursor,
        ops: &mut Vec<DrawOp>,
        id: &str,
        title: &str,
        body: &str,
    ) {
        let g = &self.geometry;
        let t = &self.typography;

        let (title_lines, title_height) =
            measure(title, t.title_size, FontWeight::Bold, g.content_width(), t);
        let body_width = g.content_width() - 2.0 * t.body_inset;
        let body = if body.trim().is_empty() {
            None
        } else {
            Some(measure(body, t.body_size, FontWeight::Regular, body_width, t))
        };
        let box_height = body
            .as_ref()
            .map(|(_, h)| h + 2.0 * t.box_padding)
            .unwrap_or(0.0);

        // ── Title ────────────────────────────────────────────────────────
        let after_image = !cursor.is_first && cursor.last_was_image;
        let block_height =
            t.title_margin_top + title_height + t.title_margin_bottom + box_height;
        if after_image || (!cursor.fresh_page && cursor.y + block_height > g.bottom_limit()) {
            cursor.break_page(g, ops);
        } else {
            cursor.y += t.title_margin_top;
        }

        let advance = t.line_advance(t.title_size);
        let ascent = t.title_size * PT_TO_MM;
        for (i, line) in title_lines.into_iter().enumerate() {
            ops.push(DrawOp::Text(TextRun {
                block_id: id.to_string(),
                text: line,
                x: g.width / 2.0,
                baseline: cursor.y + ascent + i as f32 * advance,
                size: t.title_size,
                weight: FontWeight::Bold,
                color: TITLE_COLOR,
                align: TextAlign::Center,
            }));
        }
        cursor.y += title_height + t.title_margin_bottom;
        cursor.fresh_page = false;

        // ── Body ─────────────────────────────────────────────────────────
        if let Some((lines, text_height)) = body {
            if cursor.y + box_height > g.bottom_limit() {
                if box_height <= g.content_height() {
                    cursor.break_page(g, ops);
                } else {
                    warn!(
                        block = id,
                        height_mm = box_height,
                        "Text block is taller than a page and will overflow"
                    );
                }
            }

            ops.push(DrawOp::Panel(Panel {
                block_id: id.to_string(),
                x: g.margin,
                y: cursor.y,
                width: g.content_width(),
                height: box_height,
                radius: t.box_radius,
                fill: PANEL_FILL,
                stroke: PANEL_STROKE,
            }));

            let advance = t.line_advance(t.body_size);
            let ascent = t.body_size * PT_TO_MM;
            for (i, line) in lines.into_iter().enumerate() {
                ops.push(DrawOp::Text(TextRun {
                    block_id: id.to_string(),
                    text: line,
                    x: g.margin + t.body_inset,
                    baseline: cursor.y + t.box_padding + ascent + i as f32 * advance,
                    size: t.body_size,
                    weight: FontWeight::Regular,
                    color: BODY_COLOR,
                    align: TextAlign::Left,
                }));
            }

            cursor.y += text_height + 2.0 * t.box_padding + t.block_gap;
            cursor.fresh_page = false;
        }

        cursor.last_was_image = false;
    }
}
