//! Renderer: execute a [`Layout`] against a document writer.
//!
//! All pagination is decided by the layout engine; this module only decodes
//! image payloads, converts coordinates and issues drawing calls. The
//! [`DocumentWriter`] trait is the seam to the PDF library; [`PrintPdfWriter`]
//! is the `printpdf` implementation.
//!
//! ```text
//! ContentBlock[] ──decode images──▶ LayoutItem[] ──layout──▶ DrawOp[] ──execute──▶ PDF bytes
//! ```

use crate::document::{output_file_name, BlockKind, ContentBlock};
use crate::error::RecastError;
use crate::layout::metrics::{text_width, FontWeight, PageGeometry, Typography};
use crate::layout::{DrawOp, ImagePlacement, Layout, LayoutEngine, LayoutItem, Panel, Rgb8, TextAlign, TextRun};
use crate::pipeline::encode::decode_data_url;
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Color, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions,
    PdfWarnMsg, Point, Polygon, PolygonRing, Pt, RawImage, RawImageData, RawImageFormat, Rgb,
    TextItem, WindingOrder, XObjectTransform,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// DPI at which image XObjects are registered; placement scales from there.
const IMAGE_DPI: f32 = 300.0;

/// Bezier control distance for a quarter circle of radius 1.
const KAPPA: f32 = 0.552_284_8;

/// Drawing surface for one output document.
///
/// Coordinates are millimetres from the top-left corner of the page. The
/// first page exists before any call.
pub trait DocumentWriter {
    fn new_page(&mut self);
    fn draw_text(&mut self, run: &TextRun);
    fn draw_panel(&mut self, panel: &Panel);
    fn draw_image(&mut self, placement: &ImagePlacement, image: &DynamicImage);
    /// Serialise the document.
    fn finish(self) -> Result<Vec<u8>, RecastError>;
}

/// Issue every op of `layout` on `writer`.
///
/// # Errors
/// [`RecastError::RenderFailure`] when an image op names a block missing
/// from `images`.
pub fn execute<W: DocumentWriter>(
    layout: &Layout,
    images: &HashMap<String, DynamicImage>,
    mut writer: W,
) -> Result<Vec<u8>, RecastError> {
    for op in &layout.ops {
        match op {
            DrawOp::NewPage => writer.new_page(),
            DrawOp::Text(run) => writer.draw_text(run),
            DrawOp::Panel(panel) => writer.draw_panel(panel),
            DrawOp::Image(placement) => {
                let image = images.get(&placement.block_id).ok_or_else(|| RecastError::RenderFailure {
                    block_id: placement.block_id.clone(),
                    detail: "no decoded image for this block".into(),
                })?;
                writer.draw_image(placement, image);
            }
        }
    }
    writer.finish()
}

/// Decode an image block's payload into pixels.
pub fn decode_block_image(block: &ContentBlock) -> Result<DynamicImage, RecastError> {
    let failure = |detail: String| RecastError::RenderFailure {
        block_id: block.id.clone(),
        detail,
    };
    let bytes = decode_data_url(&block.body).map_err(failure)?;
    image::load_from_memory(&bytes).map_err(|e| failure(format!("cannot decode image: {e}")))
}

/// Lays out and renders content blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    engine: LayoutEngine,
}

impl Renderer {
    pub fn new(geometry: PageGeometry, typography: Typography) -> Self {
        Self {
            engine: LayoutEngine::new(geometry, typography),
        }
    }

    /// Decode images and lay out the included blocks.
    ///
    /// Excluded blocks are skipped entirely, so a broken payload on an
    /// excluded image does not fail the render.
    pub fn prepare(
        &self,
        blocks: &[ContentBlock],
        title: &str,
    ) -> Result<(Layout, HashMap<String, DynamicImage>), RecastError> {
        let included: Vec<&ContentBlock> = blocks.iter().filter(|b| b.included).collect();
        if included.is_empty() {
            return Err(RecastError::EmptyInput);
        }

        let mut images = HashMap::new();
        for block in included.iter().filter(|b| b.kind == BlockKind::Image) {
            images.insert(block.id.clone(), decode_block_image(block)?);
        }

        let items: Vec<LayoutItem<'_>> = included
            .iter()
            .map(|b| match b.kind {
                BlockKind::Text => LayoutItem::Text {
                    id: &b.id,
                    title: &b.title,
                    body: &b.body,
                },
                BlockKind::Image => {
                    let (width, height) = images
                        .get(&b.id)
                        .map(|img| (img.width(), img.height()))
                        .unwrap_or((1, 1));
                    LayoutItem::Image {
                        id: &b.id,
                        width,
                        height,
                    }
                }
            })
            .collect();

        let layout = self.engine.layout(&items, title)?;
        Ok((layout, images))
    }

    /// Render the included blocks to PDF bytes.
    pub fn render(&self, blocks: &[ContentBlock], title: &str) -> Result<Vec<u8>, RecastError> {
        let (layout, images) = self.prepare(blocks, title)?;
        let bytes = execute(
            &layout,
            &images,
            PrintPdfWriter::new(title, self.engine.geometry),
        )?;
        info!(
            "Rendered '{}': {} pages, {} bytes",
            title,
            layout.page_count(),
            bytes.len()
        );
        Ok(bytes)
    }
}

/// Render blocks with the default A4 geometry and typography.
pub fn render_document(blocks: &[ContentBlock], title: &str) -> Result<Vec<u8>, RecastError> {
    Renderer::default().render(blocks, title)
}

/// Render blocks and write `<dir>/<sanitized title>.pdf`.
///
/// The file appears atomically: bytes go to a temp file in `dir` which is
/// then persisted over the target.
pub fn render_to_file(
    blocks: &[ContentBlock],
    title: &str,
    dir: &Path,
) -> Result<PathBuf, RecastError> {
    let bytes = render_document(blocks, title)?;
    let path = dir.join(output_file_name(title));
    write_atomic(&path, &bytes)?;
    Ok(path)
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RecastError> {
    let write_err = |source: std::io::Error| RecastError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

// ── printpdf writer ──────────────────────────────────────────────────────────

/// [`DocumentWriter`] producing a PDF with `printpdf` and the built-in
/// Helvetica fonts.
pub struct PrintPdfWriter {
    doc: PdfDocument,
    geometry: PageGeometry,
    pages: Vec<PdfPage>,
    ops: Vec<Op>,
}

impl PrintPdfWriter {
    pub fn new(title: &str, geometry: PageGeometry) -> Self {
        Self {
            doc: PdfDocument::new(title),
            geometry,
            pages: Vec::new(),
            ops: Vec::new(),
        }
    }

    fn page(&self, ops: Vec<Op>) -> PdfPage {
        PdfPage::new(Mm(self.geometry.width), Mm(self.geometry.height), ops)
    }

    /// Top-left millimetres → PDF user space (bottom-left origin, points).
    fn point(&self, x_mm: f32, y_mm: f32) -> Point {
        Point {
            x: Pt(Mm(x_mm).into_pt().0),
            y: Pt(Mm(self.geometry.height - y_mm).into_pt().0),
        }
    }

    fn color(c: Rgb8) -> Color {
        Color::Rgb(Rgb::new(
            c.0 as f32 / 255.0,
            c.1 as f32 / 255.0,
            c.2 as f32 / 255.0,
            None,
        ))
    }

    fn font(weight: FontWeight) -> BuiltinFont {
        match weight {
            FontWeight::Regular => BuiltinFont::Helvetica,
            FontWeight::Bold => BuiltinFont::HelveticaBold,
        }
    }

    /// Closed rounded rectangle; on-curve points are plain, control points
    /// are flagged `bezier`.
    fn rounded_rect(&self, x: f32, y: f32, w: f32, h: f32, r: f32) -> Vec<LinePoint> {
        let r = r.min(w / 2.0).min(h / 2.0);
        let k = r * KAPPA;
        let (x0, y0, x1, y1) = (x, y, x + w, y + h);
        let on = |px: f32, py: f32| LinePoint {
            p: self.point(px, py),
            bezier: false,
        };
        let ctrl = |px: f32, py: f32| LinePoint {
            p: self.point(px, py),
            bezier: true,
        };
        vec![
            on(x0 + r, y0),
            on(x1 - r, y0),
            ctrl(x1 - r + k, y0),
            ctrl(x1, y0 + r - k),
            on(x1, y0 + r),
            on(x1, y1 - r),
            ctrl(x1, y1 - r + k),
            ctrl(x1 - r + k, y1),
            on(x1 - r, y1),
            on(x0 + r, y1),
            ctrl(x0 + r - k, y1),
            ctrl(x0, y1 - r + k),
            on(x0, y1 - r),
            on(x0, y0 + r),
            ctrl(x0, y0 + r - k),
            ctrl(x0 + r - k, y0),
            on(x0 + r, y0),
        ]
    }
}

impl DocumentWriter for PrintPdfWriter {
    fn new_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        let page = self.page(ops);
        self.pages.push(page);
    }

    fn draw_text(&mut self, run: &TextRun) {
        let x = match run.align {
            TextAlign::Left => run.x,
            TextAlign::Center => run.x - text_width(&run.text, run.size, run.weight) / 2.0,
        };
        let font = Self::font(run.weight);
        let pos = self.point(x, run.baseline);

        self.ops.push(Op::SetFillColor {
            col: Self::color(run.color),
        });
        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor { pos });
        self.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(run.size),
            font,
        });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(run.text.clone())],
            font,
        });
        self.ops.push(Op::EndTextSection);
    }

    fn draw_panel(&mut self, panel: &Panel) {
        let points = self.rounded_rect(panel.x, panel.y, panel.width, panel.height, panel.radius);
        self.ops.push(Op::SetFillColor {
            col: Self::color(panel.fill),
        });
        self.ops.push(Op::SetOutlineColor {
            col: Self::color(panel.stroke),
        });
        self.ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing { points }],
                mode: PaintMode::FillStroke,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn draw_image(&mut self, placement: &ImagePlacement, image: &DynamicImage) {
        let rgb = image.to_rgb8();
        let (px_w, px_h) = rgb.dimensions();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w as usize,
            height: px_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let id = self.doc.add_image(&raw);

        // Native size at IMAGE_DPI, then scale to the placement box.
        let native_w_pt = px_w.max(1) as f32 / IMAGE_DPI * 72.0;
        let native_h_pt = px_h.max(1) as f32 / IMAGE_DPI * 72.0;
        let target_w_pt = Mm(placement.width).into_pt().0;
        let target_h_pt = Mm(placement.height).into_pt().0;
        let origin = self.point(placement.x, placement.y + placement.height);

        self.ops.push(Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(origin.x),
                translate_y: Some(origin.y),
                scale_x: Some(target_w_pt / native_w_pt),
                scale_y: Some(target_h_pt / native_h_pt),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        });
    }

    fn finish(mut self) -> Result<Vec<u8>, RecastError> {
        self.new_page();
        let pages = std::mem::take(&mut self.pages);
        self.doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!("printpdf reported {} warnings", warnings.len());
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::{encode_jpeg, to_data_url, JPEG_MIME};

    /// Records calls instead of drawing.
    #[derive(Default)]
    struct RecordingWriter {
        calls: Vec<String>,
    }

    impl DocumentWriter for RecordingWriter {
        fn new_page(&mut self) {
            self.calls.push("page".into());
        }
        fn draw_text(&mut self, run: &TextRun) {
            self.calls.push(format!("text:{}", run.block_id));
        }
        fn draw_panel(&mut self, panel: &Panel) {
            self.calls.push(format!("panel:{}", panel.block_id));
        }
        fn draw_image(&mut self, placement: &ImagePlacement, _image: &DynamicImage) {
            self.calls.push(format!("image:{}", placement.block_id));
        }
        fn finish(self) -> Result<Vec<u8>, RecastError> {
            Ok(self.calls.join(",").into_bytes())
        }
    }

    fn jpeg_url(w: u32, h: u32) -> String {
        let img = DynamicImage::new_rgb8(w, h);
        to_data_url(JPEG_MIME, &encode_jpeg(&img, 80).unwrap())
    }

    #[test]
    fn execute_follows_layout_order() {
        let blocks = vec![
            ContentBlock::image("cover", "Cover", jpeg_url(20, 30)),
            ContentBlock::text("intro", "Intro", "Hello there"),
        ];
        let (layout, images) = Renderer::default().prepare(&blocks, "Doc").unwrap();
        let out = execute(&layout, &images, RecordingWriter::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "image:cover,page,text:intro,panel:intro,text:intro"
        );
    }

    #[test]
    fn broken_image_names_its_block() {
        let blocks = vec![
            ContentBlock::text("intro", "Intro", "Hello"),
            ContentBlock::image("image-2", "Figure 3", "data:image/jpeg;base64,bm90IGFuIGltYWdl"),
        ];
        let err = Renderer::default().prepare(&blocks, "Doc").unwrap_err();
        match err {
            RecastError::RenderFailure { block_id, .. } => assert_eq!(block_id, "image-2"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn excluded_blocks_are_not_decoded() {
        let blocks = vec![
            ContentBlock::text("intro", "Intro", "Hello"),
            ContentBlock::image("bad", "Bad", "@@@").excluded(),
        ];
        assert!(Renderer::default().prepare(&blocks, "Doc").is_ok());
    }

    #[test]
    fn nothing_included_is_empty_input() {
        let blocks = vec![ContentBlock::text("a", "A", "x").excluded()];
        assert!(matches!(
            render_document(&blocks, "Doc"),
            Err(RecastError::EmptyInput)
        ));
    }

    #[test]
    fn renders_a_pdf() {
        let blocks = vec![
            ContentBlock::image("cover", "Cover", jpeg_url(40, 60)),
            ContentBlock::text("intro", "Introduction", "Some body text. ".repeat(50)),
            ContentBlock::text("c0", "Concept", "More text."),
        ];
        let bytes = render_document(&blocks, "Test Document").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn render_to_file_uses_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = vec![ContentBlock::text("intro", "Intro", "Body")];
        let path = render_to_file(&blocks, "Ch. 3: Évolution!!", dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "ch_3_volution.pdf");
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
