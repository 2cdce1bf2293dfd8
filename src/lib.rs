//! # edgequake-recast
//!
//! Turn a PDF into a curated, re-laid-out PDF lesson.
//!
//! The source document is ingested page by page: native text, a JPEG
//! capture of every page, and OCR text for pages whose text only exists as
//! pixels. A language model can then structure the text into an outline,
//! which becomes an editable list of content blocks. The layout engine
//! paginates the included blocks onto A4 pages and the renderer writes the
//! final PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Capture    text layer + raster per page via pdfium (spawn_blocking)
//!  ├─ 3. OCR        concurrent recognition, outcomes kept in page order
//!  ├─ 4. Assemble   full text, cover image, page images, page failures
//!  ├─ 5. Structure  outline from the full text (optional, LLM)
//!  ├─ 6. Curate     ordered content blocks, each included or not
//!  ├─ 7. Layout     deterministic pagination into draw ops
//!  └─ 8. Render     draw ops → PDF bytes (printpdf)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_recast::{ingest_file, render_to_file, BlockList, RecastConfig};
//! use edgequake_recast::pipeline::structure::structure_text;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RecastConfig::default();
//!     let doc = ingest_file("lesson.pdf", &config).await?;
//!     let outline = structure_text(&doc.full_text, doc.page_images.len(), &config).await?;
//!     let title = doc.lesson_title(&outline);
//!     let blocks = BlockList::from_outline(&outline, &doc, &title);
//!     let path = render_to_file(blocks.blocks(), &title, std::path::Path::new("."))?;
//!     eprintln!("wrote {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `pdfrecast` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `local-ocr` | off     | Offline OCR engine backed by `ocrs` + `rten` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod layout;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod subtitle;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RecastConfig, RecastConfigBuilder};
pub use document::{
    output_file_name, sanitize_file_name, select_cover, BlockKind, BlockList, ContentBlock,
    IntermediateDocument, PageOutcome, PageRaster,
};
pub use error::{PageError, RecastError};
pub use ingest::{
    ingest, ingest_file, ingest_stream, ingest_stream_with, ingest_sync, ingest_with,
    IngestStream, PageStream,
};
pub use layout::metrics::{FontWeight, PageGeometry, Typography};
pub use layout::{DrawOp, Layout, LayoutEngine, LayoutItem};
pub use pipeline::ocr::{OcrEngine, OcrError, VisionOcr};
pub use pipeline::source::{PdfBackend, PdfiumBackend, SourceDocument};
pub use pipeline::structure::{DocumentOutline, OutlineSection, TranscriptSummary};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::{render_document, render_to_file, DocumentWriter, PrintPdfWriter, Renderer};
pub use subtitle::parse_srt;

#[cfg(feature = "local-ocr")]
pub use pipeline::ocr::{LocalOcr, LocalOcrModels};
