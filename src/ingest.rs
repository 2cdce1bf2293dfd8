//! Ingestion: PDF bytes → [`IntermediateDocument`].
//!
//! ## Concurrency model
//!
//! ```text
//!  spawn_blocking                         async
//! ┌────────────────────────┐  mpsc   ┌──────────────────────────────┐
//! │ for page in 1..=n:     │ ──────▶ │ map(recognise).buffered(k)   │ ──▶ PageOutcome (page order)
//! │   text, rasterise, JPEG│         │   OcrEngine::recognize       │
//! └────────────────────────┘         └──────────────────────────────┘
//! ```
//!
//! pdfium is blocking and not re-entrant, so one worker walks the pages in
//! order. Recognition of up to `ocr_concurrency` pages overlaps with that
//! walk, and `buffered` hands outcomes back in page order. The channel is
//! bounded, so a slow consumer throttles rasterisation; dropping the stream
//! stops the worker at the next page boundary.
//!
//! Page failures never abort ingestion. They are recorded as
//! [`PageError`]s on the page and the walk moves on.

use crate::config::RecastConfig;
use crate::document::{IntermediateDocument, PageOutcome, PageRaster};
use crate::error::{PageError, RecastError};
use crate::pipeline::encode::encode_jpeg;
use crate::pipeline::input::{check_pdf_magic, resolve_input};
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::source::{PdfBackend, PdfiumBackend, SourceDocument};
use crate::progress::ProgressCallback;
use futures::{future, Stream, StreamExt};
use image::DynamicImage;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// A boxed stream of page outcomes.
pub type PageStream = Pin<Box<dyn Stream<Item = PageOutcome> + Send>>;

/// Page outcomes of one document, in page order.
pub struct IngestStream {
    page_count: usize,
    pages: PageStream,
}

impl IngestStream {
    /// Number of pages in the source document.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Drain the stream and assemble the document.
    ///
    /// # Errors
    /// [`RecastError::Internal`] when the page walk ended early.
    pub async fn assemble(self) -> Result<IntermediateDocument, RecastError> {
        let page_count = self.page_count;
        let outcomes: Vec<PageOutcome> = self.pages.collect().await;
        if outcomes.len() != page_count {
            return Err(RecastError::Internal(format!(
                "page walk stopped after {} of {} pages",
                outcomes.len(),
                page_count
            )));
        }
        Ok(IntermediateDocument::assemble(page_count, outcomes))
    }
}

impl Stream for IngestStream {
    type Item = PageOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<PageOutcome>> {
        self.pages.as_mut().poll_next(cx)
    }
}

/// What the blocking worker learned about one page.
struct PageCapture {
    page_num: usize,
    native_text: String,
    bitmap: Option<DynamicImage>,
    raster: Option<PageRaster>,
    errors: Vec<PageError>,
}

enum RenderEvent {
    Opened { page_count: usize },
    Page(Box<PageCapture>),
}

/// Read, rasterise and encode one page. Never fails; problems are recorded
/// on the capture.
fn capture_page(doc: &dyn SourceDocument, index: usize, scale: f32, quality: u8) -> PageCapture {
    let page_num = index + 1;
    let mut errors = Vec::new();

    let native_text = doc.native_text(index).unwrap_or_else(|detail| {
        warn!("Page {}: text extraction failed: {}", page_num, detail);
        errors.push(PageError::TextExtractionFailed {
            page: page_num,
            detail,
        });
        String::new()
    });

    let (bitmap, raster) = match doc.rasterize(index, scale) {
        Ok(img) => match encode_jpeg(&img, quality) {
            Ok(jpeg) => {
                let raster = PageRaster {
                    page_num,
                    width: img.width(),
                    height: img.height(),
                    jpeg,
                };
                (Some(img), Some(raster))
            }
            Err(e) => {
                warn!("Page {}: JPEG encoding failed: {}", page_num, e);
                errors.push(PageError::EncodingFailed {
                    page: page_num,
                    detail: e.to_string(),
                });
                (Some(img), None)
            }
        },
        Err(detail) => {
            warn!("Page {}: rasterisation failed: {}", page_num, detail);
            errors.push(PageError::RasterisationFailed {
                page: page_num,
                detail,
            });
            (None, None)
        }
    };

    PageCapture {
        page_num,
        native_text,
        bitmap,
        raster,
        errors,
    }
}

/// Blocking page walk. Stops early when the receiver is gone.
fn walk_pages(
    backend: &dyn PdfBackend,
    bytes: &[u8],
    password: Option<&str>,
    scale: f32,
    quality: u8,
    tx: &mpsc::Sender<RenderEvent>,
) -> Result<(), RecastError> {
    backend.with_document(bytes, password, &mut |doc| {
        let page_count = doc.page_count();
        if tx.blocking_send(RenderEvent::Opened { page_count }).is_err() {
            return;
        }
        for index in 0..page_count {
            let capture = capture_page(doc, index, scale, quality);
            if tx.blocking_send(RenderEvent::Page(Box::new(capture))).is_err() {
                debug!("Ingestion consumer dropped; stopping after page {}", index + 1);
                return;
            }
        }
    })
}

/// Run OCR on a captured page and turn it into an outcome.
async fn recognise_page(
    capture: PageCapture,
    engine: Option<Arc<dyn OcrEngine>>,
    language: Arc<str>,
    progress: Option<ProgressCallback>,
    total: usize,
) -> PageOutcome {
    let PageCapture {
        page_num,
        native_text,
        bitmap,
        raster,
        mut errors,
    } = capture;

    if let Some(cb) = &progress {
        cb.on_page_start(page_num, total);
    }

    let ocr_text = match (engine, bitmap) {
        (Some(engine), Some(bitmap)) => match engine.recognize(&bitmap, &language).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Page {}: OCR failed: {}", page_num, e);
                errors.push(PageError::OcrFailed {
                    page: page_num,
                    detail: e.to_string(),
                });
                None
            }
        },
        _ => None,
    };

    let outcome = PageOutcome {
        page_num,
        native_text,
        ocr_text,
        raster,
        errors,
    };

    if let Some(cb) = &progress {
        for err in &outcome.errors {
            cb.on_page_error(page_num, total, &err.to_string());
        }
        cb.on_page_complete(page_num, total, outcome.text_len());
    }
    debug!("Page {}: {} chars of text", page_num, outcome.text_len());
    outcome
}

/// Start ingesting `bytes` with an explicit PDF backend.
///
/// Returns once the document is parsed; pages follow on the stream.
///
/// # Errors
/// [`RecastError::MalformedSource`] (or a password error) when the bytes do
/// not open as a PDF.
pub async fn ingest_stream_with(
    backend: Arc<dyn PdfBackend>,
    bytes: Vec<u8>,
    config: &RecastConfig,
) -> Result<IngestStream, RecastError> {
    check_pdf_magic(&bytes)?;

    let concurrency = config.ocr_concurrency.max(1);
    let (tx, mut rx) = mpsc::channel::<RenderEvent>(concurrency);

    let password = config.password.clone();
    let scale = config.capture_scale;
    let quality = config.jpeg_quality;
    let worker = tokio::task::spawn_blocking(move || {
        walk_pages(backend.as_ref(), &bytes, password.as_deref(), scale, quality, &tx)
    });

    let page_count = match rx.recv().await {
        Some(RenderEvent::Opened { page_count }) => page_count,
        _ => {
            return Err(match worker.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => RecastError::Internal("page walk ended before opening the document".into()),
                Err(e) => RecastError::Internal(format!("Render task panicked: {}", e)),
            });
        }
    };
    info!("Ingesting {} pages", page_count);

    let progress = config.progress_callback.clone();
    if let Some(cb) = &progress {
        cb.on_ingestion_start(page_count);
    }

    let engine = config.ocr.clone();
    let language: Arc<str> = Arc::from(config.ocr_language.as_str());

    let pages = ReceiverStream::new(rx)
        .filter_map(|event| {
            future::ready(match event {
                RenderEvent::Page(capture) => Some(*capture),
                RenderEvent::Opened { .. } => None,
            })
        })
        .map(move |capture| {
            recognise_page(
                capture,
                engine.clone(),
                Arc::clone(&language),
                progress.clone(),
                page_count,
            )
        })
        .buffered(concurrency);

    Ok(IngestStream {
        page_count,
        pages: Box::pin(pages),
    })
}

/// Start ingesting `bytes` with pdfium.
pub async fn ingest_stream(bytes: Vec<u8>, config: &RecastConfig) -> Result<IngestStream, RecastError> {
    let backend = Arc::new(PdfiumBackend::new(config.pdfium_library_path.clone()));
    ingest_stream_with(backend, bytes, config).await
}

/// Ingest `bytes` with an explicit PDF backend.
pub async fn ingest_with(
    backend: Arc<dyn PdfBackend>,
    bytes: Vec<u8>,
    config: &RecastConfig,
) -> Result<IntermediateDocument, RecastError> {
    let stream = ingest_stream_with(backend, bytes, config).await?;
    let doc = stream.assemble().await?;

    let clean = doc.page_count - doc.failed_pages().len();
    if let Some(cb) = &config.progress_callback {
        cb.on_ingestion_complete(doc.page_count, clean);
    }
    info!(
        "Ingestion complete: {} pages ({} with failures), {} chars, {} page images",
        doc.page_count,
        doc.page_count - clean,
        doc.full_text.chars().count(),
        doc.page_images.len()
    );
    Ok(doc)
}

/// Ingest PDF bytes with pdfium.
///
/// # Example
/// ```rust,no_run
/// use edgequake_recast::{ingest, RecastConfig};
///
/// # async fn run() -> Result<(), edgequake_recast::RecastError> {
/// let bytes = std::fs::read("lesson.pdf").unwrap();
/// let doc = ingest(bytes, &RecastConfig::default()).await?;
/// println!("{} pages, title '{}'", doc.page_count, doc.title);
/// # Ok(())
/// # }
/// ```
pub async fn ingest(bytes: Vec<u8>, config: &RecastConfig) -> Result<IntermediateDocument, RecastError> {
    let backend = Arc::new(PdfiumBackend::new(config.pdfium_library_path.clone()));
    ingest_with(backend, bytes, config).await
}

/// Resolve a path or URL, then ingest it.
pub async fn ingest_file(
    input_str: impl AsRef<str>,
    config: &RecastConfig,
) -> Result<IntermediateDocument, RecastError> {
    let input_str = input_str.as_ref();
    info!("Starting ingestion: {}", input_str);
    let source = resolve_input(input_str, config.download_timeout_secs).await?;
    ingest(source.bytes, config).await
}

/// Synchronous wrapper around [`ingest_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_sync(
    input_str: impl AsRef<str>,
    config: &RecastConfig,
) -> Result<IntermediateDocument, RecastError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RecastError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest_file(input_str, config))
}
