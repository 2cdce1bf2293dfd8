//! Offline integration tests for the ingestion → curation → render pipeline.
//!
//! pdfium and LLM providers are replaced by in-process mocks, so these run
//! everywhere without network access or native libraries.

use edgequake_recast::document::UNTITLED;
use edgequake_recast::{
    ingest_stream_with, ingest_with, render_document, render_to_file, sanitize_file_name,
    BlockKind, BlockList, ContentBlock, DocumentOutline, IngestProgressCallback, OcrEngine,
    OcrError, OutlineSection, PageError, PdfBackend, RecastConfig, RecastError, SourceDocument,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use image::{DynamicImage, GenericImageView};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PDF_BYTES: &[u8] = b"%PDF-1.7\n% mock document\n";

// ── Mocks ────────────────────────────────────────────────────────────────────

/// Per-page behaviour of the mock document.
#[derive(Clone)]
struct MockPage {
    text: Result<String, String>,
    raster_ok: bool,
}

impl MockPage {
    fn text(text: &str) -> Self {
        Self {
            text: Ok(text.to_string()),
            raster_ok: true,
        }
    }

    fn scanned() -> Self {
        Self::text("")
    }

    fn broken() -> Self {
        Self {
            text: Err("no text layer".into()),
            raster_ok: false,
        }
    }

    fn without_raster(mut self) -> Self {
        self.raster_ok = false;
        self
    }
}

/// Stand-in for pdfium. Page `i` rasterises to a `(10 + i) × 20` bitmap so
/// OCR mocks can tell pages apart.
struct MockBackend {
    pages: Vec<MockPage>,
    malformed: bool,
    rasterised: AtomicUsize,
}

impl MockBackend {
    fn new(pages: Vec<MockPage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            malformed: false,
            rasterised: AtomicUsize::new(0),
        })
    }

    fn malformed() -> Arc<Self> {
        Arc::new(Self {
            pages: Vec::new(),
            malformed: true,
            rasterised: AtomicUsize::new(0),
        })
    }
}

struct MockDocument<'a> {
    backend: &'a MockBackend,
}

impl SourceDocument for MockDocument<'_> {
    fn page_count(&self) -> usize {
        self.backend.pages.len()
    }

    fn native_text(&self, index: usize) -> Result<String, String> {
        self.backend.pages[index].text.clone()
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<DynamicImage, String> {
        self.backend.rasterised.fetch_add(1, Ordering::SeqCst);
        if !self.backend.pages[index].raster_ok {
            return Err("bitmap allocation failed".into());
        }
        let width = ((10 + index as u32) as f32 * scale / 3.0).round() as u32;
        Ok(DynamicImage::new_rgb8(width, 20))
    }
}

impl PdfBackend for MockBackend {
    fn with_document(
        &self,
        _bytes: &[u8],
        _password: Option<&str>,
        visit: &mut dyn FnMut(&dyn SourceDocument),
    ) -> Result<(), RecastError> {
        if self.malformed {
            return Err(RecastError::MalformedSource {
                detail: "xref table missing".into(),
            });
        }
        visit(&MockDocument { backend: self });
        Ok(())
    }
}

/// Page number encoded in the mock raster width.
fn page_of(image: &DynamicImage) -> u32 {
    image.dimensions().0 - 10 + 1
}

/// Answers `OCR page N`; earlier pages take longer, so completion order is
/// the reverse of page order.
struct SlowOcr {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowOcr {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

impl OcrEngine for SlowOcr {
    fn recognize<'a>(
        &'a self,
        image: &'a DynamicImage,
        _language: &'a str,
    ) -> BoxFuture<'a, Result<String, OcrError>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let page = page_of(image);
            tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(page as u64 * 10))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("OCR page {page}"))
        })
    }
}

/// Fails on one page, returns blank text everywhere else.
struct FlakyOcr {
    failing_page: u32,
    languages: Mutex<Vec<String>>,
}

impl OcrEngine for FlakyOcr {
    fn recognize<'a>(
        &'a self,
        image: &'a DynamicImage,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, OcrError>> {
        Box::pin(async move {
            if let Ok(mut langs) = self.languages.lock() {
                langs.push(language.to_string());
            }
            if page_of(image) == self.failing_page {
                Err(OcrError("model timed out".into()))
            } else {
                Ok("   \n".into())
            }
        })
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_with(ocr: Option<Arc<dyn OcrEngine>>, concurrency: usize) -> RecastConfig {
    let mut config = RecastConfig::builder()
        .ocr_concurrency(concurrency)
        .build()
        .expect("valid config");
    config.ocr = ocr;
    config
}

// ── Ingestion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cover_is_page_one_and_images_are_the_rest() {
    let backend = MockBackend::new(vec![
        MockPage::text("Photosynthesis\nA short lesson"),
        MockPage::text("Light reactions"),
        MockPage::text("Calvin cycle"),
    ]);
    let doc = ingest_with(backend, PDF_BYTES.to_vec(), &config_with(None, 2))
        .await
        .expect("ingestion succeeds");

    assert_eq!(doc.page_count, 3);
    assert_eq!(doc.title, "Photosynthesis");
    assert_eq!(doc.cover_image.as_ref().map(|r| r.page_num), Some(1));
    let pages: Vec<usize> = doc.page_images.iter().map(|r| r.page_num).collect();
    assert_eq!(pages, vec![2, 3]);
    assert!(doc.failures.is_empty());

    let light = doc.full_text.find("Light reactions").expect("page 2 text");
    let calvin = doc.full_text.find("Calvin cycle").expect("page 3 text");
    assert!(light < calvin);

    // Captures are JPEG.
    let cover = doc.cover_image.as_ref().expect("cover");
    assert_eq!(&cover.jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(cover.height, 20);
}

#[tokio::test]
async fn cover_falls_back_to_first_page_image() {
    let backend = MockBackend::new(vec![
        MockPage::text("Title page").without_raster(),
        MockPage::text("Body"),
        MockPage::text("More body"),
    ]);
    let doc = ingest_with(backend, PDF_BYTES.to_vec(), &config_with(None, 1))
        .await
        .expect("ingestion succeeds");

    assert_eq!(doc.cover_image.as_ref().map(|r| r.page_num), Some(2));
    assert_eq!(doc.page_images.len(), 2);
    assert_eq!(doc.failed_pages(), vec![1]);
    assert!(matches!(
        doc.failures[0],
        PageError::RasterisationFailed { page: 1, .. }
    ));
    // Page 1's text still counts for the title.
    assert_eq!(doc.title, "Title page");
}

#[tokio::test]
async fn every_page_failing_still_yields_a_document() {
    init_tracing();
    let backend = MockBackend::new(vec![MockPage::broken(), MockPage::broken()]);
    let doc = ingest_with(backend, PDF_BYTES.to_vec(), &config_with(None, 4))
        .await
        .expect("page failures are absorbed");

    assert_eq!(doc.page_count, 2);
    assert!(doc.full_text.trim().is_empty());
    assert!(doc.cover_image.is_none());
    assert!(doc.page_images.is_empty());
    assert_eq!(doc.title, UNTITLED);
    assert_eq!(doc.failures.len(), 4);
    assert_eq!(doc.failed_pages(), vec![1, 2]);
}

#[tokio::test]
async fn ocr_text_keeps_page_order_under_concurrency() {
    init_tracing();
    let ocr = SlowOcr::new();
    let backend = MockBackend::new((0..5).map(|_| MockPage::scanned()).collect());
    let config = config_with(Some(ocr.clone() as Arc<dyn OcrEngine>), 3);

    let doc = ingest_with(backend, PDF_BYTES.to_vec(), &config)
        .await
        .expect("ingestion succeeds");

    let positions: Vec<usize> = (1..=5)
        .map(|p| {
            doc.full_text
                .find(&format!("[OCR text, page {p}]\nOCR page {p}"))
                .unwrap_or_else(|| panic!("page {p} OCR block missing"))
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(ocr.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(doc.title, "OCR page 1");
}

#[tokio::test]
async fn ocr_failure_is_recorded_and_blank_text_dropped() {
    let ocr = Arc::new(FlakyOcr {
        failing_page: 2,
        languages: Mutex::new(Vec::new()),
    });
    let backend = MockBackend::new(vec![
        MockPage::text("Intro"),
        MockPage::text("Second"),
        MockPage::text("Third"),
    ]);
    let mut config = config_with(Some(ocr.clone() as Arc<dyn OcrEngine>), 2);
    config.ocr_language = "eng".into();

    let doc = ingest_with(backend, PDF_BYTES.to_vec(), &config)
        .await
        .expect("ingestion succeeds");

    assert!(!doc.full_text.contains("[OCR text"));
    assert_eq!(doc.failed_pages(), vec![2]);
    assert!(matches!(doc.failures[0], PageError::OcrFailed { page: 2, .. }));
    // The failing page keeps its raster.
    assert!(doc.page_images.iter().any(|r| r.page_num == 2));

    let langs = ocr.languages.lock().expect("lock");
    assert_eq!(langs.len(), 3);
    assert!(langs.iter().all(|l| l == "eng"));
}

#[tokio::test]
async fn non_pdf_bytes_are_malformed() {
    let backend = MockBackend::new(vec![MockPage::text("x")]);
    let err = ingest_with(backend.clone(), b"<html>".to_vec(), &config_with(None, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RecastError::MalformedSource { .. }));
    assert_eq!(backend.rasterised.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn backend_parse_errors_surface_before_any_page() {
    let err = ingest_with(MockBackend::malformed(), PDF_BYTES.to_vec(), &config_with(None, 1))
        .await
        .unwrap_err();
    match err {
        RecastError::MalformedSource { detail } => assert!(detail.contains("xref")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn ingestion_runs_on_a_current_thread_runtime() {
    let backend = MockBackend::new(vec![MockPage::text("Only page")]);
    let doc = tokio_test::block_on(ingest_with(backend, PDF_BYTES.to_vec(), &config_with(None, 1)))
        .expect("ingestion succeeds");
    assert_eq!(doc.page_count, 1);
    assert!(doc.page_images.is_empty());
    assert_eq!(doc.title, "Only page");
}

#[tokio::test]
async fn stream_reports_page_count_and_yields_in_order() {
    let backend = MockBackend::new((0..4).map(|i| MockPage::text(&format!("p{i}"))).collect());
    let stream = ingest_stream_with(backend, PDF_BYTES.to_vec(), &config_with(None, 2))
        .await
        .expect("document opens");
    assert_eq!(stream.page_count(), 4);

    let pages: Vec<usize> = stream.map(|o| o.page_num).collect().await;
    assert_eq!(pages, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn dropping_the_stream_stops_the_walk() {
    let backend = MockBackend::new((0..50).map(|_| MockPage::scanned()).collect());
    let mut stream = ingest_stream_with(backend.clone(), PDF_BYTES.to_vec(), &config_with(None, 1))
        .await
        .expect("document opens");
    let first = stream.next().await.expect("first page");
    assert_eq!(first.page_num, 1);
    drop(stream);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(backend.rasterised.load(Ordering::SeqCst) < 50);
}

#[tokio::test]
async fn progress_callbacks_fire_per_page() {
    #[derive(Default)]
    struct Recorder {
        started_with: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        clean: AtomicUsize,
    }

    impl IngestProgressCallback for Recorder {
        fn on_ingestion_start(&self, total_pages: usize) {
            self.started_with.store(total_pages, Ordering::SeqCst);
        }
        fn on_page_start(&self, _page_num: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _page_num: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _page_num: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_ingestion_complete(&self, _total: usize, clean_pages: usize) {
            self.clean.store(clean_pages, Ordering::SeqCst);
        }
    }

    let recorder = Arc::new(Recorder::default());
    let backend = MockBackend::new(vec![
        MockPage::text("one"),
        MockPage::text("two").without_raster(),
        MockPage::text("three"),
    ]);
    let config = RecastConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn IngestProgressCallback>)
        .build()
        .expect("valid config");

    ingest_with(backend, PDF_BYTES.to_vec(), &config)
        .await
        .expect("ingestion succeeds");

    assert_eq!(recorder.started_with.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.starts.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.completes.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.clean.load(Ordering::SeqCst), 2);
}

// ── Curation and rendering ───────────────────────────────────────────────────

fn outline() -> DocumentOutline {
    DocumentOutline {
        title: "Photosynthesis".into(),
        introduction: "How plants turn light into sugar.".into(),
        sections: vec![
            OutlineSection {
                title: "Light reactions".into(),
                content: "Happen in the thylakoid membranes.".into(),
                key_points: vec!["ATP".into(), "NADPH".into()],
            },
            OutlineSection {
                title: "Calvin cycle".into(),
                content: "Fixes carbon dioxide.".into(),
                key_points: Vec::new(),
            },
        ],
        conclusion: "Both stages depend on each other.".into(),
    }
}

#[tokio::test]
async fn ingested_document_renders_through_block_list() {
    let backend = MockBackend::new(vec![
        MockPage::text("Photosynthesis"),
        MockPage::text("Figure page"),
    ]);
    let doc = ingest_with(backend, PDF_BYTES.to_vec(), &config_with(None, 2))
        .await
        .expect("ingestion succeeds");

    let mut blocks = BlockList::from_outline(&outline(), &doc, &doc.title);
    let ids: Vec<&str> = blocks.blocks().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["first-page", "introduction", "concept-0", "concept-1", "conclusion", "image-0"]
    );
    assert!(!blocks.get("image-0").expect("figure").included);

    assert_eq!(blocks.toggle("image-0"), Some(true));
    assert!(blocks.move_to("conclusion", "image-0"));
    let custom = blocks.push_text("Notes", "Revise before the exam.");
    assert_eq!(blocks.get(&custom).map(|b| b.kind), Some(BlockKind::Text));

    let pdf = render_document(blocks.blocks(), "Photosynthesis").expect("renders");
    assert!(pdf.starts_with(b"%PDF"));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = render_to_file(blocks.blocks(), "Ch. 3: Évolution!!", dir.path()).expect("written");
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("ch_3_volution.pdf"));
    assert!(std::fs::read(&path).expect("readable").starts_with(b"%PDF"));
}

#[test]
fn nothing_included_is_an_empty_input() {
    let blocks = vec![ContentBlock::text("a", "A", "body").excluded()];
    let err = render_document(&blocks, "Empty").unwrap_err();
    assert!(matches!(err, RecastError::EmptyInput));
}

#[test]
fn broken_image_names_its_block() {
    let blocks = vec![
        ContentBlock::text("intro", "Intro", "text"),
        ContentBlock::image("fig", "Figure", "data:image/jpeg;base64,not-base64!!"),
    ];
    match render_document(&blocks, "Broken").unwrap_err() {
        RecastError::RenderFailure { block_id, .. } => assert_eq!(block_id, "fig"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sanitize_matches_output_names() {
    assert_eq!(sanitize_file_name("Ch. 3: Évolution!!"), "ch_3_volution");
    assert_eq!(sanitize_file_name("!!!"), "document");
}
