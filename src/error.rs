//! Error types for the edgequake-recast library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RecastError`]: **Fatal**: the operation cannot proceed at all
//!   (unparseable source, no included blocks, an image payload that does not
//!   decode). Returned as `Err(RecastError)` from the public entry points.
//!
//! * [`PageError`]: **Non-fatal**: one page could not be captured or
//!   recognised, but every other page is fine. Stored inside
//!   [`crate::document::PageOutcome`] and
//!   [`crate::document::IntermediateDocument::failures`] so callers can see
//!   what was lost without losing the whole document to one bad page.
//!
//! Ingestion absorbs page errors; layout and rendering never degrade
//! silently, a malformed image in the final document is always surfaced.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-recast library.
///
/// Page-level failures use [`PageError`] and are stored in the ingestion
/// results rather than propagated here.
#[derive(Debug, Error)]
pub enum RecastError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Source errors ─────────────────────────────────────────────────────
    /// The bytes cannot be parsed as a PDF document.
    #[error("Source is not a readable PDF document: {detail}")]
    MalformedSource { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Layout / render errors ────────────────────────────────────────────
    /// Layout was asked to paginate a list with no included blocks.
    #[error("Nothing to render: no content block is included")]
    EmptyInput,

    /// An image block's payload could not be decoded into pixels.
    #[error("Cannot render block '{block_id}': {detail}")]
    RenderFailure { block_id: String, detail: String },

    // ── Structuring errors ────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The structuring call failed after all retries.
    #[error("Text structuring failed after {retries} retries: {detail}")]
    StructuringFailed { retries: u32, detail: String },

    /// The structuring service answered, but not with the expected shape.
    #[error("Structuring service returned an invalid outline: {0}")]
    InvalidOutline(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single source page.
///
/// Recorded in the page's [`crate::document::PageOutcome`]; ingestion always
/// continues with the next page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The native text layer could not be read; the page contributes no
    /// native text.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// Page rasterisation failed; no image and no OCR for this page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The rendered bitmap could not be JPEG-encoded.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodingFailed { page: usize, detail: String },

    /// OCR failed; the page keeps its raster and native text.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the failure belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::TextExtractionFailed { page, .. }
            | PageError::RasterisationFailed { page, .. }
            | PageError::EncodingFailed { page, .. }
            | PageError::OcrFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failure_names_the_block() {
        let e = RecastError::RenderFailure {
            block_id: "image-3".into(),
            detail: "invalid base64".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("image-3"), "got: {msg}");
        assert!(msg.contains("invalid base64"), "got: {msg}");
    }

    #[test]
    fn malformed_source_display() {
        let e = RecastError::MalformedSource {
            detail: "missing %PDF header".into(),
        };
        assert!(e.to_string().contains("missing %PDF header"));
    }

    #[test]
    fn page_error_reports_its_page() {
        let e = PageError::OcrFailed {
            page: 4,
            detail: "timeout".into(),
        };
        assert_eq!(e.page(), 4);
        assert!(e.to_string().starts_with("Page 4"));
    }

    #[test]
    fn page_error_round_trips_through_json() {
        let e = PageError::RasterisationFailed {
            page: 2,
            detail: "bitmap alloc".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
