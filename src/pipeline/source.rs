//! PDF parsing capability: page count, native text layer and rasterisation.
//!
//! Ingestion talks to [`PdfBackend`] / [`SourceDocument`] only. The shipped
//! backend is pdfium, through `pdfium-render`.
//!
//! ## Why a visitor?
//!
//! A pdfium document borrows the `Pdfium` instance and the source bytes, so
//! it cannot be returned from a function that creates both. Instead the
//! backend opens the document and hands a `&dyn SourceDocument` to the
//! caller's closure; everything is released when the closure returns.
//!
//! All methods are blocking. Callers run them inside `spawn_blocking`.

use crate::error::RecastError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// An opened source document. Page indices are 0-based.
pub trait SourceDocument {
    fn page_count(&self) -> usize;

    /// Text of the page's native text layer; empty for scanned pages.
    fn native_text(&self, index: usize) -> Result<String, String>;

    /// Render the page at `scale` × its intrinsic size.
    fn rasterize(&self, index: usize, scale: f32) -> Result<DynamicImage, String>;
}

/// Opens PDF bytes.
pub trait PdfBackend: Send + Sync {
    /// Parse `bytes` and call `visit` with the opened document.
    ///
    /// # Errors
    /// [`RecastError::MalformedSource`] when the bytes do not parse, and the
    /// password errors for encrypted documents.
    fn with_document(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(&dyn SourceDocument),
    ) -> Result<(), RecastError>;
}

/// [`PdfBackend`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the
    /// working directory, then the system library.
    fn bind(&self) -> Result<Pdfium, RecastError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let lib = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                debug!("Binding pdfium at {}", lib.display());
                Pdfium::bind_to_library(&lib)
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| RecastError::PdfiumBindingFailed(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn with_document(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(&dyn SourceDocument),
    ) -> Result<(), RecastError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        RecastError::WrongPassword
                    } else {
                        RecastError::PasswordRequired
                    }
                } else {
                    RecastError::MalformedSource { detail: err_str }
                }
            })?;

        let source = PdfiumDocument { document };
        info!("PDF loaded: {} pages", source.page_count());
        visit(&source);
        Ok(())
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, String> {
        let index = u16::try_from(index).map_err(|_| format!("page index {index} out of range"))?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| format!("{:?}", e))
    }
}

impl SourceDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn native_text(&self, index: usize) -> Result<String, String> {
        let page = self.page(index)?;
        let text = page.text().map_err(|e| format!("{:?}", e))?;
        Ok(text.all())
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<DynamicImage, String> {
        let page = self.page(index)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("{:?}", e))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
