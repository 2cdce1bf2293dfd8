//! Pipeline stages for PDF ingestion and structuring.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ encode ──▶ ocr ──▶ postprocess
//! (URL/path) (pdfium)  (JPEG)    (engine)  (cleanup)
//!                                   │
//!                     structure ◀───┘ (full text → outline)
//! ```
//!
//! 1. [`input`]: resolve the user-supplied path or URL to PDF bytes
//! 2. [`source`]: open the document, read text layers and rasterise pages;
//!    blocking, so it runs in `spawn_blocking`
//! 3. [`encode`]: JPEG-encode page bitmaps; data-URL helpers
//! 4. [`ocr`]: recognise text in page rasters
//! 5. [`postprocess`]: deterministic cleanup of model output
//! 6. [`structure`]: turn the extracted text into a lesson outline
//! 7. [`llm`]: provider resolution and retrying chat calls for 4 and 6

pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod source;
pub mod structure;
