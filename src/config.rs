//! Configuration types for PDF recasting.
//!
//! Ingestion and structuring behaviour is controlled through
//! [`RecastConfig`], built via its [`RecastConfigBuilder`]. Page geometry and
//! typography are separate `Copy` structs in [`crate::layout::metrics`]
//! because they are fixed for the lifetime of a renderer.

use crate::error::RecastError;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for ingestion and text structuring.
///
/// Built via [`RecastConfig::builder()`] or using [`RecastConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_recast::RecastConfig;
///
/// let config = RecastConfig::builder()
///     .capture_scale(2.0)
///     .ocr_language("eng")
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_language, "eng");
/// ```
#[derive(Clone)]
pub struct RecastConfig {
    /// Scale factor applied to each page's intrinsic size when rasterising.
    /// Range: 0.5–6.0. Default: 3.0.
    ///
    /// At 3.0 an A4 page becomes roughly 1786 × 2526 px, sharp enough for
    /// OCR and for full-page figures in the output document.
    pub capture_scale: f32,

    /// JPEG quality for page captures, 1–100. Default: 100.
    pub jpeg_quality: u8,

    /// Language hint handed to the OCR engine. Default: `"fra"`.
    pub ocr_language: String,

    /// Number of pages OCR'd concurrently. Default: 4.
    ///
    /// Rasterisation stays sequential; only recognition overlaps. Outcomes
    /// are still delivered in page order.
    pub ocr_concurrency: usize,

    /// OCR engine. `None` skips recognition; every page then carries only
    /// its native text.
    pub ocr: Option<Arc<dyn OcrEngine>>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit path to the pdfium shared library. When `None`,
    /// `PDFIUM_LIB_PATH`, the working directory and the system library are
    /// tried in that order.
    pub pdfium_library_path: Option<PathBuf>,

    /// LLM model identifier for structuring and vision OCR.
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for structuring. Default: 0.4.
    pub temperature: f32,

    /// Maximum tokens the structuring answer may use. Default: 2000.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Characters of source text sent for structuring. Default: 4000.
    ///
    /// Longer text is cut and a truncation marker appended.
    pub max_input_chars: usize,

    /// Custom structuring system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Progress callback invoked as pages are captured and recognised.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RecastConfig {
    fn default() -> Self {
        Self {
            capture_scale: 3.0,
            jpeg_quality: 100,
            ocr_language: "fra".to_string(),
            ocr_concurrency: 4,
            ocr: None,
            password: None,
            pdfium_library_path: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.4,
            max_tokens: 2000,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_input_chars: 4000,
            system_prompt: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RecastConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecastConfig")
            .field("capture_scale", &self.capture_scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

impl RecastConfig {
    /// Create a new builder for `RecastConfig`.
    pub fn builder() -> RecastConfigBuilder {
        RecastConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RecastConfig`].
#[derive(Debug)]
pub struct RecastConfigBuilder {
    config: RecastConfig,
}

impl RecastConfigBuilder {
    pub fn capture_scale(mut self, scale: f32) -> Self {
        self.config.capture_scale = scale.clamp(0.5, 6.0);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr = Some(engine);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RecastConfig, RecastError> {
        let c = &self.config;
        if !(0.5..=6.0).contains(&c.capture_scale) {
            return Err(RecastError::InvalidConfig(format!(
                "Capture scale must be 0.5–6.0, got {}",
                c.capture_scale
            )));
        }
        if c.ocr_concurrency == 0 {
            return Err(RecastError::InvalidConfig(
                "OCR concurrency must be ≥ 1".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(RecastError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_input_chars == 0 {
            return Err(RecastError::InvalidConfig(
                "Structuring input cap must be ≥ 1 character".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_contract() {
        let c = RecastConfig::default();
        assert_eq!(c.capture_scale, 3.0);
        assert_eq!(c.jpeg_quality, 100);
        assert_eq!(c.ocr_language, "fra");
        assert_eq!(c.max_input_chars, 4000);
        assert!((c.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(c.max_tokens, 2000);
    }

    #[test]
    fn builder_clamps() {
        let c = RecastConfig::builder()
            .capture_scale(20.0)
            .jpeg_quality(0)
            .ocr_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.capture_scale, 6.0);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.ocr_concurrency, 1);
    }

    #[test]
    fn empty_language_is_rejected() {
        let err = RecastConfig::builder().ocr_language("  ").build().unwrap_err();
        assert!(matches!(err, RecastError::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", RecastConfig::default());
        assert!(s.contains("capture_scale"));
        assert!(!s.contains("progress_callback"));
    }
}
