//! OCR engines: recover text from a page raster.
//!
//! Ingestion only sees the [`OcrEngine`] trait. Two implementations ship:
//!
//! - [`VisionOcr`] sends the page to a vision-capable model through
//!   `edgequake-llm` and asks for a plain-text transcription.
//! - `LocalOcr` (feature `local-ocr`) runs the `ocrs` neural engine on the
//!   blocking pool. Its models are script-based, so the language hint is
//!   ignored.

use crate::config::RecastConfig;
use crate::error::RecastError;
use crate::pipeline::encode::{encode_jpeg, JPEG_MIME};
use crate::pipeline::llm::{build_options, chat_with_retry, resolve_provider, RetryPolicy};
use crate::pipeline::postprocess::clean_text;
use crate::prompts::transcribe_prompt;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, ImageData, LLMProvider};
use futures::future::BoxFuture;
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;

/// Recognition failure for one image.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct OcrError(pub String);

/// Text recognition over a page raster.
///
/// Implementations must be `Send + Sync`: ingestion recognises several pages
/// concurrently through one shared `Arc<dyn OcrEngine>`.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text in `image`. An empty string means the page has no
    /// recognisable text; it is not an error.
    fn recognize<'a>(
        &'a self,
        image: &'a DynamicImage,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, OcrError>>;
}

// ── Vision model OCR ─────────────────────────────────────────────────────────

/// OCR through a vision-capable LLM.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    jpeg_quality: u8,
    max_tokens: usize,
    policy: RetryPolicy,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            jpeg_quality: 90,
            max_tokens: 4096,
            policy: RetryPolicy {
                max_retries: 3,
                backoff_ms: 500,
            },
        }
    }

    /// Resolve the provider the same way structuring does and reuse the
    /// config's retry policy.
    pub fn from_config(config: &RecastConfig) -> Result<Self, RecastError> {
        let mut ocr = Self::new(resolve_provider(config)?);
        ocr.policy = RetryPolicy::from_config(config);
        Ok(ocr)
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }
}

impl OcrEngine for VisionOcr {
    fn recognize<'a>(
        &'a self,
        image: &'a DynamicImage,
        language: &'a str,
    ) -> BoxFuture<'a, Result<String, OcrError>> {
        Box::pin(async move {
            let jpeg = encode_jpeg(image, self.jpeg_quality)
                .map_err(|e| OcrError(format!("encoding page for OCR: {e}")))?;
            let data = ImageData::new(STANDARD.encode(&jpeg), JPEG_MIME).with_detail("high");

            let messages = vec![
                ChatMessage::system(transcribe_prompt(language)),
                ChatMessage::user_with_images("", vec![data]),
            ];
            // Transcription wants a faithful, deterministic answer.
            let options = build_options(0.0, self.max_tokens);

            let raw = chat_with_retry(&self.provider, &messages, &options, self.policy, "OCR")
                .await
                .map_err(OcrError)?;
            Ok(clean_text(&raw))
        })
    }
}

// ── Local neural OCR ─────────────────────────────────────────────────────────

#[cfg(feature = "local-ocr")]
pub use local::{LocalOcr, LocalOcrModels};

#[cfg(feature = "local-ocr")]
mod local {
    use super::{OcrEngine, OcrError};
    use crate::error::RecastError;
    use futures::future::BoxFuture;
    use image::DynamicImage;
    use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
    use rten::Model;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tracing::{debug, info};

    const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
    const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

    /// Locations of the two `ocrs` model files.
    #[derive(Debug, Clone)]
    pub struct LocalOcrModels {
        pub detection: PathBuf,
        pub recognition: PathBuf,
    }

    impl Default for LocalOcrModels {
        /// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`, where
        /// `ocrs-cli` downloads its models.
        fn default() -> Self {
            let dir = if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
                PathBuf::from(xdg).join("ocrs")
            } else if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(home).join(".cache").join("ocrs")
            } else {
                PathBuf::from("ocrs-models")
            };
            Self::from_dir(dir)
        }
    }

    impl LocalOcrModels {
        pub fn from_dir(dir: impl AsRef<Path>) -> Self {
            let dir = dir.as_ref();
            Self {
                detection: dir.join(DETECTION_MODEL_FILENAME),
                recognition: dir.join(RECOGNITION_MODEL_FILENAME),
            }
        }
    }

    /// Offline OCR with the `ocrs` engine.
    pub struct LocalOcr {
        engine: Arc<OcrsEngine>,
    }

    impl LocalOcr {
        /// Load both models. This is the expensive step; build one engine
        /// and share it.
        pub fn new(models: &LocalOcrModels) -> Result<Self, RecastError> {
            let load = |path: &Path, what: &str| {
                if !path.exists() {
                    return Err(RecastError::InvalidConfig(format!(
                        "{what} model not found at {}; run `ocrs-cli` once to download models",
                        path.display()
                    )));
                }
                Model::load_file(path).map_err(|e| {
                    RecastError::InvalidConfig(format!(
                        "failed to load {what} model from {}: {e}",
                        path.display()
                    ))
                })
            };

            info!("Loading OCR models");
            let detection_model = load(&models.detection, "detection")?;
            let recognition_model = load(&models.recognition, "recognition")?;

            let engine = OcrsEngine::new(OcrEngineParams {
                detection_model: Some(detection_model),
                recognition_model: Some(recognition_model),
                ..Default::default()
            })
            .map_err(|e| RecastError::InvalidConfig(format!("failed to initialise OCR engine: {e}")))?;

            Ok(Self {
                engine: Arc::new(engine),
            })
        }
    }

    impl OcrEngine for LocalOcr {
        fn recognize<'a>(
            &'a self,
            image: &'a DynamicImage,
            _language: &'a str,
        ) -> BoxFuture<'a, Result<String, OcrError>> {
            let rgb = image.to_rgb8();
            let engine = Arc::clone(&self.engine);

            Box::pin(async move {
                let text = tokio::task::spawn_blocking(move || {
                    let (width, height) = rgb.dimensions();
                    let source = ImageSource::from_bytes(rgb.as_raw(), (width, height))
                        .map_err(|e| OcrError(format!("image source {width}x{height}: {e}")))?;
                    let input = engine
                        .prepare_input(source)
                        .map_err(|e| OcrError(format!("preprocessing: {e}")))?;
                    engine
                        .get_text(&input)
                        .map_err(|e| OcrError(format!("recognition: {e}")))
                })
                .await
                .map_err(|e| OcrError(format!("OCR task panicked: {e}")))??;

                debug!(chars = text.len(), "Local OCR complete");
                Ok(text)
            })
        }
    }
}
