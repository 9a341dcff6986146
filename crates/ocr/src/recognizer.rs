use std::sync::OnceLock;

use thiserror::Error;

use crate::fragment::TextFragment;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine failed to initialise: {0}")]
    Init(String),
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return positioned text fragments.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<TextFragment>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set page of fragments regardless of the image.
pub struct MockRecognizer {
    pub fragments: Vec<TextFragment>,
}

impl MockRecognizer {
    pub fn new(fragments: Vec<TextFragment>) -> Self {
        Self { fragments }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<TextFragment>, OcrError> {
        Ok(self.fragments.clone())
    }
}

// ── Lazily initialised backend ────────────────────────────────────────────────

type Init<R> = Box<dyn Fn() -> Result<R, OcrError> + Send + Sync>;

/// Loads the wrapped engine on first use and keeps it for the life of the
/// process. A failed load is reported to the caller and retried on the next call.
pub struct LazyRecognizer<R> {
    init: Init<R>,
    engine: OnceLock<R>,
}

impl<R: OcrBackend> LazyRecognizer<R> {
    pub fn new(init: impl Fn() -> Result<R, OcrError> + Send + Sync + 'static) -> Self {
        Self { init: Box::new(init), engine: OnceLock::new() }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.get().is_some()
    }

    fn engine(&self) -> Result<&R, OcrError> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        let loaded = (self.init)()?;
        tracing::info!("OCR engine loaded");
        // A concurrent first call may have won the race; its engine is kept.
        Ok(self.engine.get_or_init(|| loaded))
    }
}

impl<R: OcrBackend> OcrBackend for LazyRecognizer<R> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<TextFragment>, OcrError> {
        self.engine()?.recognize(image_bytes)
    }
}
