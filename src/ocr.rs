// SPDX-License-Identifier: MIT

//! Local OCR engine abstraction
//!
//! Recognition runs on the blocking thread pool under a hard deadline. A
//! worker that overruns the deadline is abandoned rather than joined, so a
//! wedged native library cannot stall the batch.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{EntitleError, Result};

/// One recognized span of text with its confidence in `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct TextFragment {
    pub text: String,
    pub confidence: f32,
}

/// Pluggable OCR backend. `prepare` covers one-time model/data loading and
/// runs under its own deadline because a first call may download language
/// data.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    fn recognize(&self, image: &[u8]) -> Result<Vec<TextFragment>>;
}

/// Run a blocking engine call with a deadline. On expiry the spawned worker
/// keeps running detached; we only stop waiting for it.
pub async fn recognize_with_deadline(
    engine: Arc<dyn OcrEngine>,
    image: Vec<u8>,
    deadline: Duration,
) -> Result<Vec<TextFragment>> {
    let task = tokio::task::spawn_blocking(move || engine.recognize(&image));

    match tokio::time::timeout(deadline, task).await {
        Ok(joined) => joined.map_err(|e| EntitleError::Ocr(format!("OCR worker panicked: {}", e)))?,
        Err(_) => Err(EntitleError::RecognitionTimeout(deadline)),
    }
}

/// Run engine preparation with a deadline, same abandonment semantics.
pub async fn prepare_with_deadline(engine: Arc<dyn OcrEngine>, deadline: Duration) -> Result<()> {
    let task = tokio::task::spawn_blocking(move || engine.prepare());

    match tokio::time::timeout(deadline, task).await {
        Ok(joined) => joined.map_err(|e| EntitleError::Ocr(format!("OCR worker panicked: {}", e)))?,
        Err(_) => Err(EntitleError::RecognitionTimeout(deadline)),
    }
}

/// Tesseract-backed engine via leptess. Compiled in only with the `ocr`
/// feature since it links native Tesseract/Leptonica.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    languages: String,
    datapath: Option<String>,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new(languages: &str, datapath: Option<String>) -> Self {
        Self {
            languages: languages.to_string(),
            datapath,
        }
    }

    fn api(&self) -> Result<leptess::LepTess> {
        leptess::LepTess::new(self.datapath.as_deref(), &self.languages)
            .map_err(|e| EntitleError::Ocr(format!("tesseract init failed: {}", e)))
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn prepare(&self) -> Result<()> {
        self.api().map(|_| ())
    }

    fn recognize(&self, image: &[u8]) -> Result<Vec<TextFragment>> {
        let mut api = self.api()?;
        api.set_image_from_mem(image)
            .map_err(|e| EntitleError::Ocr(format!("tesseract rejected image: {}", e)))?;

        let text = api
            .get_utf8_text()
            .map_err(|e| EntitleError::Ocr(format!("tesseract recognition failed: {}", e)))?;
        let confidence = api.mean_text_conf() as f32 / 100.0;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| TextFragment {
                text: line.to_string(),
                confidence,
            })
            .collect())
    }
}
