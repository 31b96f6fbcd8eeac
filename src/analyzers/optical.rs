// SPDX-License-Identifier: MIT

//! Local OCR tier
//!
//! Recognizes text on rendered images with a local engine, then either
//! resubmits that text to the remote model or composes fields from it
//! locally. Every engine call runs under a hard deadline.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{acceptable, heuristic, DocumentAnalyzer, Tier, Verdict};
use crate::config::{OcrConfig, PromptConfig};
use crate::extract::{ExtractedContent, SourceDocument};
use crate::ocr::{prepare_with_deadline, recognize_with_deadline, OcrEngine};
use crate::remote::RemoteClient;

/// Recognized text must exceed this many characters to count as a real
/// reading rather than noise.
const MIN_RECOGNIZED_CHARS: usize = 10;

pub struct LocalOpticalAnalyzer {
    engine: Option<Arc<dyn OcrEngine>>,
    remote: Arc<RemoteClient>,
    prompts: PromptConfig,
    min_confidence: f32,
    init_deadline: Duration,
    recognize_deadline: Duration,
    resubmit_to_remote: bool,
}

impl LocalOpticalAnalyzer {
    pub fn new(
        engine: Option<Arc<dyn OcrEngine>>,
        remote: Arc<RemoteClient>,
        config: &OcrConfig,
        prompts: PromptConfig,
    ) -> Self {
        let engine = if config.enabled { engine } else { None };
        Self {
            engine,
            remote,
            prompts,
            min_confidence: config.min_confidence,
            init_deadline: Duration::from_secs(config.init_timeout_secs),
            recognize_deadline: Duration::from_secs(config.recognize_timeout_secs),
            resubmit_to_remote: config.resubmit_to_remote,
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for LocalOpticalAnalyzer {
    fn name(&self) -> &str {
        "local-optical"
    }

    fn tier(&self) -> Tier {
        Tier::Ocr
    }

    async fn analyze(
        &self,
        document: &SourceDocument,
        content: Option<&ExtractedContent>,
    ) -> Verdict {
        let Some(engine) = self.engine.clone() else {
            return Verdict::declined("no OCR engine configured");
        };

        let bytes = match content {
            Some(ExtractedContent::RenderedImage { bytes, .. }) => bytes.clone(),
            _ => return Verdict::declined("no rendered image to recognize"),
        };

        if let Err(e) = prepare_with_deadline(engine.clone(), self.init_deadline).await {
            warn!("OCR engine preparation failed: {}", e);
            return Verdict::declined(format!("OCR engine unavailable: {}", e));
        }

        let fragments =
            match recognize_with_deadline(engine, bytes, self.recognize_deadline).await {
                Ok(fragments) => fragments,
                Err(e) => {
                    warn!("OCR failed on {}: {}", document.path.display(), e);
                    return Verdict::declined(format!("recognition failed: {}", e));
                }
            };

        let text = fragments
            .iter()
            .filter(|f| f.confidence >= self.min_confidence)
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        if text.chars().count() <= MIN_RECOGNIZED_CHARS {
            return Verdict::declined("recognized text too short to be meaningful");
        }
        debug!(
            "OCR read {} chars from {}",
            text.chars().count(),
            document.path.display()
        );

        if self.resubmit_to_remote && self.remote.is_available() {
            let prompt = format!("{}{}", self.prompts.document, text);
            match self.remote.infer_text(&prompt).await {
                Ok(answer) => {
                    if let Some(candidate) = acceptable(&answer) {
                        return Verdict::Accepted(candidate);
                    }
                }
                Err(failure) => {
                    warn!("resubmission to remote failed: {}", failure);
                }
            }
        }

        match heuristic::compose_fields(&text) {
            Some(candidate) => Verdict::Accepted(candidate),
            None => Verdict::declined("no recognizable fields in OCR text"),
        }
    }
}
