// SPDX-License-Identifier: MIT

//! Remote reasoning tier
//!
//! Sends extracted text to the chat model, or a downscaled JPEG to the
//! vision model, and treats the reply as a name candidate. Skips itself
//! cleanly when no credential is configured.

use async_trait::async_trait;
use base64::Engine;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

use super::{acceptable, DocumentAnalyzer, Tier, Verdict};
use crate::config::PromptConfig;
use crate::error::Result;
use crate::extract::{ExtractedContent, SourceDocument};
use crate::remote::RemoteClient;

/// Content beyond this many characters adds tokens without adding naming
/// signal.
const MAX_PROMPT_CHARS: usize = 2000;

/// Longest image edge sent to the vision model.
const MAX_IMAGE_EDGE: u32 = 1024;

pub struct RemoteSemanticAnalyzer {
    client: Arc<RemoteClient>,
    prompts: PromptConfig,
}

impl RemoteSemanticAnalyzer {
    pub fn new(client: Arc<RemoteClient>, prompts: PromptConfig) -> Self {
        Self { client, prompts }
    }

    fn text_prompt(&self, text: &str) -> String {
        let snippet: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        format!("{}{}", self.prompts.document, snippet)
    }
}

/// Downscale and re-encode to JPEG for the vision endpoint. Raw scans are
/// routinely tens of megabytes; the model needs nowhere near that.
pub fn prepare_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;

    let img = if img.width() > MAX_IMAGE_EDGE || img.height() > MAX_IMAGE_EDGE {
        img.resize(
            MAX_IMAGE_EDGE,
            MAX_IMAGE_EDGE,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    img.to_rgb8()
        .write_to(&mut out, image::ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

#[async_trait]
impl DocumentAnalyzer for RemoteSemanticAnalyzer {
    fn name(&self) -> &str {
        "remote-semantic"
    }

    fn tier(&self) -> Tier {
        Tier::Remote
    }

    async fn analyze(
        &self,
        document: &SourceDocument,
        content: Option<&ExtractedContent>,
    ) -> Verdict {
        if !self.client.is_available() {
            return Verdict::declined_with(
                "remote credential not configured",
                "设置 DEEPSEEK_API_KEY 或在配置文件中填写 api_key",
            );
        }

        let reply = match content {
            Some(ExtractedContent::Text { text, .. }) => {
                self.client.infer_text(&self.text_prompt(text)).await
            }
            Some(ExtractedContent::RenderedImage { bytes, .. }) => {
                let jpeg = match prepare_image(bytes) {
                    Ok(jpeg) => jpeg,
                    Err(e) => {
                        return Verdict::declined(format!(
                            "image preparation failed for {}: {}",
                            document.path.display(),
                            e
                        ))
                    }
                };
                let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
                self.client
                    .infer_image(&self.prompts.vision, &encoded)
                    .await
            }
            None => return Verdict::declined("no content available for remote analysis"),
        };

        match reply {
            Ok(answer) => match acceptable(&answer) {
                Some(candidate) => Verdict::Accepted(candidate),
                None => {
                    debug!("remote declined to name {}", document.path.display());
                    Verdict::declined("remote model could not identify the document")
                }
            },
            Err(failure) => Verdict::declined_with(failure.message.clone(), failure.suggestion),
        }
    }
}
