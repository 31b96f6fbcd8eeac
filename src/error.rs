// SPDX-License-Identifier: MIT

//! Error types for Entitle

use std::time::Duration;
use thiserror::Error;

use crate::remote::RemoteFailure;

/// Result type alias for Entitle operations
pub type Result<T> = std::result::Result<T, EntitleError>;

/// Entitle error types
#[derive(Error, Debug)]
pub enum EntitleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Remote analysis failed: {0}")]
    Remote(#[from] RemoteFailure),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR exceeded deadline of {0:?}")]
    RecognitionTimeout(Duration),
}
