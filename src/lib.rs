// SPDX-License-Identifier: MIT

//! Entitle: content-aware batch file renamer
//!
//! Infers a meaningful `<entity>-<document-type>-<date>` name for each file in
//! a batch from its content, falling through a chain of analyzers (remote
//! reasoning service, OCR, local heuristics), then applies the renames with a
//! replayable operation log so the whole batch can be undone.

pub mod analyzers;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod naming;
pub mod ocr;
pub mod oplog;
pub mod remote;

pub use config::AppConfig;
pub use error::{EntitleError, Result};
