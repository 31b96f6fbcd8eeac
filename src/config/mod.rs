// SPDX-License-Identifier: MIT

//! Configuration loading and defaults
//!
//! Configuration lives in a JSON file; every field has a default so a missing
//! or partial file still yields a working setup. The remote credential can
//! also come from the `DEEPSEEK_API_KEY` environment variable, which takes
//! precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{EntitleError, Result};

/// Placeholder value shipped in generated configs; never used as a credential.
const API_KEY_PLACEHOLDER: &str = "your_api_key_here";

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub rules: RuleConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    /// Operation log written by the rename engine, consumed by rollback.
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            ocr: OcrConfig::default(),
            rules: RuleConfig::default(),
            prompts: PromptConfig::default(),
            filters: FilterConfig::default(),
            log_path: default_log_path(),
        }
    }
}

/// Remote reasoning endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Credential from the config file. The `DEEPSEEK_API_KEY` environment
    /// variable overrides this when set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_text_timeout_secs")]
    pub text_timeout_secs: u64,
    #[serde(default = "default_vision_timeout_secs")]
    pub vision_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            vision_model: default_vision_model(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            text_timeout_secs: default_text_timeout_secs(),
            vision_timeout_secs: default_vision_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Resolve the effective credential: environment first, then the config
    /// file. Empty strings and the generated placeholder do not count.
    pub fn resolve_api_key(&self) -> Option<String> {
        let candidate = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .or_else(|| self.api_key.clone())?;
        let candidate = candidate.trim().to_string();
        if candidate.is_empty() || candidate == API_KEY_PLACEHOLDER {
            None
        } else {
            Some(candidate)
        }
    }
}

/// Local OCR tier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tesseract language string, e.g. "chi_sim+eng"
    #[serde(default = "default_languages")]
    pub languages: String,
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    #[serde(default = "default_recognize_timeout_secs")]
    pub recognize_timeout_secs: u64,
    /// Fragments below this confidence are discarded.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Send recognized text back to the remote tier instead of composing
    /// fields locally.
    #[serde(default = "default_true")]
    pub resubmit_to_remote: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            init_timeout_secs: default_init_timeout_secs(),
            recognize_timeout_secs: default_recognize_timeout_secs(),
            min_confidence: default_min_confidence(),
            resubmit_to_remote: true,
        }
    }
}

/// Final name shaping rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Lowercase heuristic-derived names.
    #[serde(default = "default_true")]
    pub lowercase: bool,
    /// Replace spaces with underscores in heuristic-derived names.
    #[serde(default = "default_true")]
    pub space_to_underscore: bool,
    /// Maximum stem length in characters, extension excluded.
    #[serde(default = "default_max_stem_length")]
    pub max_stem_length: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            space_to_underscore: true,
            max_stem_length: default_max_stem_length(),
        }
    }
}

/// Prompt templates sent to the remote models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_document_prompt")]
    pub document: String,
    #[serde(default = "default_vision_prompt")]
    pub vision: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            document: default_document_prompt(),
            vision: default_vision_prompt(),
        }
    }
}

/// Batch intake filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Extensions (lowercase, no dot) eligible for renaming.
    #[serde(default = "default_include_exts")]
    pub include_exts: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_exts: default_include_exts(),
        }
    }
}

fn default_log_path() -> String {
    "entitle_log.jsonl".to_string()
}

fn default_base_url() -> String {
    "https://api.deepseek.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_vision_model() -> String {
    "deepseek-vl".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_text_timeout_secs() -> u64 {
    30
}

fn default_vision_timeout_secs() -> u64 {
    45
}

fn default_true() -> bool {
    true
}

fn default_languages() -> String {
    "chi_sim+eng".to_string()
}

fn default_init_timeout_secs() -> u64 {
    60
}

fn default_recognize_timeout_secs() -> u64 {
    120
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_max_stem_length() -> usize {
    60
}

fn default_document_prompt() -> String {
    "你是一个财务文档命名助手。请阅读下面的文档内容，\
     提取其中的主体名称（基金或公司）、文档类型和日期，\
     并按照 主体-文档类型-日期 的格式返回一个文件名，\
     日期格式为YYYYMMDD。只返回文件名本身，不要任何解释。\
     如果无法从内容中识别出这些信息，只返回：无法识别。\n\n文档内容：\n"
        .to_string()
}

fn default_vision_prompt() -> String {
    "你是一个财务文档命名助手。请识别图片中的文字，\
     提取主体名称（基金或公司）、文档类型和日期，\
     并按照 主体-文档类型-日期 的格式返回一个文件名，\
     日期格式为YYYYMMDD。只返回文件名本身，不要任何解释。\
     如果无法识别出这些信息，只返回：无法识别。"
        .to_string()
}

fn default_include_exts() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff", "pdf", "docx", "txt", "md", "csv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl AppConfig {
    /// Load configuration from a JSON file, or defaults if it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| EntitleError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration (pretty-printed) to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!("wrote config to {}", path.display());
        Ok(())
    }

    /// Generate a starter config with the credential placeholder filled in.
    pub fn generate_template() -> Self {
        let mut config = Self::default();
        config.remote.api_key = Some(API_KEY_PLACEHOLDER.to_string());
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.max_attempts == 0 {
            return Err(EntitleError::Config(
                "remote.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ocr.min_confidence) {
            return Err(EntitleError::Config(
                "ocr.min_confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.rules.max_stem_length == 0 {
            return Err(EntitleError::Config(
                "rules.max_stem_length must be at least 1".to_string(),
            ));
        }
        if self.filters.include_exts.is_empty() {
            return Err(EntitleError::Config(
                "filters.include_exts must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
