// SPDX-License-Identifier: MIT

//! Analyzer chain
//!
//! Each analyzer inspects a document and either accepts with a name
//! candidate or declines with a reason. The chain runs them in order of
//! decreasing capability and takes the first acceptance; declines carry
//! diagnostics forward instead of aborting the file.

pub mod heuristic;
pub mod optical;
pub mod remote;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::extract::{ExtractedContent, SourceDocument};
use crate::ocr::OcrEngine;
use crate::remote::{RemoteClient, DECLINE_SENTINEL};

pub use heuristic::HeuristicFieldAnalyzer;
pub use optical::LocalOpticalAnalyzer;
pub use remote::RemoteSemanticAnalyzer;

/// Which capability tier produced (or declined) a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Remote,
    Ocr,
    Heuristic,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Remote => write!(f, "remote"),
            Tier::Ocr => write!(f, "ocr"),
            Tier::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Outcome of one analyzer on one document.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// A raw name candidate, not yet sanitized.
    Accepted(String),
    /// This tier cannot name the document. `suggestion` is operator-facing
    /// remediation when one exists.
    Declined {
        reason: String,
        suggestion: Option<String>,
    },
}

impl Verdict {
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
            suggestion: None,
        }
    }

    pub fn declined_with(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Accept a model/OCR answer only when it is non-empty and not the literal
/// decline sentinel.
pub fn acceptable(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() || trimmed == DECLINE_SENTINEL {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Chain outcome for one document.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Raw candidate from the first accepting tier, `None` when every tier
    /// declined.
    pub candidate: Option<String>,
    /// Tier that accepted, or the last tier consulted.
    pub tier: Tier,
    /// Reason from the last declining tier, for reporting.
    pub diagnostic: Option<String>,
    pub suggestion: Option<String>,
}

/// One inference tier.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn tier(&self) -> Tier;

    async fn analyze(
        &self,
        document: &SourceDocument,
        content: Option<&ExtractedContent>,
    ) -> Verdict;
}

/// Ordered analyzer chain, first acceptance wins.
pub struct AnalyzerChain {
    analyzers: Vec<Box<dyn DocumentAnalyzer>>,
}

impl AnalyzerChain {
    /// Standard three-tier chain: remote reasoning, then local OCR, then
    /// filename/content heuristics.
    pub fn new(
        config: &AppConfig,
        remote: Arc<RemoteClient>,
        ocr_engine: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        let analyzers: Vec<Box<dyn DocumentAnalyzer>> = vec![
            Box::new(RemoteSemanticAnalyzer::new(
                remote.clone(),
                config.prompts.clone(),
            )),
            Box::new(LocalOpticalAnalyzer::new(
                ocr_engine,
                remote,
                &config.ocr,
                config.prompts.clone(),
            )),
            Box::new(HeuristicFieldAnalyzer::new()),
        ];
        Self { analyzers }
    }

    /// Build a chain from explicit analyzers.
    pub fn with_analyzers(analyzers: Vec<Box<dyn DocumentAnalyzer>>) -> Self {
        Self { analyzers }
    }

    /// Run the chain until an analyzer accepts.
    pub async fn infer(
        &self,
        document: &SourceDocument,
        content: Option<&ExtractedContent>,
    ) -> InferenceResult {
        let mut last_tier = Tier::Heuristic;
        let mut diagnostic = None;
        let mut suggestion = None;

        for analyzer in &self.analyzers {
            last_tier = analyzer.tier();
            match analyzer.analyze(document, content).await {
                Verdict::Accepted(candidate) => {
                    info!(
                        "{} accepted '{}' for {}",
                        analyzer.name(),
                        candidate,
                        document.path.display()
                    );
                    return InferenceResult {
                        candidate: Some(candidate),
                        tier: analyzer.tier(),
                        diagnostic,
                        suggestion,
                    };
                }
                Verdict::Declined {
                    reason,
                    suggestion: hint,
                } => {
                    debug!(
                        "{} declined {}: {}",
                        analyzer.name(),
                        document.path.display(),
                        reason
                    );
                    diagnostic = Some(reason);
                    if hint.is_some() {
                        suggestion = hint;
                    }
                }
            }
        }

        InferenceResult {
            candidate: None,
            tier: last_tier,
            diagnostic,
            suggestion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedAnalyzer {
        verdict_name: Option<&'static str>,
        tier: Tier,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl DocumentAnalyzer for FixedAnalyzer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn tier(&self) -> Tier {
            self.tier
        }

        async fn analyze(
            &self,
            _document: &SourceDocument,
            _content: Option<&ExtractedContent>,
        ) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.verdict_name {
                Some(name) => Verdict::Accepted(name.to_string()),
                None => Verdict::declined_with("nothing recognized", "检查文件内容"),
            }
        }
    }

    fn doc() -> SourceDocument {
        SourceDocument::new(PathBuf::from("/in/scan.jpg"))
    }

    #[test]
    fn sentinel_and_empty_are_not_acceptable() {
        assert_eq!(acceptable("无法识别"), None);
        assert_eq!(acceptable("  无法识别  "), None);
        assert_eq!(acceptable(""), None);
        assert_eq!(acceptable("   "), None);
        assert_eq!(
            acceptable(" 基金-合同-20250101 ").as_deref(),
            Some("基金-合同-20250101")
        );
    }

    #[tokio::test]
    async fn first_acceptance_wins_and_stops_the_chain() {
        let first_calls = Arc::new(AtomicU32::new(0));
        let second_calls = Arc::new(AtomicU32::new(0));
        let third_calls = Arc::new(AtomicU32::new(0));

        let chain = AnalyzerChain::with_analyzers(vec![
            Box::new(FixedAnalyzer {
                verdict_name: None,
                tier: Tier::Remote,
                calls: first_calls.clone(),
            }),
            Box::new(FixedAnalyzer {
                verdict_name: Some("基金-确认函-20250822"),
                tier: Tier::Ocr,
                calls: second_calls.clone(),
            }),
            Box::new(FixedAnalyzer {
                verdict_name: Some("should-not-run"),
                tier: Tier::Heuristic,
                calls: third_calls.clone(),
            }),
        ]);

        let result = chain.infer(&doc(), None).await;
        assert_eq!(result.candidate.as_deref(), Some("基金-确认函-20250822"));
        assert_eq!(result.tier, Tier::Ocr);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_declines_yield_no_candidate_with_diagnostics() {
        let calls = Arc::new(AtomicU32::new(0));
        let chain = AnalyzerChain::with_analyzers(vec![
            Box::new(FixedAnalyzer {
                verdict_name: None,
                tier: Tier::Remote,
                calls: calls.clone(),
            }),
            Box::new(FixedAnalyzer {
                verdict_name: None,
                tier: Tier::Heuristic,
                calls: calls.clone(),
            }),
        ]);

        let result = chain.infer(&doc(), None).await;
        assert!(result.candidate.is_none());
        assert_eq!(result.tier, Tier::Heuristic);
        assert_eq!(result.diagnostic.as_deref(), Some("nothing recognized"));
        assert_eq!(result.suggestion.as_deref(), Some("检查文件内容"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
