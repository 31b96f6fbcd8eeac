// SPDX-License-Identifier: MIT

//! Transactional batch rename engine
//!
//! Expands the selection, drives the pipeline per file, resolves target
//! collisions, performs the copy or rename, and appends each applied action
//! to the operation log. Files are processed sequentially; one file's
//! failure never stops the batch. Rollback replays the log in reverse.

use filetime::FileTime;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::analyzers::{AnalyzerChain, Tier};
use crate::config::AppConfig;
use crate::error::Result;
use crate::extract::{SourceDocument, TextExtractor};
use crate::naming::NameSynthesizer;
use crate::oplog::{ActionKind, OperationLog, OperationLogEntry};

/// How renamed files are materialized.
#[derive(Debug, Clone)]
pub enum RenameMode {
    /// Originals stay put; named copies land in `destination`.
    Copy { destination: PathBuf },
    /// Originals are renamed where they are.
    MoveInPlace,
}

/// Per-file progress notification.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub index: usize,
    pub total: usize,
    pub old_name: String,
    pub new_name: Option<String>,
}

pub type ProgressFn = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Terminal state of one file in the batch.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub new_name: Option<String>,
    pub tier: Tier,
    pub error: Option<String>,
    /// Set when the name was synthesized from the filename because every
    /// tier declined.
    pub diagnostic: Option<String>,
    /// Operator-facing hint carried from the last declining tier.
    pub suggestion: Option<String>,
}

/// Aggregate result of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<FileOutcome>,
    /// Applied operations, in order, as written to the log.
    pub entries: Vec<OperationLogEntry>,
}

/// Aggregate result of a rollback.
#[derive(Debug, Default)]
pub struct RollbackSummary {
    pub reversed: usize,
    pub failed: usize,
}

/// Expand files and directories into the flat, filtered, ordered batch.
pub fn collect_files(paths: &[PathBuf], include_exts: &[String]) -> Vec<PathBuf> {
    let eligible = |path: &Path| {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| include_exts.iter().any(|allowed| allowed == &e.to_lowercase()))
            .unwrap_or(false)
    };

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && eligible(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() && eligible(path) {
            files.push(path.clone());
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Return `path` if free, otherwise the first `stem-N.ext` that is. The
/// counter is unbounded so this always terminates with a fresh path.
pub fn make_unique(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let ext = path.extension().and_then(|e| e.to_str());

    for n in 1u64.. {
        let name = match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("unbounded suffix counter")
}

pub struct BatchRenameEngine {
    extractor: TextExtractor,
    chain: AnalyzerChain,
    synthesizer: NameSynthesizer,
    log: OperationLog,
    include_exts: Vec<String>,
    progress: Option<ProgressFn>,
}

impl BatchRenameEngine {
    pub fn new(config: &AppConfig, chain: AnalyzerChain) -> Self {
        Self {
            extractor: TextExtractor::new(),
            chain,
            synthesizer: NameSynthesizer::new(config.rules.clone()),
            log: OperationLog::new(config.log_path.clone()),
            include_exts: config.filters.include_exts.clone(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Process every eligible file under `paths`. With `dry_run` the names
    /// are inferred and reported but nothing on disk changes.
    pub async fn run(
        &self,
        paths: &[PathBuf],
        mode: &RenameMode,
        dry_run: bool,
    ) -> Result<BatchSummary> {
        let files = collect_files(paths, &self.include_exts);
        let mut summary = BatchSummary {
            total: files.len(),
            ..BatchSummary::default()
        };
        info!("batch of {} files, dry_run={}", files.len(), dry_run);

        for (index, path) in files.iter().enumerate() {
            let outcome = self.process_file(path, mode, dry_run, &mut summary.entries).await;

            if let Some(progress) = &self.progress {
                progress(&ProgressEvent {
                    index: index + 1,
                    total: files.len(),
                    old_name: path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("")
                        .to_string(),
                    new_name: outcome.new_name.clone(),
                });
            }

            if outcome.error.is_none() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary.outcomes.push(outcome);
        }

        info!(
            "batch done: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    async fn process_file(
        &self,
        path: &Path,
        mode: &RenameMode,
        dry_run: bool,
        entries: &mut Vec<OperationLogEntry>,
    ) -> FileOutcome {
        let document = SourceDocument::new(path.to_path_buf());
        let content = self.extractor.extract(&document);
        let result = self.chain.infer(&document, content.as_ref()).await;

        // Every tier declining still yields a name, derived from the
        // filename itself; the diagnostic travels with the outcome.
        let (candidate, heuristic_style) = match &result.candidate {
            Some(candidate) => (candidate.clone(), result.tier == Tier::Heuristic),
            None => (document.file_stem(), true),
        };
        let final_name =
            self.synthesizer
                .finalize(&candidate, document.extension().as_deref(), heuristic_style);

        // A synthesized fallback name is still applied; the diagnostic from
        // the last declining tier travels with the outcome for display.
        let diagnostic = if result.candidate.is_none() {
            let diag = result
                .diagnostic
                .clone()
                .unwrap_or_else(|| "no tier produced a candidate".to_string());
            warn!("{}: named from filename only ({})", path.display(), diag);
            Some(diag)
        } else {
            None
        };

        let mut outcome = FileOutcome {
            path: path.to_path_buf(),
            new_name: Some(final_name.clone()),
            tier: result.tier,
            error: None,
            diagnostic,
            suggestion: result.suggestion.clone(),
        };

        let target = match mode {
            RenameMode::Copy { destination } => destination.join(&final_name),
            RenameMode::MoveInPlace => path.with_file_name(&final_name),
        };

        if target == path {
            info!("{} already carries its inferred name", path.display());
            return outcome;
        }

        if dry_run {
            info!("dry run: {} -> {}", path.display(), target.display());
            return outcome;
        }

        let target = make_unique(&target);
        let action = match mode {
            RenameMode::Copy { .. } => ActionKind::Copied,
            RenameMode::MoveInPlace => ActionKind::Renamed,
        };

        if let Err(e) = self.apply(path, &target, action) {
            error!("{}: {}", path.display(), e);
            outcome.error = Some(e.to_string());
            outcome.new_name = None;
            return outcome;
        }

        let entry = OperationLogEntry::new(path.to_path_buf(), target.clone(), action);
        if let Err(e) = self.log.append(&entry) {
            warn!("could not append to operation log: {}", e);
        }
        entries.push(entry);

        outcome.new_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string());
        outcome
    }

    fn apply(&self, source: &Path, target: &Path, action: ActionKind) -> Result<()> {
        match action {
            ActionKind::Copied => {
                std::fs::copy(source, target)?;
                // Keep the original timestamps on the copy.
                let metadata = std::fs::metadata(source)?;
                let mtime = FileTime::from_last_modification_time(&metadata);
                let atime = FileTime::from_last_access_time(&metadata);
                filetime::set_file_times(target, atime, mtime)?;
            }
            ActionKind::Renamed => {
                std::fs::rename(source, target)?;
            }
        }
        Ok(())
    }

    /// Reverse the given operations, newest first. Best-effort per entry.
    pub fn rollback(entries: &[OperationLogEntry]) -> RollbackSummary {
        let mut summary = RollbackSummary::default();

        for entry in entries.iter().rev() {
            let result = match entry.action {
                ActionKind::Copied => {
                    if entry.new_path.exists() {
                        std::fs::remove_file(&entry.new_path)
                    } else {
                        Ok(())
                    }
                }
                ActionKind::Renamed => {
                    if entry.new_path.exists() {
                        std::fs::rename(&entry.new_path, &entry.old_path)
                    } else {
                        Ok(())
                    }
                }
            };

            match result {
                Ok(()) => summary.reversed += 1,
                Err(e) => {
                    error!(
                        "could not reverse {} -> {}: {}",
                        entry.old_path.display(),
                        entry.new_path.display(),
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
