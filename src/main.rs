// SPDX-License-Identifier: MIT

//! Entitle: content-aware batch file renamer
//!
//! Infers "<entity>-<document-type>-<date>" names for scanned financial
//! documents and applies them across a batch, with full undo.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use entitle::analyzers::AnalyzerChain;
use entitle::config::AppConfig;
use entitle::engine::{BatchRenameEngine, ProgressEvent, RenameMode};
use entitle::ocr::OcrEngine;
use entitle::oplog::OperationLog;
use entitle::remote::RemoteClient;
use entitle::{EntitleError, Result};

/// Entitle CLI - content-aware batch renamer for scanned documents
#[derive(Parser, Debug)]
#[command(name = "entitle")]
#[command(version = "0.2.0")]
#[command(about = "Content-aware batch file renamer with undo", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rename files or directories of files based on their content
    Rename {
        /// Files or directories to process
        paths: Vec<PathBuf>,

        /// Copy renamed files into this directory instead of renaming in place
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Restrict processing to these extensions (overrides config)
        #[arg(short, long)]
        types: Vec<String>,

        /// Show inferred names without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Operation log file (overrides config)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Reverse the operations recorded in the log, newest first
    Rollback {
        /// Operation log file (overrides config)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Show what would be reversed without doing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Operation log inspection
    Log {
        #[command(subcommand)]
        action: LogCommands,
    },

    /// Show analyzer tier availability
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum LogCommands {
    /// List recent log entries
    List {
        /// Number of entries to show (0 = all)
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Export the log as pretty-printed JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Delete the log file
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate a starter configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Rename {
            paths,
            dest,
            types,
            dry_run,
            log,
        } => run_rename(config, paths, dest, types, dry_run, log).await,
        Commands::Rollback { log, dry_run } => run_rollback(config, log, dry_run),
        Commands::Log { action } => run_log_command(config, action),
        Commands::Status => run_status(config),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

fn build_ocr_engine(config: &AppConfig) -> Option<Arc<dyn OcrEngine>> {
    if !config.ocr.enabled {
        return None;
    }

    #[cfg(feature = "ocr")]
    {
        Some(Arc::new(entitle::ocr::TesseractOcr::new(
            &config.ocr.languages,
            None,
        )))
    }

    #[cfg(not(feature = "ocr"))]
    {
        None
    }
}

async fn run_rename(
    mut config: AppConfig,
    paths: Vec<PathBuf>,
    dest: Option<PathBuf>,
    types: Vec<String>,
    dry_run: bool,
    log: Option<PathBuf>,
) -> Result<()> {
    if paths.is_empty() {
        return Err(EntitleError::Config(
            "at least one file or directory is required".to_string(),
        ));
    }

    if !types.is_empty() {
        config.filters.include_exts = types.iter().map(|t| t.to_lowercase()).collect();
    }
    if let Some(log) = log {
        config.log_path = log.to_string_lossy().into_owned();
    }

    let mode = match dest {
        Some(destination) => {
            std::fs::create_dir_all(&destination)?;
            RenameMode::Copy { destination }
        }
        None => RenameMode::MoveInPlace,
    };

    if dry_run {
        warn!("DRY RUN - no file will be touched");
    }

    let remote = Arc::new(RemoteClient::new(&config.remote));
    if !remote.is_available() {
        warn!("no remote credential configured, relying on OCR and heuristics");
    }
    let ocr_engine = build_ocr_engine(&config);
    if ocr_engine.is_none() {
        info!("no OCR engine available, image content goes to the vision model only");
    }

    let chain = AnalyzerChain::new(&config, remote, ocr_engine);
    let engine = BatchRenameEngine::new(&config, chain).with_progress(Box::new(
        |event: &ProgressEvent| match &event.new_name {
            Some(new_name) => println!(
                "[{}/{}] {} -> {}",
                event.index, event.total, event.old_name, new_name
            ),
            None => println!(
                "[{}/{}] {} -> (failed)",
                event.index, event.total, event.old_name
            ),
        },
    ));

    let summary = engine.run(&paths, &mode, dry_run).await?;

    println!();
    println!(
        "{} files: {} renamed, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    for outcome in &summary.outcomes {
        if let Some(error) = &outcome.error {
            println!("  failed  {}: {}", outcome.path.display(), error);
        } else if let Some(diagnostic) = &outcome.diagnostic {
            println!(
                "  note    {}: named from filename only ({})",
                outcome.path.display(),
                diagnostic
            );
            if let Some(suggestion) = &outcome.suggestion {
                println!("          {}", suggestion);
            }
        }
    }
    if !dry_run && !summary.entries.is_empty() {
        println!("operation log: {}", config.log_path);
    }

    Ok(())
}

fn run_rollback(config: AppConfig, log: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let log_path = log.unwrap_or_else(|| PathBuf::from(&config.log_path));
    let log = OperationLog::new(log_path.clone());
    let entries = log.read_all()?;

    if entries.is_empty() {
        println!("nothing to roll back in {}", log_path.display());
        return Ok(());
    }

    if dry_run {
        println!("would reverse {} operations:", entries.len());
        for entry in entries.iter().rev() {
            println!(
                "  {:?} {} -> {}",
                entry.action,
                entry.new_path.display(),
                entry.old_path.display()
            );
        }
        return Ok(());
    }

    let summary = BatchRenameEngine::rollback(&entries);
    println!(
        "rolled back {} operations, {} failed",
        summary.reversed, summary.failed
    );

    if summary.failed == 0 {
        log.clear()?;
        info!("cleared {}", log_path.display());
    } else {
        warn!("log kept at {} because some entries failed", log_path.display());
    }
    Ok(())
}

fn run_log_command(config: AppConfig, action: LogCommands) -> Result<()> {
    let log = OperationLog::new(config.log_path.clone());

    match action {
        LogCommands::List { count } => {
            let entries = log.read_all()?;
            if entries.is_empty() {
                println!("operation log is empty");
                return Ok(());
            }
            let shown = if count == 0 {
                entries.as_slice()
            } else {
                &entries[entries.len().saturating_sub(count)..]
            };
            for entry in shown {
                println!(
                    "{} {:?} {} -> {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.old_path.display(),
                    entry.new_path.display()
                );
            }
        }
        LogCommands::Export { output } => {
            let entries = log.read_all()?;
            let json = serde_json::to_string_pretty(&entries)?;
            std::fs::write(&output, json)?;
            println!("exported {} entries to {}", entries.len(), output.display());
        }
        LogCommands::Clear => {
            log.clear()?;
            println!("operation log cleared");
        }
    }
    Ok(())
}

fn run_status(config: AppConfig) -> Result<()> {
    let remote = RemoteClient::new(&config.remote);
    println!(
        "remote tier: {} ({})",
        if remote.is_available() {
            "available"
        } else {
            "unavailable"
        },
        config.remote.model
    );

    let ocr_compiled = cfg!(feature = "ocr");
    println!(
        "ocr tier: {}",
        match (ocr_compiled, config.ocr.enabled) {
            (true, true) => "available".to_string(),
            (true, false) => "disabled by config".to_string(),
            (false, _) => "not compiled in".to_string(),
        }
    );
    println!("heuristic tier: always available");
    println!("operation log: {}", config.log_path);
    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, path: &PathBuf) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(EntitleError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    output.display()
                )));
            }
            AppConfig::generate_template().save(&output)?;
            println!("wrote {}", output.display());
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("{} is valid", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_rename_command() {
        let cli = Cli::try_parse_from([
            "entitle", "rename", "/tmp/in", "--dest", "/tmp/out", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Rename {
                paths,
                dest,
                dry_run,
                ..
            } => {
                assert_eq!(paths, vec![PathBuf::from("/tmp/in")]);
                assert_eq!(dest, Some(PathBuf::from("/tmp/out")));
                assert!(dry_run);
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_cli_rename_type_filter() {
        let cli = Cli::try_parse_from([
            "entitle", "rename", "/tmp/in", "--types", "pdf", "--types", "jpg",
        ])
        .unwrap();

        match cli.command {
            Commands::Rename { types, dest, .. } => {
                assert_eq!(types, vec!["pdf".to_string(), "jpg".to_string()]);
                assert!(dest.is_none());
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_cli_rollback_command() {
        let cli =
            Cli::try_parse_from(["entitle", "rollback", "--log", "/tmp/ops.jsonl"]).unwrap();

        match cli.command {
            Commands::Rollback { log, dry_run } => {
                assert_eq!(log, Some(PathBuf::from("/tmp/ops.jsonl")));
                assert!(!dry_run);
            }
            _ => panic!("Expected Rollback command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["entitle", "--verbose", "status"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["entitle"]).is_err());
    }
}
