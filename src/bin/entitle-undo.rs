// SPDX-License-Identifier: MIT

//! Entitle Undo Utility
//!
//! Standalone reversal of operations recorded in the rename log. Useful when
//! the main binary or its configuration is unavailable.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

use entitle::oplog::{ActionKind, OperationLog};

#[derive(Parser, Debug)]
#[command(name = "entitle-undo")]
#[command(version = "0.2.0")]
#[command(about = "Undo Entitle renames and copies")]
struct Args {
    /// Path to the operation log
    #[arg(short, long, default_value = "entitle_log.jsonl")]
    log_file: PathBuf,

    /// Number of operations to undo (default: 1, use 0 for all)
    #[arg(short, long, default_value = "1")]
    count: usize,

    /// Dry run - show what would be undone without doing it
    #[arg(long)]
    dry_run: bool,

    /// List all entries in the log
    #[arg(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.log_file.exists() {
        eprintln!("Operation log not found: {:?}", args.log_file);
        eprintln!("Nothing to undo.");
        return Ok(());
    }

    let log = OperationLog::new(args.log_file.clone());
    let mut entries = log.read_all()?;

    if entries.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }

    if args.list {
        println!("Operation log ({} entries):", entries.len());
        println!("{:-<80}", "");
        for (i, entry) in entries.iter().rev().enumerate() {
            println!(
                "{:3}. [{}] {:?} {} -> {}",
                i + 1,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.action,
                entry.old_path.display(),
                entry.new_path.display()
            );
        }
        return Ok(());
    }

    // Most recent first.
    entries.reverse();

    let count = if args.count == 0 {
        entries.len()
    } else {
        args.count.min(entries.len())
    };

    println!(
        "{}Undoing {} operation(s)...",
        if args.dry_run { "[DRY RUN] " } else { "" },
        count
    );

    let mut undone = 0;
    let mut failed = 0;

    for entry in entries.iter().take(count) {
        if !entry.new_path.exists() {
            eprintln!(
                "  Skip: {} (file not found, may have been moved/deleted)",
                entry.new_path.display()
            );
            failed += 1;
            continue;
        }

        match entry.action {
            ActionKind::Copied => {
                if args.dry_run {
                    println!("  Would delete copy: {}", entry.new_path.display());
                } else {
                    match fs::remove_file(&entry.new_path) {
                        Ok(()) => {
                            println!("  Deleted copy: {}", entry.new_path.display());
                            undone += 1;
                        }
                        Err(e) => {
                            eprintln!("  Failed: {} ({})", entry.new_path.display(), e);
                            failed += 1;
                        }
                    }
                }
            }
            ActionKind::Renamed => {
                if entry.old_path.exists() {
                    eprintln!(
                        "  Skip: {} (original path already exists)",
                        entry.old_path.display()
                    );
                    failed += 1;
                    continue;
                }

                if args.dry_run {
                    println!(
                        "  Would rename: {} -> {}",
                        entry.new_path.display(),
                        entry.old_path.display()
                    );
                } else {
                    match fs::rename(&entry.new_path, &entry.old_path) {
                        Ok(()) => {
                            println!(
                                "  Undone: {} -> {}",
                                entry.new_path.display(),
                                entry.old_path.display()
                            );
                            undone += 1;
                        }
                        Err(e) => {
                            eprintln!("  Failed: {} ({})", entry.new_path.display(), e);
                            failed += 1;
                        }
                    }
                }
            }
        }
    }

    println!();
    if args.dry_run {
        println!(
            "Dry run complete. {} operation(s) would be undone.",
            count - failed
        );
    } else {
        println!("Done. {} undone, {} failed/skipped.", undone, failed);
        if undone > 0 {
            println!("Note: log file not modified. Run again to undo more.");
        }
    }

    Ok(())
}
