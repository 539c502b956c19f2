//! Snapreplay CLI

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use snapreplay::digest;
use snapreplay::recording::REPORT_FILE;
use snapreplay::storage::{self, file_name_for, split_file_name, SNAPSHOT_EXTENSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];
    let Some(dir) = args.get(2).map(PathBuf::from) else {
        eprintln!("Usage: snapreplay {command} <snapshot-dir>");
        process::exit(1);
    };

    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }

    match command.as_str() {
        "stats" => show_stats(&dir),
        "check" => {
            let mismatches = check_names(&dir).await?;
            if mismatches > 0 {
                eprintln!("{mismatches} snapshot(s) do not match their suffix key");
                process::exit(2);
            }
            Ok(())
        }
        "unused" => show_unused(&dir).await,
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'snapreplay' for usage information.");
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Snapreplay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: snapreplay <command> <snapshot-dir>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  stats     Count snapshots per name prefix");
    eprintln!("  check     Verify file names against stored suffix keys");
    eprintln!("  unused    Print the unused-snapshot report of the last read run");
}

/// Snapshot files under `dir`, relative to it
fn snapshot_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let is_snapshot = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == SNAPSHOT_EXTENSION);
        if is_snapshot {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn show_stats(dir: &Path) -> anyhow::Result<()> {
    let mut per_prefix: BTreeMap<String, usize> = BTreeMap::new();
    let mut unrecognized = 0usize;
    let mut total_bytes = 0u64;

    let files = snapshot_files(dir)?;
    for path in &files {
        total_bytes += std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match split_file_name(name) {
            Some((prefix, _)) => *per_prefix.entry(prefix.to_string()).or_default() += 1,
            None => unrecognized += 1,
        }
    }

    println!("Snapshot directory: {}", dir.display());
    println!("Snapshots: {} ({} bytes)", files.len(), total_bytes);
    println!();
    for (prefix, count) in &per_prefix {
        let label = if prefix.is_empty() { "(no prefix)" } else { prefix };
        println!("  {count:>6}  {label}");
    }
    if unrecognized > 0 {
        println!("  {unrecognized:>6}  (not named by snapreplay)");
    }

    Ok(())
}

async fn check_names(dir: &Path) -> anyhow::Result<usize> {
    let mut mismatches = 0usize;

    for path in snapshot_files(dir)? {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        let record = match storage::load(&path).await {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                println!("UNREADABLE  {}: {e}", path.display());
                mismatches += 1;
                continue;
            }
        };

        let expected_digest = digest::encode(&record.suffix_key);
        match split_file_name(name) {
            Some((_, found)) if found == expected_digest => {}
            Some((prefix, _)) => {
                let expected = file_name_for(prefix, &record.suffix_key);
                println!("MISMATCH    {} (expected {expected})", path.display());
                mismatches += 1;
            }
            // Renamed by hand: the prefix can no longer be recovered
            None => {
                println!(
                    "MISMATCH    {} (expected <prefix>-{expected_digest}.json)",
                    path.display()
                );
                mismatches += 1;
            }
        }
    }

    Ok(mismatches)
}

async fn show_unused(dir: &Path) -> anyhow::Result<()> {
    let report = dir.join(REPORT_FILE);
    match tokio::fs::read_to_string(&report).await {
        Ok(content) => {
            print!("{content}");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No unused snapshots reported");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", report.display())),
    }
}
