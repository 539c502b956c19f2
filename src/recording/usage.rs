//! Tracking of consulted snapshots and the unused-snapshot report

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashSet;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::Result;

/// Name of the report file, at the snapshot root
pub const REPORT_FILE: &str = "unused-snapshots.txt";

/// Outcome of the end-of-run usage check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// Snapshot files never consulted, relative to the root, sorted
    pub unused: Vec<String>,
    /// Location of the report file
    pub report_path: PathBuf,
}

impl UsageReport {
    /// Whether every snapshot was consulted
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unused.is_empty()
    }
}

/// Records which snapshot files were read during this run
pub struct UsageTracker {
    root: PathBuf,
    consulted: DashSet<String>,
    finalized: AtomicBool,
}

impl UsageTracker {
    /// Create a tracker for the snapshot root
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            consulted: DashSet::new(),
            finalized: AtomicBool::new(false),
        }
    }

    /// Mark a snapshot, relative to the root, as consulted
    pub fn record(&self, relative_file_name: &str) {
        self.consulted.insert(relative_file_name.to_string());
    }

    /// Consulted snapshots, sorted
    #[must_use]
    pub fn consulted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.consulted.iter().map(|name| name.clone()).collect();
        names.sort();
        names
    }

    /// Write or remove the unused-snapshot report
    ///
    /// Runs at most once; later calls return `Ok(None)`. When every file was
    /// consulted any stale report is deleted instead of written.
    ///
    /// # Errors
    ///
    /// Returns error if the root cannot be listed or the report cannot be
    /// written or removed
    pub async fn finalize(&self) -> Result<Option<UsageReport>> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            debug!("Usage report already finalized");
            return Ok(None);
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || list_files(&root))
            .await
            .map_err(std::io::Error::other)??;

        let unused: Vec<String> = files
            .into_iter()
            .filter(|name| name != REPORT_FILE && !self.consulted.contains(name))
            .collect();

        let report_path = self.root.join(REPORT_FILE);
        if unused.is_empty() {
            match tokio::fs::remove_file(&report_path).await {
                Ok(()) => debug!("Removed stale {}", report_path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            let mut content = unused.join("\n");
            content.push('\n');
            tokio::fs::write(&report_path, content).await?;
            info!(
                "{} unused snapshot(s) listed in {}",
                unused.len(),
                report_path.display()
            );
        }

        Ok(Some(UsageReport {
            unused,
            report_path,
        }))
    }
}

/// Every file under `root`, relative and `/`-separated, sorted
fn list_files(root: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    if !root.exists() {
        return Ok(files);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(name);
    }

    Ok(files)
}
