//! File-backed snapshot store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, info};

use super::format::SnapshotRecord;
use super::identity::SnapshotFileIdentity;
use crate::{Result, SnapError};

/// Snapshot store backed by one JSON file per fingerprint
pub struct SnapshotStore {
    /// Records read so far, keyed by absolute path
    read_cache: DashMap<PathBuf, Arc<SnapshotRecord>>,
    /// Directories already created during this process
    created_dirs: DashSet<PathBuf>,
    /// Files read from disk
    disk_reads: AtomicUsize,
    /// Reads served from the read cache
    cache_hits: AtomicUsize,
    /// Files written to disk
    disk_writes: AtomicUsize,
    /// Directory creations performed
    dir_creations: AtomicUsize,
    /// Promote read/write logging to info level
    log_access: bool,
}

impl SnapshotStore {
    /// Create a new store
    #[must_use]
    pub fn new(log_access: bool) -> Self {
        Self {
            read_cache: DashMap::new(),
            created_dirs: DashSet::new(),
            disk_reads: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            disk_writes: AtomicUsize::new(0),
            dir_creations: AtomicUsize::new(0),
            log_access,
        }
    }

    /// Read the snapshot for an identity
    ///
    /// Returns `Ok(None)` when the file does not exist. The first successful
    /// read of a path is cached for the lifetime of the store.
    ///
    /// # Errors
    ///
    /// Returns error on any I/O failure other than "not found", or if the
    /// file does not parse
    pub async fn read(&self, identity: &SnapshotFileIdentity) -> Result<Option<Arc<SnapshotRecord>>> {
        if let Some(record) = self.read_cache.get(&identity.absolute_path) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(Arc::clone(&record)));
        }

        let Some(record) = load(&identity.absolute_path).await? else {
            self.log(format_args!("Snapshot miss: {}", identity.relative_file_name));
            return Ok(None);
        };

        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        self.log(format_args!("Read snapshot: {}", identity.relative_file_name));

        let record = Arc::new(record);
        let cached = self
            .read_cache
            .entry(identity.absolute_path.clone())
            .or_insert(record);
        Ok(Some(Arc::clone(&cached)))
    }

    /// Write the snapshot for an identity, replacing any existing file
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created, the record cannot be
    /// serialized, or the file cannot be written
    pub async fn write(&self, identity: &SnapshotFileIdentity, record: &SnapshotRecord) -> Result<()> {
        if let Some(dir) = identity.directory() {
            self.ensure_dir(dir).await?;
        }

        let mut content = serde_json::to_string_pretty(record).map_err(SnapError::Serialize)?;
        content.push('\n');

        tokio::fs::write(&identity.absolute_path, content).await?;

        self.disk_writes.fetch_add(1, Ordering::Relaxed);
        self.log(format_args!("Wrote snapshot: {}", identity.relative_file_name));
        Ok(())
    }

    /// Create a directory once per process
    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if self.created_dirs.contains(dir) {
            return Ok(());
        }

        tokio::fs::create_dir_all(dir).await?;
        self.dir_creations.fetch_add(1, Ordering::Relaxed);
        self.created_dirs.insert(dir.to_path_buf());
        Ok(())
    }

    fn log(&self, message: std::fmt::Arguments<'_>) {
        if self.log_access {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }

    /// Get store statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
            dir_creations: self.dir_creations.load(Ordering::Relaxed),
            cached_records: self.read_cache.len(),
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Files read from disk
    pub disk_reads: usize,
    /// Reads served from memory
    pub cache_hits: usize,
    /// Files written
    pub disk_writes: usize,
    /// Directories created
    pub dir_creations: usize,
    /// Records held in the read cache
    pub cached_records: usize,
}

/// Load and parse a snapshot file without touching any cache
///
/// # Errors
///
/// Returns error on any I/O failure other than "not found", or if the file
/// does not parse
pub async fn load(path: &Path) -> Result<Option<SnapshotRecord>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| SnapError::InvalidSnapshot {
            path: path.display().to_string(),
            source,
        })
}
