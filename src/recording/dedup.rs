//! At-most-once writes per snapshot path

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::Result;

/// Write dedup cache keyed by absolute snapshot path
///
/// The first caller for a path runs the write; concurrent and later callers
/// for the same path wait for it and receive the same value. A failed write
/// leaves the slot empty so the error surfaces to its caller only.
pub struct WriteDedup<T> {
    writes: DashMap<PathBuf, Arc<OnceCell<T>>>,
    performed: AtomicUsize,
}

impl<T: Clone> WriteDedup<T> {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            writes: DashMap::new(),
            performed: AtomicUsize::new(0),
        }
    }

    /// Run `write` unless a write for `path` already ran or is in flight
    ///
    /// Returns the stored value and whether this call performed the write.
    ///
    /// # Errors
    ///
    /// Returns the error of `write` when this call performed it and it failed
    pub async fn write_once<F, Fut>(&self, path: &Path, write: F) -> Result<(T, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // Clone the cell out so no map guard is held across the await
        let cell = Arc::clone(
            self.writes
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let mut performed = false;
        let value = cell
            .get_or_try_init(|| {
                performed = true;
                write()
            })
            .await?
            .clone();

        if performed {
            self.performed.fetch_add(1, Ordering::Relaxed);
        }
        Ok((value, performed))
    }

    /// Whether a completed write exists for `path`
    #[cfg(test)]
    fn contains(&self, path: &Path) -> bool {
        self.writes
            .get(path)
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of writes actually performed
    #[must_use]
    pub fn performed_count(&self) -> usize {
        self.performed.load(Ordering::Relaxed)
    }
}

impl<T: Clone> Default for WriteDedup<T> {
    fn default() -> Self {
        Self::new()
    }
}
