//! Snapshot session: the context threaded through request/response events

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, info};

use crate::config::{Config, Mode, RequestLogLevel};
use crate::error::MissingSnapshot;
use crate::exchange::{Request, Response};
use crate::fingerprint::{
    DefaultFingerprintGenerator, FingerprintGenerator, IgnoreNothing, IgnorePredicate,
};
use crate::policy::{self, RequestAction};
use crate::recording::{UsageReport, UsageTracker, WriteDedup};
use crate::replay;
use crate::storage::{validate_scope, SnapshotFileIdentity, SnapshotRecord, SnapshotStore, StoreStats};
use crate::{Result, SnapError};

/// Per-request state carried from the request event to the response event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Snapshot identity, when the mode needs one
    pub identity: Option<SnapshotFileIdentity>,
    /// Request matched the ignore predicate
    pub ignored: bool,
    /// Response was served from a snapshot
    pub replayed: bool,
}

/// Result of the request event
#[derive(Debug, Clone)]
pub struct RequestDecision {
    /// Context to hand back on the response event
    pub context: RequestContext,
    /// Response to inject; `None` means the request goes live
    pub response: Option<Response>,
}

/// Record/replay session owning all per-process snapshot state
pub struct SnapshotSession {
    config: Config,
    store: SnapshotStore,
    dedup: WriteDedup<Arc<SnapshotRecord>>,
    usage: UsageTracker,
    read_paths: DashSet<PathBuf>,
    scope: Option<String>,
    generator: Arc<dyn FingerprintGenerator>,
    ignore: Arc<dyn IgnorePredicate>,
}

impl SnapshotSession {
    /// Create a session from configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        info!(
            "Snapshot session in {} mode at {}",
            config.mode.as_str(),
            config.snapshot_dir.display()
        );

        Self {
            store: SnapshotStore::new(config.log_store_access),
            dedup: WriteDedup::new(),
            usage: UsageTracker::new(config.snapshot_dir.clone()),
            read_paths: DashSet::new(),
            scope: None,
            generator: Arc::new(DefaultFingerprintGenerator::default()),
            ignore: Arc::new(IgnoreNothing),
            config,
        }
    }

    /// Operating mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Select the per-test sub-directory, or the root with `None`
    ///
    /// # Errors
    ///
    /// Returns error if the scope name is invalid
    pub fn set_scope(&mut self, scope: Option<&str>) -> Result<()> {
        if let Some(scope) = scope {
            validate_scope(scope)?;
        }
        self.scope = scope.map(str::to_owned);
        Ok(())
    }

    /// Active scope
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Install a custom fingerprint generator
    pub fn set_fingerprint_generator(&mut self, generator: impl FingerprintGenerator + 'static) {
        self.generator = Arc::new(generator);
    }

    /// Restore the default fingerprint generator
    pub fn reset_fingerprint_generator(&mut self) {
        self.generator = Arc::new(DefaultFingerprintGenerator::default());
    }

    /// Install a custom ignore predicate
    pub fn set_ignore_predicate(&mut self, predicate: impl IgnorePredicate + 'static) {
        self.ignore = Arc::new(predicate);
    }

    /// Restore the default ignore predicate, which ignores nothing
    pub fn reset_ignore_predicate(&mut self) {
        self.ignore = Arc::new(IgnoreNothing);
    }

    /// Snapshot identity of a request under the active scope
    #[must_use]
    pub fn identify(&self, request: &Request) -> SnapshotFileIdentity {
        let fingerprint = self.generator.generate(request);
        SnapshotFileIdentity::derive(
            &self.config.snapshot_dir,
            self.scope.as_deref(),
            &fingerprint,
        )
    }

    /// Handle the request event
    ///
    /// # Errors
    ///
    /// Returns [`SnapError::MissingSnapshot`] on a read-mode miss,
    /// [`SnapError::IgnoredRequest`] for an ignored request in read mode, and
    /// store or synthesis errors otherwise
    pub async fn on_request(&self, request: &Request) -> Result<RequestDecision> {
        self.log_request(request);

        let mode = self.config.mode;
        let ignored = self.ignore.is_ignored(request);
        let action = policy::on_request(mode, ignored);

        if action == RequestAction::Reject {
            return Err(SnapError::IgnoredRequest {
                method: request.method.clone(),
                url: request.url.clone(),
            });
        }

        let identity = (action.needs_identity() || policy::needs_identity_for_write(mode, ignored))
            .then(|| self.identify(request));
        let mut context = RequestContext {
            identity,
            ignored,
            replayed: false,
        };

        let Some(identity) = context.identity.clone().filter(|_| action.needs_identity()) else {
            debug!("Passing through {} {}", request.method, request.url);
            return Ok(RequestDecision {
                context,
                response: None,
            });
        };

        match self.store.read(&identity).await? {
            Some(record) => {
                self.usage.record(&identity.relative_file_name);
                self.read_paths.insert(identity.absolute_path.clone());
                let response = replay::synthesize(&record)?;
                debug!(
                    "Replayed {} {} from {}",
                    request.method, request.url, identity.relative_file_name
                );
                context.replayed = true;
                Ok(RequestDecision {
                    context,
                    response: Some(response),
                })
            }
            None if action == RequestAction::ReplayIfPresent => {
                self.log_fallback(request, &identity);
                Ok(RequestDecision {
                    context,
                    response: None,
                })
            }
            None => Err(self.missing_snapshot(request, &identity).await),
        }
    }

    /// Handle the response event
    ///
    /// Returns the record backing the identity when the mode writes it.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be written
    pub async fn on_response(
        &self,
        context: &RequestContext,
        request: &Request,
        response: &Response,
    ) -> Result<Option<Arc<SnapshotRecord>>> {
        let identity = match &context.identity {
            Some(identity) => identity.clone(),
            None if policy::needs_identity_for_write(self.config.mode, context.ignored) => {
                self.identify(request)
            }
            None => return Ok(None),
        };

        let already_read = context.replayed || self.read_paths.contains(&identity.absolute_path);
        if !policy::should_write(self.config.mode, context.ignored, already_read) {
            return Ok(None);
        }

        let (record, wrote) = self
            .dedup
            .write_once(&identity.absolute_path, || async {
                let record = SnapshotRecord::capture(identity.suffix_key.clone(), request, response);
                self.store.write(&identity, &record).await?;
                Ok::<_, SnapError>(Arc::new(record))
            })
            .await?;

        if wrote {
            debug!(
                "Captured {} ({} snapshot(s) written this run)",
                identity.relative_file_name,
                self.dedup.performed_count()
            );
        } else {
            debug!("Snapshot {} already written this run", identity.relative_file_name);
        }
        Ok(Some(record))
    }

    /// Finish the run: write the unused-snapshot report in read mode
    ///
    /// Only the first call does any work.
    ///
    /// # Errors
    ///
    /// Returns error if the report cannot be written or removed
    pub async fn finalize(&self) -> Result<Option<UsageReport>> {
        if self.config.mode != Mode::Read {
            return Ok(None);
        }
        self.usage.finalize().await
    }

    /// Store statistics
    #[must_use]
    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Snapshot writes performed by this session, after deduplication
    #[must_use]
    pub fn snapshots_written(&self) -> usize {
        self.dedup.performed_count()
    }

    /// Snapshot files consulted so far, relative to the root
    #[must_use]
    pub fn consulted(&self) -> Vec<String> {
        self.usage.consulted()
    }

    async fn missing_snapshot(&self, request: &Request, identity: &SnapshotFileIdentity) -> SnapError {
        let suggestion = replay::find_closest(identity)
            .await
            .map(|found| found.describe(identity.file_name()));

        SnapError::MissingSnapshot(Box::new(MissingSnapshot {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body_text(),
            expected_file: identity.relative_file_name.clone(),
            expected_suffix_key: identity.suffix_key.clone(),
            suggestion,
        }))
    }

    fn log_fallback(&self, request: &Request, identity: &SnapshotFileIdentity) {
        if self.config.log_store_access {
            info!(
                "No snapshot {} for {} {}, capturing live",
                identity.relative_file_name, request.method, request.url
            );
        } else {
            debug!(
                "No snapshot {} for {} {}, capturing live",
                identity.relative_file_name, request.method, request.url
            );
        }
    }

    fn log_request(&self, request: &Request) {
        match self.config.log_requests {
            Some(RequestLogLevel::Summary) => info!("{} {}", request.method, request.url),
            Some(RequestLogLevel::Detailed) => info!(
                "{} {} headers={:?} body={}",
                request.method,
                request.url,
                request.headers,
                request.body_text()
            ),
            None => {}
        }
    }
}
