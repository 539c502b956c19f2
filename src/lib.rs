//! Snapreplay - HTTP record/replay snapshots for deterministic tests
//!
//! Outbound requests are fingerprinted into stable snapshot files. Depending
//! on the [`Mode`], a [`SnapshotSession`] replays responses from those files,
//! captures live responses into them, or stays out of the way.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod digest;
pub mod error;
pub mod exchange;
pub mod fingerprint;
pub mod policy;
pub mod recording;
pub mod replay;
pub mod session;
pub mod storage;

pub use config::{Config, Mode, RequestLogLevel};
pub use error::{MissingSnapshot, Result, SnapError};
pub use exchange::{Request, Response};
pub use fingerprint::{DefaultFingerprintGenerator, Fingerprint, FingerprintGenerator, IgnorePredicate};
pub use session::{RequestContext, RequestDecision, SnapshotSession};
