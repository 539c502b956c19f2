//! Read/write policy per operating mode
//!
//! | Mode   | On request                    | On response                  |
//! |--------|-------------------------------|------------------------------|
//! | read   | replay, miss is fatal         | never write                  |
//! | update | pass through                  | always write                 |
//! | append | replay if present, else live  | write unless already read    |
//! | ignore | pass through                  | never write                  |
//!
//! An ignored request is fatal in read mode and passes through live,
//! without writing, in every other mode.

use crate::config::Mode;

/// What to do when a request is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Serve from the snapshot; a missing file is an error
    Replay,
    /// Serve from the snapshot if it exists, otherwise go live
    ReplayIfPresent,
    /// Go live without consulting snapshots
    Passthrough,
    /// Refuse the request: it would reach the network in read mode
    Reject,
}

impl RequestAction {
    /// Whether a file identity is needed to carry out this action
    #[must_use]
    pub fn needs_identity(&self) -> bool {
        matches!(self, RequestAction::Replay | RequestAction::ReplayIfPresent)
    }
}

/// Decide how to handle a request
#[must_use]
pub fn on_request(mode: Mode, ignored: bool) -> RequestAction {
    match (mode, ignored) {
        (Mode::Read, true) => RequestAction::Reject,
        (Mode::Read, false) => RequestAction::Replay,
        (Mode::Append, false) => RequestAction::ReplayIfPresent,
        (Mode::Update | Mode::Append | Mode::Ignore, _) => RequestAction::Passthrough,
    }
}

/// Decide whether a completed exchange is written to its snapshot
#[must_use]
pub fn should_write(mode: Mode, ignored: bool, already_read: bool) -> bool {
    if ignored {
        return false;
    }

    match mode {
        Mode::Update => true,
        Mode::Append => !already_read,
        Mode::Read | Mode::Ignore => false,
    }
}

/// Whether a file identity must be computed for the response event
#[must_use]
pub fn needs_identity_for_write(mode: Mode, ignored: bool) -> bool {
    !ignored && matches!(mode, Mode::Update | Mode::Append)
}
