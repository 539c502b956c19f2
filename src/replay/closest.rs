//! Closest-match diagnostics for read-mode misses

use std::path::Path;
use std::time::{Duration, Instant};

use similar::{ChangeTag, TextDiff};
use tracing::{debug, warn};

use crate::storage::{self, SnapshotFileIdentity, SNAPSHOT_EXTENSION};

/// Candidates at or above this share of changed characters are not reported
pub const MAX_DIFF_RATIO: f64 = 0.5;

/// Time allowed for scoring all candidates of one miss
pub const DIFF_BUDGET: Duration = Duration::from_millis(500);

/// How the best candidate relates to the missed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Same suffix key under a different file name
    Renamed,
    /// Suffix key changed
    ContentChanged,
}

/// Best near-miss for a fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestMatch {
    /// Candidate file name, relative to its directory
    pub file_name: String,
    /// Suffix key stored in the candidate
    pub suffix_key: String,
    /// Changed characters over compared characters
    pub diff_ratio: f64,
    /// Relation to the missed request
    pub kind: MatchKind,
    /// Inline rendering of the edit script, `[-removed-]{+inserted+}`
    pub diff: String,
}

impl ClosestMatch {
    /// Human-readable diagnostic
    #[must_use]
    pub fn describe(&self, expected_file: &str) -> String {
        match self.kind {
            MatchKind::Renamed => format!(
                "Snapshot {} has the same suffix key but a different file name; \
                 it was probably renamed by hand. Rename it to {expected_file}.",
                self.file_name
            ),
            MatchKind::ContentChanged => format!(
                "Closest snapshot {} differs in {:.1}% of its suffix key \
                 ([-stored-]{{+requested+}}):\n{}",
                self.file_name,
                self.diff_ratio * 100.0,
                self.diff
            ),
        }
    }
}

/// Character-level edit between two suffix keys
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDiff {
    /// Characters inserted plus characters removed, over all compared
    pub ratio: f64,
    /// Inline rendering, `[-removed-]{+inserted+}`
    pub rendered: String,
}

/// Lowest diff ratio two keys can reach given only their lengths
///
/// With `a` and `b` characters, at most `min(a, b)` survive unchanged, so the
/// ratio is never below `|a - b| / max(a, b)`.
#[must_use]
pub fn min_diff_ratio(stored: &str, requested: &str) -> f64 {
    let a = stored.chars().count();
    let b = requested.chars().count();
    let longest = a.max(b);
    if longest == 0 {
        0.0
    } else {
        a.abs_diff(b) as f64 / longest as f64
    }
}

/// Compute the character-level edit script from `stored` to `requested`
///
/// Returns `None` when the diff does not finish before `deadline`; the
/// partial script past that point is not a real edit distance.
#[must_use]
pub fn diff_keys(stored: &str, requested: &str, deadline: Instant) -> Option<KeyDiff> {
    let diff = TextDiff::configure()
        .deadline(deadline)
        .diff_chars(stored, requested);
    if Instant::now() >= deadline {
        return None;
    }

    let mut changed = 0usize;
    let mut total = 0usize;
    let mut rendered = String::with_capacity(stored.len().max(requested.len()));
    let mut open: Option<ChangeTag> = None;

    for change in diff.iter_all_changes() {
        let tag = change.tag();
        let count = change.value().chars().count();
        total += count;
        if tag != ChangeTag::Equal {
            changed += count;
        }

        if open != Some(tag) {
            close_run(&mut rendered, open);
            match tag {
                ChangeTag::Delete => rendered.push_str("[-"),
                ChangeTag::Insert => rendered.push_str("{+"),
                ChangeTag::Equal => {}
            }
            open = Some(tag);
        }
        rendered.push_str(change.value());
    }
    close_run(&mut rendered, open);

    let ratio = if total == 0 {
        0.0
    } else {
        changed as f64 / total as f64
    };

    Some(KeyDiff { ratio, rendered })
}

fn close_run(rendered: &mut String, tag: Option<ChangeTag>) {
    match tag {
        Some(ChangeTag::Delete) => rendered.push_str("-]"),
        Some(ChangeTag::Insert) => rendered.push_str("+}"),
        _ => {}
    }
}

/// Search the identity's directory for the closest stored suffix key
///
/// Only files sharing the identity's name prefix are considered. Unreadable
/// directories and candidates degrade to "no suggestion", and scoring stops
/// once [`DIFF_BUDGET`] is spent.
pub async fn find_closest(identity: &SnapshotFileIdentity) -> Option<ClosestMatch> {
    let dir = identity.directory()?;
    let mut names = match list_candidates(dir, identity).await {
        Ok(names) => names,
        Err(e) => {
            debug!("No closest-match candidates in {}: {e}", dir.display());
            return None;
        }
    };
    names.sort();

    let mut candidates = Vec::with_capacity(names.len());
    for file_name in names {
        match storage::load(&dir.join(&file_name)).await {
            Ok(Some(record)) => candidates.push((file_name, record.suffix_key)),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable snapshot {file_name}: {e}"),
        }
    }
    if candidates.is_empty() {
        return None;
    }

    let requested = identity.suffix_key.clone();
    let deadline = Instant::now() + DIFF_BUDGET;
    tokio::task::spawn_blocking(move || best_candidate(candidates, &requested, deadline))
        .await
        .unwrap_or_else(|e| {
            warn!("Closest-match scoring failed: {e}");
            None
        })
}

/// Lowest-ratio candidate under [`MAX_DIFF_RATIO`]; the first wins a tie
fn best_candidate(
    candidates: Vec<(String, String)>,
    requested: &str,
    deadline: Instant,
) -> Option<ClosestMatch> {
    let mut best: Option<ClosestMatch> = None;

    for (file_name, suffix_key) in candidates {
        let floor = best
            .as_ref()
            .map_or(MAX_DIFF_RATIO, |current| current.diff_ratio);
        if min_diff_ratio(&suffix_key, requested) >= floor {
            continue;
        }

        let Some(key_diff) = diff_keys(&suffix_key, requested, deadline) else {
            debug!("Closest-match scoring ran out of time at {file_name}");
            break;
        };
        if key_diff.ratio >= floor {
            continue;
        }

        let kind = if suffix_key == requested {
            MatchKind::Renamed
        } else {
            MatchKind::ContentChanged
        };
        best = Some(ClosestMatch {
            file_name,
            suffix_key,
            diff_ratio: key_diff.ratio,
            kind,
            diff: key_diff.rendered,
        });
    }

    best
}

async fn list_candidates(
    dir: &Path,
    identity: &SnapshotFileIdentity,
) -> std::io::Result<Vec<String>> {
    let mut prefix = identity.name_prefix.clone();
    if !prefix.is_empty() {
        prefix.push('-');
    }
    let extension = format!(".{SNAPSHOT_EXTENSION}");

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with(&prefix)
            && name.ends_with(&extension)
            && name != identity.file_name()
            && entry.file_type().await.is_ok_and(|t| t.is_file())
        {
            names.push(name);
        }
    }
    Ok(names)
}
