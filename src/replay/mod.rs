//! Replaying stored snapshots

pub mod compression;
mod closest;
mod synthesize;

pub use closest::{
    diff_keys, find_closest, min_diff_ratio, ClosestMatch, KeyDiff, MatchKind, DIFF_BUDGET,
    MAX_DIFF_RATIO,
};
pub use synthesize::{synthesize, CONTENT_LENGTH};
