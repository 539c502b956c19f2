//! Write-side bookkeeping: dedup of snapshot writes and usage tracking

mod dedup;
mod usage;

pub use dedup::WriteDedup;
pub use usage::{UsageReport, UsageTracker, REPORT_FILE};
