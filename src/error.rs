//! Error types for snapreplay

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for snapreplay operations
pub type Result<T> = std::result::Result<T, SnapError>;

/// Errors that can occur while recording or replaying snapshots
#[derive(Debug, Error)]
pub enum SnapError {
    /// I/O error other than a missing snapshot file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot file exists but does not hold a valid record
    #[error("Invalid snapshot {path}: {source}")]
    InvalidSnapshot {
        /// Path of the unreadable file
        path: String,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// Stored body does not match its declared type
    #[error("Invalid snapshot format: {0}")]
    InvalidFormat(String),

    /// Snapshot could not be serialized
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(serde_json::Error),

    /// Read mode could not find a snapshot for the request
    #[error("{0}")]
    MissingSnapshot(Box<MissingSnapshot>),

    /// Request matched the ignore predicate while network access is forbidden
    #[error("Request {method} {url} is ignored, but read mode forbids live network access")]
    IgnoredRequest {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// Content-encoding that cannot be reproduced
    #[error("Unsupported content-encoding: {0}")]
    UnsupportedEncoding(String),

    /// Compression codec failure
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid snapshot scope name
    #[error("Invalid scope name: {0}")]
    InvalidScope(String),
}

/// Diagnostic context for a read-mode miss
#[derive(Debug, Clone)]
pub struct MissingSnapshot {
    /// Request method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Request body as text
    pub body: String,
    /// File name the snapshot was expected under
    pub expected_file: String,
    /// Suffix key the file name was derived from
    pub expected_suffix_key: String,
    /// Closest-match diagnostic, if any candidate qualified
    pub suggestion: Option<String>,
}

impl fmt::Display for MissingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "No snapshot found for {} {}", self.method, self.url)?;
        writeln!(f, "  expected file:       {}", self.expected_file)?;
        writeln!(f, "  expected suffix key: {}", self.expected_suffix_key)?;
        if self.headers.is_empty() {
            writeln!(f, "  headers:             (none)")?;
        } else {
            writeln!(f, "  headers:")?;
            for (name, value) in &self.headers {
                writeln!(f, "    {name}: {value}")?;
            }
        }
        if self.body.is_empty() {
            write!(f, "  body:                (empty)")?;
        } else {
            write!(f, "  body:                {}", self.body)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n{suggestion}")?;
        }
        Ok(())
    }
}

impl SnapError {
    /// Returns the miss diagnostic when this is a missing-snapshot error
    #[must_use]
    pub fn as_missing(&self) -> Option<&MissingSnapshot> {
        match self {
            SnapError::MissingSnapshot(missing) => Some(missing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_display() {
        let missing = MissingSnapshot {
            method: "GET".to_string(),
            url: "https://xkcd.com/info.0.json".to_string(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: String::new(),
            expected_file: "get-xkcd-com-info-0-abc.json".to_string(),
            expected_suffix_key: "GET#https://xkcd.com/info.0.json#".to_string(),
            suggestion: None,
        };

        let text = SnapError::MissingSnapshot(Box::new(missing)).to_string();
        assert!(text.contains("GET https://xkcd.com/info.0.json"));
        assert!(text.contains("get-xkcd-com-info-0-abc.json"));
        assert!(text.contains("accept: application/json"));
        assert!(text.contains("(empty)"));
    }

    #[test]
    fn test_as_missing() {
        let err = SnapError::UnsupportedEncoding("zstd".to_string());
        assert!(err.as_missing().is_none());
    }
}
