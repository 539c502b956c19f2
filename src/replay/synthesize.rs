//! Rebuild responses from stored snapshots

use bytes::Bytes;
use tracing::debug;

use super::compression;
use crate::exchange::{find_header, Response};
use crate::storage::{BodyType, SnapshotRecord, CONTENT_ENCODING};
use crate::Result;

/// Header carrying the body length
pub const CONTENT_LENGTH: &str = "content-length";

/// Reconstruct the response captured in a snapshot
///
/// Status, status text and headers are reproduced verbatim. The stored body
/// is plaintext, so any declared `content-encoding` is re-applied. JSON
/// bodies are re-serialized, which can change their length, so an existing
/// `content-length` header is rewritten to the final byte count.
///
/// # Errors
///
/// Returns error if the stored body is malformed or the declared
/// content-encoding cannot be reproduced
pub fn synthesize(record: &SnapshotRecord) -> Result<Response> {
    let mut headers = record.response.headers.clone();
    let plain = record.response_body()?;

    let body = match find_header(&headers, CONTENT_ENCODING) {
        Some(encoding) => {
            let encoded = compression::encode_header(&plain, encoding)?;
            debug!(
                "Re-encoded {} body: {} -> {} bytes",
                encoding,
                plain.len(),
                encoded.len()
            );
            Bytes::from(encoded)
        }
        None => plain,
    };

    if record.response_type == BodyType::Json {
        let length = body.len().to_string();
        for (_, value) in headers
            .iter_mut()
            .filter(|(name, _)| name.eq_ignore_ascii_case(CONTENT_LENGTH))
        {
            value.clone_from(&length);
        }
    }

    Ok(Response {
        status: record.response.status,
        status_text: record.response.status_text.clone(),
        headers,
        body,
    })
}
