//! JSON snapshot format
//!
//! One file holds one request/response exchange. Field order is fixed by
//! the struct definitions below so rewritten files diff cleanly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::exchange::{Request, Response};
use crate::{Result, SnapError};

/// Name of the header whose media type drives body classification
pub const CONTENT_TYPE: &str = "content-type";

/// Name of the header describing wire compression
pub const CONTENT_ENCODING: &str = "content-encoding";

/// How a body was decoded for storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// Parsed JSON value
    Json,
    /// UTF-8 text
    Text,
    /// Base64 of raw bytes
    Binary,
}

/// Stored request half of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Body, shaped by the record's `requestType`
    pub body: Value,
}

/// Stored response half of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP status text
    pub status_text: String,
    /// Headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Decoded body, shaped by the record's `responseType`
    pub body: Value,
}

/// A persisted request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    /// Suffix key the file name was derived from
    pub suffix_key: String,
    /// Request body classification
    pub request_type: BodyType,
    /// Captured request
    pub request: RecordedRequest,
    /// Response body classification
    pub response_type: BodyType,
    /// Captured `content-encoding`, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// Captured response
    pub response: RecordedResponse,
}

impl SnapshotRecord {
    /// Build a record from a completed exchange
    #[must_use]
    pub fn capture(suffix_key: impl Into<String>, request: &Request, response: &Response) -> Self {
        let (request_type, request_body) =
            classify_body(request.header(CONTENT_TYPE), &request.body);
        let (response_type, response_body) =
            classify_body(response.header(CONTENT_TYPE), &response.body);

        Self {
            suffix_key: suffix_key.into(),
            request_type,
            request: RecordedRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                headers: request.headers.clone(),
                body: request_body,
            },
            response_type,
            compression: response.header(CONTENT_ENCODING).map(str::to_owned),
            response: RecordedResponse {
                status: response.status,
                status_text: response.status_text.clone(),
                headers: response.headers.clone(),
                body: response_body,
            },
        }
    }

    /// Decoded response body bytes, before any content-encoding
    ///
    /// # Errors
    ///
    /// Returns error if the stored body does not match `responseType`
    pub fn response_body(&self) -> Result<Bytes> {
        decode_body(self.response_type, &self.response.body)
    }
}

/// Check whether a content-type denotes JSON
///
/// Accepts `application/json`, structured `+json` suffixes and vendor
/// `x-...json` subtypes such as `application/x-amz-json-1.0`.
#[must_use]
pub fn is_json_media_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let Some((_, subtype)) = media_type.split_once('/') else {
        return false;
    };

    subtype == "json"
        || subtype.ends_with("+json")
        || (subtype.starts_with("x-") && subtype.contains("json"))
}

/// Classify and decode a body for storage
///
/// JSON media types are parsed when possible; anything else that is valid
/// UTF-8 is kept as text, and the rest is base64.
#[must_use]
pub fn classify_body(content_type: Option<&str>, body: &[u8]) -> (BodyType, Value) {
    let Ok(text) = std::str::from_utf8(body) else {
        return (BodyType::Binary, Value::String(STANDARD.encode(body)));
    };

    if content_type.is_some_and(is_json_media_type) {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return (BodyType::Json, value);
        }
    }

    (BodyType::Text, Value::String(text.to_string()))
}

/// Turn a stored body back into bytes
///
/// JSON is re-serialized compactly, so the result may differ in length from
/// the originally captured bytes.
///
/// # Errors
///
/// Returns error if a text or binary body is not a string, or if base64
/// decoding fails
pub fn decode_body(body_type: BodyType, body: &Value) -> Result<Bytes> {
    match body_type {
        BodyType::Json => serde_json::to_vec(body)
            .map(Bytes::from)
            .map_err(SnapError::Serialize),
        BodyType::Text => match body {
            Value::String(text) => Ok(Bytes::from(text.clone())),
            other => Err(SnapError::InvalidFormat(format!(
                "text body must be a string, found {other}"
            ))),
        },
        BodyType::Binary => {
            let Value::String(encoded) = body else {
                return Err(SnapError::InvalidFormat(
                    "binary body must be a base64 string".to_string(),
                ));
            };
            STANDARD
                .decode(encoded)
                .map(Bytes::from)
                .map_err(|e| SnapError::InvalidFormat(format!("invalid base64 body: {e}")))
        }
    }
}
