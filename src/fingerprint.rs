//! Request fingerprinting for stable snapshot identities

use serde_json::Value;
use url::Url;

use crate::exchange::Request;

/// Separator between the components of a suffix key
pub const KEY_SEPARATOR: char = '#';

/// Identity of a request for snapshot purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Human-readable, slug-safe file name prefix
    pub name_prefix: String,
    /// Exact string whose digest makes the file name unique
    pub suffix_key: String,
}

/// Strategy computing a [`Fingerprint`] for a request
pub trait FingerprintGenerator: Send + Sync {
    /// Fingerprint a request without consuming its body
    fn generate(&self, request: &Request) -> Fingerprint;
}

impl<F> FingerprintGenerator for F
where
    F: Fn(&Request) -> Fingerprint + Send + Sync,
{
    fn generate(&self, request: &Request) -> Fingerprint {
        self(request)
    }
}

/// Strategy deciding whether a request bypasses snapshots entirely
pub trait IgnorePredicate: Send + Sync {
    /// Returns true when the request must not be read from or written to snapshots
    fn is_ignored(&self, request: &Request) -> bool;
}

impl<F> IgnorePredicate for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn is_ignored(&self, request: &Request) -> bool {
        self(request)
    }
}

/// Default ignore predicate: nothing is ignored
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreNothing;

impl IgnorePredicate for IgnoreNothing {
    fn is_ignored(&self, _request: &Request) -> bool {
        false
    }
}

/// Single-endpoint API where the operation travels in a header and the
/// target resource travels in the JSON body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplexedApi {
    /// Literal tag leading the name prefix
    pub tag: &'static str,
    /// Hostname prefix before the region fragment
    pub host_prefix: &'static str,
    /// Hostname suffix after the region fragment
    pub host_suffix: &'static str,
    /// Header carrying the operation, e.g. `Service_Version.Operation`
    pub operation_header: &'static str,
    /// Top-level body field naming the resource
    pub resource_field: &'static str,
}

/// `dynamodb.<region>.amazonaws.com` with `x-amz-target` operations
pub const DYNAMODB: MultiplexedApi = MultiplexedApi {
    tag: "dynamodb",
    host_prefix: "dynamodb.",
    host_suffix: ".amazonaws.com",
    operation_header: "x-amz-target",
    resource_field: "TableName",
};

impl MultiplexedApi {
    /// Region or account fragment when `host` belongs to this API
    fn region<'a>(&self, host: &'a str) -> Option<&'a str> {
        host.strip_prefix(self.host_prefix)?
            .strip_suffix(self.host_suffix)
            .filter(|region| !region.is_empty())
    }

    fn name_prefix(&self, region: &str, request: &Request, body: &str) -> String {
        let operation = request
            .header(self.operation_header)
            .and_then(|target| target.rsplit('.').next())
            .unwrap_or_default();
        let resource = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get(self.resource_field)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .unwrap_or_default();

        join_segments(&[
            self.tag.to_string(),
            slugify(region),
            slugify(operation),
            slugify(&resource),
        ])
    }
}

/// Default generator: method, host and path, with multiplexed-API overrides
#[derive(Debug, Clone)]
pub struct DefaultFingerprintGenerator {
    multiplexed: Vec<MultiplexedApi>,
}

impl DefaultFingerprintGenerator {
    /// Create a generator recognizing the given multiplexed APIs
    #[must_use]
    pub fn new(multiplexed: Vec<MultiplexedApi>) -> Self {
        Self { multiplexed }
    }
}

impl Default for DefaultFingerprintGenerator {
    fn default() -> Self {
        Self::new(vec![DYNAMODB])
    }
}

impl FingerprintGenerator for DefaultFingerprintGenerator {
    fn generate(&self, request: &Request) -> Fingerprint {
        let body = request.body_text();
        let suffix_key = suffix_key(&request.method, &request.url, &body);
        let method = request.method.to_lowercase();

        let Ok(url) = Url::parse(&request.url) else {
            return Fingerprint {
                name_prefix: join_segments(&[method, slugify(&request.url)]),
                suffix_key,
            };
        };

        let host = url.host_str().unwrap_or_default();
        let name_prefix = match self
            .multiplexed
            .iter()
            .find_map(|api| api.region(host).map(|region| (api, region)))
        {
            Some((api, region)) => api.name_prefix(region, request, &body),
            None => {
                let path = urlencoding::decode(url.path())
                    .map_or_else(|_| url.path().to_string(), |decoded| decoded.into_owned());
                let path = path.strip_suffix(".json").unwrap_or(&path);
                join_segments(&[method, slugify(host), slugify(path)])
            }
        };

        Fingerprint {
            name_prefix,
            suffix_key,
        }
    }
}

/// Build the suffix key: method, URL and body joined by [`KEY_SEPARATOR`]
#[must_use]
pub fn suffix_key(method: &str, url: &str, body: &str) -> String {
    let mut key = String::with_capacity(method.len() + url.len() + body.len() + 2);
    key.push_str(method);
    key.push(KEY_SEPARATOR);
    key.push_str(url);
    key.push(KEY_SEPARATOR);
    key.push_str(body);
    key
}

/// Lower-case, dash-separated slug
///
/// Camel-case boundaries become dashes (`GetItem` -> `get-item`) and every
/// run of non-alphanumeric characters collapses to a single dash.
#[must_use]
pub fn slugify(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            pending_dash = true;
            continue;
        }

        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_numeric()
                || (prev.is_uppercase() && next_is_lower)
            {
                pending_dash = true;
            }
        }

        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.extend(c.to_lowercase());
    }

    slug
}

fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("-")
}
