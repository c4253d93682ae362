//! Shared-secret check for the ingest endpoint.

use axum::http::HeaderMap;

/// Header carrying the shared secret on `/ingest/rows` requests.
pub(crate) const SECRET_HEADER: &str = "x-bridge-secret";

/// Expected secret, compared without leaking length or prefix timing.
#[derive(Debug, Clone)]
pub(crate) struct BridgeSecret {
    secret: String,
}

impl BridgeSecret {
    pub(crate) fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Checks the secret header against the configured value.
    ///
    /// Absent or non-UTF-8 headers never match.
    pub(crate) fn matches(&self, headers: &HeaderMap) -> bool {
        headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|presented| constant_time_eq(presented, &self.secret))
            .unwrap_or(false)
    }
}

fn constant_time_eq(left: &str, right: &str) -> bool {
    if left.len() != right.len() {
        return false;
    }

    let mut diff = 0u8;
    for (l, r) in left.bytes().zip(right.bytes()) {
        diff |= l ^ r;
    }
    diff == 0
}
