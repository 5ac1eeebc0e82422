// =============================================================================
// UpstreamError — typed error taxonomy for the three upstream endpoints
// =============================================================================

use thiserror::Error;

/// Error surfaced by `UpstreamClient` after retries are exhausted. Callers
/// decide whether a given `kind` is fatal for the current cycle or merely
/// means "omit this address and continue" (`spec.md` §7).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status} for {endpoint}")]
    Http { endpoint: String, status: u16 },

    #[error("failed to decode response body from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },

    #[error("request to {endpoint} timed out after {elapsed_ms}ms")]
    Timeout { endpoint: String, elapsed_ms: u64 },

    #[error("network failure calling {endpoint}: {detail}")]
    Network { endpoint: String, detail: String },
}

impl UpstreamError {
    pub fn endpoint(&self) -> &str {
        match self {
            UpstreamError::Http { endpoint, .. }
            | UpstreamError::Decode { endpoint, .. }
            | UpstreamError::Timeout { endpoint, .. }
            | UpstreamError::Network { endpoint, .. } => endpoint,
        }
    }
}
