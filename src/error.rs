//! Error types for studygate
//!
//! Only remote-gateway failures (after local tiers miss) and validation
//! errors surface to callers. Store and table failures degrade to cache
//! misses and are logged where they occur.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ContentError>;

/// Error taxonomy for content resolution
#[derive(Debug, Error)]
pub enum ContentError {
    /// A required request field was missing or malformed. Raised before any
    /// I/O, never retried.
    #[error("Validation error: missing or invalid field '{0}'")]
    Validation(String),

    /// Timeout, connection failure, or 5xx on an idempotent read. The
    /// gateway retries these internally before surfacing.
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Non-retryable response (4xx). Propagated immediately.
    #[error("HTTP {status} from {url}")]
    Response { status: u16, url: String },

    /// Payload was not valid JSON, or not an object after unwrapping.
    /// Carries a truncated snippet of the offending payload.
    #[error("Parse error: {reason} (payload starts with: {snippet:?})")]
    Parse { reason: String, snippet: String },

    /// Persistent cache failure. Treated as a miss at the resolution layer;
    /// only surfaced from direct table APIs.
    #[error("Cache table error: {0}")]
    Table(String),

    /// No tier had data for this key.
    #[error("Content not found: {0}")]
    NotFound(String),
}

impl ContentError {
    /// Build a parse error with a bounded snippet of the offending payload.
    pub fn parse(reason: impl Into<String>, payload: &str) -> Self {
        const SNIPPET_LEN: usize = 120;
        let snippet: String = payload.chars().take(SNIPPET_LEN).collect();
        Self::Parse {
            reason: reason.into(),
            snippet,
        }
    }

    /// Whether the gateway may retry the request that produced this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Response { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_truncates_snippet() {
        let long = "x".repeat(500);
        let err = ContentError::parse("not an object", &long);
        match err {
            ContentError::Parse { snippet, .. } => assert_eq!(snippet.len(), 120),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(ContentError::Transient("timeout".into()).is_transient());
        assert!(ContentError::Response {
            status: 503,
            url: "/x".into()
        }
        .is_transient());
        assert!(!ContentError::Response {
            status: 401,
            url: "/x".into()
        }
        .is_transient());
        assert!(!ContentError::Validation("study".into()).is_transient());
    }
}
