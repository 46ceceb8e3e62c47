use std::time::Duration;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// Neither `url` nor `uri` was supplied
    MissingAddress,
}

/// Request client error types
///
/// Two classes exist. Configuration errors are returned synchronously while
/// a request is being prepared, before any network activity; see
/// [`HttpError::is_configuration`]. Everything else comes from an attempt in
/// flight and terminates the redirect chain at that attempt.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Invalid URL (failed to parse or incomplete)
    ///
    /// The `reason` field is a diagnostic message for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to resolve
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// URL scheme has no transport
    #[error("unknown protocol: '{scheme}'")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
    },

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Invalid HTTP method token
    #[error("Invalid method: {0}")]
    InvalidMethod(#[from] http::method::InvalidMethod),

    /// A recognized option holds a value of the wrong shape
    #[error("Option '{key}' must be {expected}")]
    InvalidOption {
        /// Option key
        key: String,
        /// Human readable description of the accepted shape
        expected: &'static str,
    },

    /// Response text encoding name is not supported
    #[error("Unknown encoding: '{0}'")]
    UnknownEncoding(String),

    /// JSON serialization of an outgoing body failed
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Single attempt timed out
    #[error("Request attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (DNS, connection refused, reset, body stream failure)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HttpError {
    /// Returns `true` for errors raised while preparing a request.
    ///
    /// These are never delivered to a completion callback.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidUri { .. }
                | Self::InvalidScheme { .. }
                | Self::InvalidHeaderName(_)
                | Self::InvalidHeaderValue(_)
                | Self::InvalidMethod(_)
                | Self::InvalidOption { .. }
                | Self::UnknownEncoding(_)
                | Self::Json(_)
        )
    }

    pub(crate) fn invalid_option(key: &str, expected: &'static str) -> Self {
        Self::InvalidOption {
            key: key.to_owned(),
            expected,
        }
    }
}
