//! Address resolution.
//!
//! Callers hand over either raw text or an already parsed [`Url`]. Both are
//! resolved once into a [`ResolvedUri`], which carries the canonical string
//! form next to the structured one so later stages never re-parse.

use crate::error::{HttpError, InvalidUriKind};
use url::Url;

/// Caller-supplied address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Unparsed text, e.g. `"https://example.com/a?b=c"`
    Raw(String),
    /// Already structured address
    Structured(Url),
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_owned())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<Url> for Address {
    fn from(value: Url) -> Self {
        Self::Structured(value)
    }
}

/// Transport schemes the client can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain-text HTTP
    Http,
    /// HTTP over TLS
    Https,
}

impl Scheme {
    /// Parse a URL scheme, rejecting anything without a transport
    ///
    /// # Errors
    /// Returns `HttpError::InvalidScheme` for any scheme other than
    /// `http` or `https`.
    pub fn from_url(url: &Url) -> Result<Self, HttpError> {
        match url.scheme() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(HttpError::InvalidScheme {
                scheme: format!("{other}:"),
            }),
        }
    }

    /// Scheme name without the trailing colon
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Address in both canonical string and structured form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUri {
    url: String,
    uri: Url,
    scheme: Scheme,
}

impl ResolvedUri {
    /// Canonical string form
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Structured form (scheme, host, port, path, query)
    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Transport scheme
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    fn from_url(uri: Url) -> Result<Self, HttpError> {
        let scheme = Scheme::from_url(&uri)?;
        if uri.host_str().is_none_or(str::is_empty) {
            return Err(HttpError::InvalidUri {
                url: uri.to_string(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }
        Ok(Self {
            url: uri.as_str().to_owned(),
            uri,
            scheme,
        })
    }
}

/// Resolve a caller-supplied address
///
/// # Errors
/// Returns `HttpError::InvalidUri` when the text cannot be parsed or has no
/// host, and `HttpError::InvalidScheme` when the scheme is neither `http`
/// nor `https`.
pub fn resolve(address: &Address) -> Result<ResolvedUri, HttpError> {
    match address {
        Address::Raw(text) => {
            let uri = Url::parse(text).map_err(|e| HttpError::InvalidUri {
                url: text.clone(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?;
            ResolvedUri::from_url(uri)
        }
        Address::Structured(uri) => ResolvedUri::from_url(uri.clone()),
    }
}

/// Resolve a `Location` header value against the address that produced it
///
/// Absolute locations replace the current address; relative ones are joined
/// onto it.
///
/// # Errors
/// Same as [`resolve`].
pub fn resolve_location(current: &ResolvedUri, location: &str) -> Result<ResolvedUri, HttpError> {
    let uri = current
        .uri
        .join(location)
        .map_err(|e| HttpError::InvalidUri {
            url: location.to_owned(),
            kind: InvalidUriKind::ParseError,
            reason: e.to_string(),
        })?;
    ResolvedUri::from_url(uri)
}
