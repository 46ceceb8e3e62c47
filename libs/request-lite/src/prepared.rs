//! Request preparation.
//!
//! [`PreparedRequest::build`] resolves caller options against a
//! [`DefaultChain`] into a fully typed request. Every configuration problem
//! surfaces here, before any network activity.

use crate::body::{self, Encoding, JsonMode, RequestBody, TextEncoding, is_truthy};
use crate::defaults::{DEFAULT_MAX_REDIRECTS, DefaultChain};
use crate::error::{HttpError, InvalidUriKind};
use crate::options::{OptionMap, OptionValue, RedirectPredicate, RequestOptions, keys};
use crate::uri::{self, Address, ResolvedUri};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, REFERER};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Whether redirect responses are followed
#[derive(Debug, Clone)]
pub enum FollowRedirect {
    Never,
    Always,
    /// Follow only when the predicate accepts the redirect response
    When(RedirectPredicate),
}

impl FollowRedirect {
    fn from_option(value: Option<&OptionValue>) -> Self {
        match value {
            Some(OptionValue::Predicate(predicate)) => Self::When(predicate.clone()),
            other if flag(other) => Self::Always,
            _ => Self::Never,
        }
    }
}

/// Fully resolved request, mutated in place as redirects are followed
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct PreparedRequest {
    resolved: ResolvedUri,
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
    json: JsonMode,
    encoding: Encoding,
    follow_redirect: FollowRedirect,
    follow_all_redirects: bool,
    follow_original_http_method: bool,
    remove_referer_header: bool,
    max_redirects: u32,
    redirect_count: u32,
    timeout: Option<Duration>,
    use_querystring: bool,
    gzip: bool,
    send_immediately: bool,
}

impl PreparedRequest {
    /// Resolve `options` against `defaults`
    ///
    /// Recognized keys take the caller's value unless it is absent or
    /// [`OptionValue::Unset`], then the chain's value, else stay absent. The
    /// address is only ever read from the caller's options.
    ///
    /// # Errors
    /// Returns a configuration error (see [`HttpError::is_configuration`])
    /// for a missing or unsupported address, a malformed header or method,
    /// an option of the wrong shape, an unknown encoding, or a JSON body
    /// that fails to serialize.
    pub fn build(options: &RequestOptions, defaults: &DefaultChain) -> Result<Self, HttpError> {
        let resolved = uri::resolve(&address(options)?)?;
        let pick = |key| {
            options
                .get(key)
                .filter(|value| !value.is_unset())
                .or_else(|| defaults.get(key))
        };

        let method = parse_method(pick(keys::METHOD))?;
        let mut headers = parse_headers(pick(keys::HEADERS))?;
        let json = parse_json(pick(keys::JSON))?;
        let body_option = parse_body(pick(keys::BODY))?;
        let body = body::encode(body_option.as_ref(), &json)?;

        if json.is_enabled() && body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let gzip = flag(pick(keys::GZIP));
        if gzip {
            tracing::warn!("gzip option is accepted but responses are not decompressed");
        }

        Ok(Self {
            resolved,
            method,
            headers,
            body,
            json,
            encoding: parse_encoding(pick(keys::ENCODING))?,
            follow_redirect: FollowRedirect::from_option(pick(keys::FOLLOW_REDIRECT)),
            follow_all_redirects: flag(pick(keys::FOLLOW_ALL_REDIRECTS)),
            follow_original_http_method: flag(pick(keys::FOLLOW_ORIGINAL_HTTP_METHOD)),
            remove_referer_header: flag(pick(keys::REMOVE_REFERER_HEADER)),
            max_redirects: parse_max_redirects(pick(keys::MAX_REDIRECTS))?,
            redirect_count: 0,
            timeout: parse_timeout(pick(keys::TIMEOUT))?,
            use_querystring: flag(pick(keys::USE_QUERYSTRING)),
            gzip,
            send_immediately: flag(pick(keys::SEND_IMMEDIATELY)),
        })
    }

    /// Retarget this request at a redirect `location`
    ///
    /// Unless the original method is kept, the request becomes a body-less
    /// `GET`. The location is resolved before anything is changed, so a bad
    /// location leaves the request untouched.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidUri` or `HttpError::InvalidScheme` when the
    /// location cannot be dispatched.
    pub fn follow(&mut self, location: &str) -> Result<(), HttpError> {
        let next = uri::resolve_location(&self.resolved, location)?;
        self.redirect_count += 1;
        if !self.follow_original_http_method {
            self.method = Method::GET;
            self.body = None;
        }
        if self.remove_referer_header {
            self.headers.remove(REFERER);
        }
        self.resolved = next;
        Ok(())
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.resolved.url()
    }

    #[must_use]
    pub fn uri(&self) -> &Url {
        self.resolved.uri()
    }

    #[must_use]
    pub fn resolved(&self) -> &ResolvedUri {
        &self.resolved
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Encoded body bytes, if any
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn json(&self) -> &JsonMode {
        &self.json
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    #[must_use]
    pub fn follow_redirect(&self) -> &FollowRedirect {
        &self.follow_redirect
    }

    #[must_use]
    pub fn follow_all_redirects(&self) -> bool {
        self.follow_all_redirects
    }

    #[must_use]
    pub fn follow_original_http_method(&self) -> bool {
        self.follow_original_http_method
    }

    #[must_use]
    pub fn remove_referer_header(&self) -> bool {
        self.remove_referer_header
    }

    #[must_use]
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Redirects followed so far
    #[must_use]
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn use_querystring(&self) -> bool {
        self.use_querystring
    }

    #[must_use]
    pub fn gzip(&self) -> bool {
        self.gzip
    }

    #[must_use]
    pub fn send_immediately(&self) -> bool {
        self.send_immediately
    }
}

fn address(options: &RequestOptions) -> Result<Address, HttpError> {
    for key in [keys::URL, keys::URI] {
        match options.get(key) {
            None | Some(OptionValue::Unset) => {}
            Some(OptionValue::Address(address)) => return Ok(address.clone()),
            Some(OptionValue::Value(Value::String(text))) => return Ok(Address::Raw(text.clone())),
            Some(_) => return Err(HttpError::invalid_option(key, "an address string or URL")),
        }
    }
    Err(HttpError::InvalidUri {
        url: String::new(),
        kind: InvalidUriKind::MissingAddress,
        reason: "neither url nor uri was given".to_owned(),
    })
}

/// Truthiness of a flag option; absent is false
fn flag(value: Option<&OptionValue>) -> bool {
    match value {
        None | Some(OptionValue::Unset) => false,
        Some(OptionValue::Value(value)) => is_truthy(value),
        Some(OptionValue::Map(_) | OptionValue::Address(_) | OptionValue::Bytes(_) | OptionValue::Predicate(_)) => {
            true
        }
    }
}

fn parse_method(value: Option<&OptionValue>) -> Result<Method, HttpError> {
    match value {
        None => Ok(Method::GET),
        Some(OptionValue::Value(Value::String(name))) => {
            Ok(Method::from_bytes(name.to_ascii_uppercase().as_bytes())?)
        }
        Some(_) => Err(HttpError::invalid_option(keys::METHOD, "a method name")),
    }
}

fn parse_headers(value: Option<&OptionValue>) -> Result<HeaderMap, HttpError> {
    let entries: Vec<(String, Value)> = match value {
        None | Some(OptionValue::Value(Value::Null)) => Vec::new(),
        Some(OptionValue::Map(map)) => map_entries(map)?,
        Some(OptionValue::Value(Value::Object(object))) => object
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        Some(_) => return Err(headers_error()),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let text = match value {
            Value::String(text) => text,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => return Err(headers_error()),
        };
        headers.insert(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(&text)?,
        );
    }
    Ok(headers)
}

fn map_entries(map: &OptionMap) -> Result<Vec<(String, Value)>, HttpError> {
    map.iter()
        .filter(|(_, value)| !value.is_unset())
        .map(|(name, value)| match value.to_json() {
            Some(json) => Ok((name.to_owned(), json)),
            None => Err(headers_error()),
        })
        .collect()
}

fn headers_error() -> HttpError {
    HttpError::invalid_option(keys::HEADERS, "a mapping of header names to text")
}

fn parse_body(value: Option<&OptionValue>) -> Result<Option<RequestBody>, HttpError> {
    match value {
        None | Some(OptionValue::Value(Value::Null)) => Ok(None),
        Some(OptionValue::Bytes(raw)) => Ok(Some(RequestBody::Bytes(raw.clone()))),
        Some(OptionValue::Value(Value::String(text))) => Ok(Some(RequestBody::Text(text.clone()))),
        Some(OptionValue::Value(value)) => Ok(Some(RequestBody::Json(value.clone()))),
        Some(OptionValue::Map(map)) => map
            .to_json()
            .map(|object| Some(RequestBody::Json(Value::Object(object))))
            .ok_or_else(|| HttpError::invalid_option(keys::BODY, "bytes, text or JSON data")),
        Some(_) => Err(HttpError::invalid_option(keys::BODY, "bytes, text or JSON data")),
    }
}

fn parse_json(value: Option<&OptionValue>) -> Result<JsonMode, HttpError> {
    match value {
        None => Ok(JsonMode::Off),
        Some(OptionValue::Value(value)) => Ok(JsonMode::from_value(value)),
        Some(OptionValue::Map(map)) => map
            .to_json()
            .map(|object| JsonMode::Serialize(Value::Object(object)))
            .ok_or_else(|| HttpError::invalid_option(keys::JSON, "a boolean or JSON data")),
        Some(_) => Err(HttpError::invalid_option(keys::JSON, "a boolean or JSON data")),
    }
}

fn parse_encoding(value: Option<&OptionValue>) -> Result<Encoding, HttpError> {
    match value {
        None => Ok(Encoding::default()),
        Some(OptionValue::Value(Value::Null)) => Ok(Encoding::Binary),
        Some(OptionValue::Value(Value::String(name))) => {
            Ok(Encoding::Text(TextEncoding::from_name(name)?))
        }
        Some(_) => Err(HttpError::invalid_option(
            keys::ENCODING,
            "an encoding name or null",
        )),
    }
}

fn parse_max_redirects(value: Option<&OptionValue>) -> Result<u32, HttpError> {
    match value {
        None => Ok(DEFAULT_MAX_REDIRECTS),
        Some(OptionValue::Value(Value::Number(n))) => n
            .as_u64()
            .map(|max| u32::try_from(max).unwrap_or(u32::MAX))
            .ok_or_else(|| HttpError::invalid_option(keys::MAX_REDIRECTS, "a non-negative integer")),
        Some(_) => Err(HttpError::invalid_option(
            keys::MAX_REDIRECTS,
            "a non-negative integer",
        )),
    }
}

fn parse_timeout(value: Option<&OptionValue>) -> Result<Option<Duration>, HttpError> {
    let expected = "milliseconds or a duration such as \"5s\"";
    match value {
        None | Some(OptionValue::Value(Value::Null)) => Ok(None),
        Some(OptionValue::Value(Value::Number(n))) => n
            .as_u64()
            .map(|millis| Some(Duration::from_millis(millis)))
            .ok_or_else(|| HttpError::invalid_option(keys::TIMEOUT, expected)),
        Some(OptionValue::Value(Value::String(text))) => humantime::parse_duration(text)
            .map(Some)
            .map_err(|_| HttpError::invalid_option(keys::TIMEOUT, expected)),
        Some(_) => Err(HttpError::invalid_option(keys::TIMEOUT, expected)),
    }
}
