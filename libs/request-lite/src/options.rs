//! Caller options and the tagged values they hold.
//!
//! Options are an ordered string-keyed mapping. Recognized keys are listed in
//! [`keys`]; anything else is carried along untouched so a default chain can
//! hold settings the client does not interpret itself.

use crate::error::HttpError;
use crate::response::ResponseHead;
use crate::uri::Address;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Option names understood by the request builder
pub mod keys {
    pub const URL: &str = "url";
    pub const URI: &str = "uri";
    pub const METHOD: &str = "method";
    pub const HEADERS: &str = "headers";
    pub const BODY: &str = "body";
    pub const JSON: &str = "json";
    pub const ENCODING: &str = "encoding";
    pub const FOLLOW_REDIRECT: &str = "follow_redirect";
    pub const FOLLOW_ALL_REDIRECTS: &str = "follow_all_redirects";
    pub const FOLLOW_ORIGINAL_HTTP_METHOD: &str = "follow_original_http_method";
    pub const REMOVE_REFERER_HEADER: &str = "remove_referer_header";
    pub const MAX_REDIRECTS: &str = "max_redirects";
    pub const TIMEOUT: &str = "timeout";
    pub const USE_QUERYSTRING: &str = "use_querystring";
    pub const GZIP: &str = "gzip";
    pub const SEND_IMMEDIATELY: &str = "send_immediately";

    /// Keys resolved from caller options first and the default chain second
    pub const RECOGNIZED: &[&str] = &[
        SEND_IMMEDIATELY,
        METHOD,
        HEADERS,
        USE_QUERYSTRING,
        FOLLOW_REDIRECT,
        FOLLOW_ALL_REDIRECTS,
        FOLLOW_ORIGINAL_HTTP_METHOD,
        MAX_REDIRECTS,
        REMOVE_REFERER_HEADER,
        GZIP,
        ENCODING,
        BODY,
        JSON,
        TIMEOUT,
    ];
}

/// Decides whether a particular redirect response should be followed
#[derive(Clone)]
pub struct RedirectPredicate(Arc<dyn Fn(&ResponseHead) -> bool + Send + Sync>);

impl RedirectPredicate {
    pub fn new(predicate: impl Fn(&ResponseHead) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    #[must_use]
    pub fn allows(&self, head: &ResponseHead) -> bool {
        (self.0)(head)
    }
}

impl fmt::Debug for RedirectPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RedirectPredicate(..)")
    }
}

/// A single option value
///
/// `Unset` is the "no value" marker. In caller options it means "use the
/// default"; in the overrides passed to
/// [`DefaultChain::derive`](crate::DefaultChain::derive) it deletes the
/// inherited key.
#[derive(Debug, Clone)]
pub enum OptionValue {
    Unset,
    Value(Value),
    Map(OptionMap),
    Address(Address),
    Bytes(Bytes),
    Predicate(RedirectPredicate),
}

impl OptionValue {
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// JSON form of plain data (values and nested maps of values)
    #[must_use]
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value.clone()),
            Self::Map(map) => map.to_json().map(Value::Object),
            Self::Address(Address::Raw(text)) => Some(Value::String(text.clone())),
            Self::Address(Address::Structured(url)) => Some(Value::String(url.to_string())),
            Self::Unset | Self::Bytes(_) | Self::Predicate(_) => None,
        }
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_owned()))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<OptionMap> for OptionValue {
    fn from(value: OptionMap) -> Self {
        Self::Map(value)
    }
}

impl From<Bytes> for OptionValue {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

/// Ordered option mapping; re-inserting a key replaces its value in place
#[derive(Debug, Clone, Default)]
pub struct OptionMap(IndexMap<String, OptionValue>);

impl OptionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from a JSON object; nested objects become nested maps
    #[must_use]
    pub fn from_json(object: serde_json::Map<String, Value>) -> Self {
        object
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::Object(nested) => OptionValue::Map(Self::from_json(nested)),
                    other => OptionValue::Value(other),
                };
                (key, value)
            })
            .collect()
    }

    /// JSON object form, or `None` if any entry is not plain data
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Map<String, Value>> {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_unset())
            .map(|(key, value)| value.to_json().map(|json| (key.clone(), json)))
            .collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut OptionValue> {
        self.0.get_mut(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, OptionValue)> for OptionMap {
    fn from_iter<T: IntoIterator<Item = (String, OptionValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for OptionMap {
    type Item = (String, OptionValue);
    type IntoIter = indexmap::map::IntoIter<String, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Options for a single request, or overrides for a default chain
///
/// A bare address converts into options holding only that address:
///
/// ```ignore
/// let pending = client.request("https://example.com/")?;
/// let pending = client.request(
///     RequestOptions::new()
///         .url("https://example.com/users")
///         .method("post")
///         .json_value(serde_json::json!({ "name": "Alice" })),
/// )?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    map: OptionMap,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn as_map(&self) -> &OptionMap {
        &self.map
    }

    #[must_use]
    pub fn into_map(self) -> OptionMap {
        self.map
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.map.get(key)
    }

    /// Set an arbitrary key
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.map.insert(key, value);
        self
    }

    /// Mark a key as having no value
    #[must_use]
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.map.insert(key, OptionValue::Unset);
        self
    }

    #[must_use]
    pub fn url(self, address: impl Into<Address>) -> Self {
        self.set(keys::URL, OptionValue::Address(address.into()))
    }

    #[must_use]
    pub fn uri(self, address: impl Into<Address>) -> Self {
        self.set(keys::URI, OptionValue::Address(address.into()))
    }

    /// HTTP method; case is normalized when the request is prepared
    #[must_use]
    pub fn method(self, method: &str) -> Self {
        self.set(keys::METHOD, method)
    }

    /// Add one header; a later assignment to the same name wins
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match self.map.get_mut(keys::HEADERS) {
            Some(OptionValue::Map(headers)) => headers.insert(name, value),
            _ => {
                let mut headers = OptionMap::new();
                headers.insert(name, value);
                self.map.insert(keys::HEADERS, headers);
            }
        }
        self
    }

    /// Replace the whole header mapping
    #[must_use]
    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers: OptionMap = headers
            .into_iter()
            .map(|(name, value)| (name.into(), OptionValue::from(value.into())))
            .collect();
        self.set(keys::HEADERS, headers)
    }

    /// Text body, sent verbatim (or JSON-serialized when `json(true)`)
    #[must_use]
    pub fn body(self, body: impl Into<String>) -> Self {
        self.set(keys::BODY, body.into())
    }

    /// Raw byte body, always sent verbatim
    #[must_use]
    pub fn body_bytes(self, body: impl Into<Bytes>) -> Self {
        self.set(keys::BODY, OptionValue::Bytes(body.into()))
    }

    /// Structured body; requires `json(true)` to be serialized
    #[must_use]
    pub fn body_value(self, body: Value) -> Self {
        self.set(keys::BODY, body)
    }

    /// Treat the request body as JSON and try to parse the response as JSON
    #[must_use]
    pub fn json(self, enabled: bool) -> Self {
        self.set(keys::JSON, enabled)
    }

    /// Serialize `value` as the request body and parse the response as JSON
    #[must_use]
    pub fn json_value(self, value: Value) -> Self {
        self.set(keys::JSON, value)
    }

    /// Serialize any `Serialize` type as the JSON request body
    ///
    /// # Errors
    /// Returns `HttpError::Json` if serialization fails.
    pub fn json_body<T: Serialize>(self, body: &T) -> Result<Self, HttpError> {
        let value = serde_json::to_value(body)?;
        Ok(self.json_value(value))
    }

    /// Text encoding used to decode the response body
    #[must_use]
    pub fn encoding(self, name: &str) -> Self {
        self.set(keys::ENCODING, name)
    }

    /// Return the response body as raw bytes instead of text
    #[must_use]
    pub fn binary(self) -> Self {
        self.set(keys::ENCODING, Value::Null)
    }

    #[must_use]
    pub fn follow_redirect(self, follow: bool) -> Self {
        self.set(keys::FOLLOW_REDIRECT, follow)
    }

    /// Follow redirects only when `predicate` accepts the redirect response
    #[must_use]
    pub fn follow_redirect_if(
        self,
        predicate: impl Fn(&ResponseHead) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.set(
            keys::FOLLOW_REDIRECT,
            OptionValue::Predicate(RedirectPredicate::new(predicate)),
        )
    }

    #[must_use]
    pub fn follow_all_redirects(self, follow: bool) -> Self {
        self.set(keys::FOLLOW_ALL_REDIRECTS, follow)
    }

    #[must_use]
    pub fn follow_original_http_method(self, keep: bool) -> Self {
        self.set(keys::FOLLOW_ORIGINAL_HTTP_METHOD, keep)
    }

    #[must_use]
    pub fn remove_referer_header(self, remove: bool) -> Self {
        self.set(keys::REMOVE_REFERER_HEADER, remove)
    }

    #[must_use]
    pub fn max_redirects(self, max: u32) -> Self {
        self.set(keys::MAX_REDIRECTS, Value::from(max))
    }

    /// Deadline for each attempt, covering the response head and body
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.set(keys::TIMEOUT, Value::from(millis))
    }

    #[must_use]
    pub fn use_querystring(self, enabled: bool) -> Self {
        self.set(keys::USE_QUERYSTRING, enabled)
    }

    #[must_use]
    pub fn gzip(self, enabled: bool) -> Self {
        self.set(keys::GZIP, enabled)
    }

    #[must_use]
    pub fn send_immediately(self, enabled: bool) -> Self {
        self.set(keys::SEND_IMMEDIATELY, enabled)
    }
}

impl From<&str> for RequestOptions {
    fn from(address: &str) -> Self {
        Self::new().url(address)
    }
}

impl From<String> for RequestOptions {
    fn from(address: String) -> Self {
        Self::new().url(address)
    }
}

impl From<Url> for RequestOptions {
    fn from(address: Url) -> Self {
        Self::new().url(address)
    }
}

impl From<OptionMap> for RequestOptions {
    fn from(map: OptionMap) -> Self {
        Self { map }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_address_converts_to_url_option() {
        let options = RequestOptions::from("http://example.com/");
        assert!(matches!(
            options.get(keys::URL),
            Some(OptionValue::Address(Address::Raw(text))) if text == "http://example.com/"
        ));
        assert_eq!(options.as_map().len(), 1);
    }

    #[test]
    fn test_header_accumulates_and_last_wins() {
        let options = RequestOptions::new()
            .header("x-a", "1")
            .header("x-b", "2")
            .header("x-a", "3");
        let Some(OptionValue::Map(headers)) = options.get(keys::HEADERS) else {
            panic!("headers should be a map");
        };
        let names: Vec<&str> = headers.keys().collect();
        assert_eq!(names, ["x-a", "x-b"]);
        assert_eq!(headers.get("x-a").and_then(OptionValue::to_json), Some(json!("3")));
    }

    #[test]
    fn test_from_json_nests_objects_as_maps() {
        let Value::Object(object) = json!({
            "method": "PUT",
            "headers": { "accept": "text/plain" },
            "encoding": null
        }) else {
            panic!("object expected");
        };
        let map = OptionMap::from_json(object);
        assert!(matches!(map.get("headers"), Some(OptionValue::Map(_))));
        assert!(matches!(map.get("encoding"), Some(OptionValue::Value(Value::Null))));
        assert_eq!(
            map.to_json().map(Value::Object),
            Some(json!({
                "method": "PUT",
                "headers": { "accept": "text/plain" },
                "encoding": null
            }))
        );
    }

    #[test]
    fn test_to_json_rejects_opaque_values() {
        let mut map = OptionMap::new();
        map.insert("body", Bytes::from_static(b"raw"));
        assert!(map.to_json().is_none());
    }

    #[test]
    fn test_timeout_is_stored_in_millis() {
        let options = RequestOptions::new().timeout(Duration::from_secs(5));
        assert!(matches!(
            options.get(keys::TIMEOUT),
            Some(OptionValue::Value(v)) if v == &json!(5000)
        ));
    }

    #[test]
    fn test_json_body_serializes_struct() {
        #[derive(Serialize)]
        struct NewUser<'a> {
            name: &'a str,
        }

        let options = RequestOptions::new()
            .json_body(&NewUser { name: "Alice" })
            .unwrap();
        assert!(matches!(
            options.get(keys::JSON),
            Some(OptionValue::Value(v)) if v == &json!({"name": "Alice"})
        ));
    }
}
