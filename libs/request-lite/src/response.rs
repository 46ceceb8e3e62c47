use crate::body::ResponseBody;
use http::{HeaderMap, Method, StatusCode};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use url::Url;

/// Status line and headers of an attempt, before its body is read
///
/// This is what redirect predicates inspect.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseHead {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `Location` header, if present and valid text
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(http::header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap) {
        (self.status, self.headers)
    }
}

/// The request that produced a response (the final attempt of a chain)
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    #[serde(serialize_with = "serialize_url")]
    uri: Url,
    #[serde(serialize_with = "serialize_method")]
    method: Method,
    #[serde(serialize_with = "serialize_headers")]
    headers: HeaderMap,
}

impl RequestView {
    #[must_use]
    pub fn new(uri: Url, method: Method, headers: HeaderMap) -> Self {
        Self {
            uri,
            method,
            headers,
        }
    }

    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Final result of a request chain
///
/// Intermediate redirect responses are never surfaced; only the attempt that
/// stopped the chain is.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    status_code: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    request: RequestView,
}

impl ResponseRecord {
    pub(crate) fn new(head: ResponseHead, body: ResponseBody, request: RequestView) -> Self {
        let (status_code, headers) = head.into_parts();
        Self {
            status_code,
            headers,
            body,
            request,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    #[must_use]
    pub fn request(&self) -> &RequestView {
        &self.request
    }

    /// Serializable view used by the debug trace
    #[must_use]
    pub fn view(&self) -> ResponseView<'_> {
        ResponseView {
            status_code: self.status_code.as_u16(),
            body: &self.body,
            headers: HeadersView(&self.headers),
            request: &self.request,
        }
    }
}

/// Borrowed, serializable form of a [`ResponseRecord`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView<'a> {
    pub status_code: u16,
    pub body: &'a ResponseBody,
    pub headers: HeadersView<'a>,
    pub request: &'a RequestView,
}

/// Header map serialized as `name -> value`; repeated names are joined
/// with `", "`
#[derive(Debug, Clone, Copy)]
pub struct HeadersView<'a>(pub &'a HeaderMap);

impl Serialize for HeadersView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.keys_len()))?;
        for name in self.0.keys() {
            let joined = self
                .0
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>()
                .join(", ");
            map.serialize_entry(name.as_str(), &joined)?;
        }
        map.end()
    }
}

fn serialize_url<S: Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(url.as_str())
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

fn serialize_headers<S: Serializer>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error> {
    HeadersView(headers).serialize(serializer)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn record() -> ResponseRecord {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let mut sent = HeaderMap::new();
        sent.insert("accept", HeaderValue::from_static("*/*"));

        ResponseRecord::new(
            ResponseHead::new(StatusCode::OK, headers),
            ResponseBody::Text("hello".to_owned()),
            RequestView::new(
                Url::parse("http://example.com/a").unwrap(),
                Method::GET,
                sent,
            ),
        )
    }

    #[test]
    fn test_location_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(ResponseHead::new(StatusCode::FOUND, headers.clone()).location(), None);

        headers.insert(http::header::LOCATION, HeaderValue::from_static("/next"));
        let head = ResponseHead::new(StatusCode::FOUND, headers);
        assert_eq!(head.location(), Some("/next"));
        assert_eq!(head.status(), StatusCode::FOUND);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let record = record();
        let value = serde_json::to_value(record.view()).unwrap();
        assert_eq!(
            value,
            json!({
                "statusCode": 200,
                "body": "hello",
                "headers": {
                    "content-type": "text/plain",
                    "set-cookie": "a=1, b=2"
                },
                "request": {
                    "uri": "http://example.com/a",
                    "method": "GET",
                    "headers": { "accept": "*/*" }
                }
            })
        );
    }

    #[test]
    fn test_record_accessors() {
        let record = record();
        assert_eq!(record.status_code(), StatusCode::OK);
        assert_eq!(record.request().method(), Method::GET);
        assert_eq!(record.request().uri().as_str(), "http://example.com/a");
        assert_eq!(record.body().as_text(), Some("hello"));
        assert_eq!(record.into_body(), ResponseBody::Text("hello".to_owned()));
    }
}
