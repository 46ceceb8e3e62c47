//! Request body encoding and response body aggregation.

use crate::error::HttpError;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// How JSON applies to a request
///
/// `Parse` and `Serialize` both make the client attempt a JSON parse of a
/// text response; only `Serialize` supplies a request body by itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JsonMode {
    #[default]
    Off,
    /// Treat the request body as JSON and parse the response
    Parse,
    /// Send this value as the JSON request body and parse the response
    Serialize(Value),
}

impl JsonMode {
    /// Interpret a `json` option value: `true` parses, other truthy values
    /// are serialized, falsy values (`null`, `false`, `0`, `""`) disable it
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Self::Parse,
            other if is_truthy(other) => Self::Serialize(other.clone()),
            _ => Self::Off,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Outgoing payload as the caller supplied it
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent verbatim, never serialized
    Bytes(Bytes),
    /// Sent as UTF-8, or as a JSON string literal under [`JsonMode::Parse`]
    Text(String),
    /// Structured payload, serialized under [`JsonMode::Parse`]
    Json(Value),
}

/// Resolve the bytes to transmit, if any
///
/// 1. An explicit body wins; under [`JsonMode::Parse`] text and structured
///    bodies are JSON-serialized, otherwise text goes out verbatim.
/// 2. Without a body, [`JsonMode::Serialize`] supplies one.
/// 3. Otherwise nothing is sent.
///
/// An empty text body counts as no body.
///
/// # Errors
/// Returns `HttpError::Json` if serialization fails and
/// `HttpError::InvalidOption` for a structured body without JSON enabled.
pub fn encode(body: Option<&RequestBody>, json: &JsonMode) -> Result<Option<Bytes>, HttpError> {
    let body = body.filter(|b| !matches!(b, RequestBody::Text(text) if text.is_empty()));
    let encoded = match (body, json) {
        (Some(RequestBody::Bytes(raw)), _) => Some(raw.clone()),
        (Some(RequestBody::Text(text)), JsonMode::Parse) => Some(serde_json::to_vec(text)?.into()),
        (Some(RequestBody::Text(text)), _) => Some(Bytes::from(text.clone())),
        (Some(RequestBody::Json(value)), JsonMode::Parse) => Some(serde_json::to_vec(value)?.into()),
        (Some(RequestBody::Json(_)), _) => {
            return Err(HttpError::invalid_option(
                crate::options::keys::BODY,
                "bytes or text unless json is true",
            ));
        }
        (None, JsonMode::Serialize(value)) => Some(serde_json::to_vec(value)?.into()),
        (None, _) => None,
    };
    Ok(encoded)
}

/// Text encodings a response body can be decoded with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// 7-bit ASCII; the high bit of every byte is dropped
    Ascii,
    /// One byte per code point (`latin1`, alias `binary`)
    Latin1,
    Utf16Le,
    /// Lowercase hexadecimal digits of the raw bytes
    Hex,
    /// Standard padded base64 of each chunk
    Base64,
}

impl TextEncoding {
    /// Look up an encoding by name (case-insensitive)
    ///
    /// # Errors
    /// Returns `HttpError::UnknownEncoding` for unsupported names.
    pub fn from_name(name: &str) -> Result<Self, HttpError> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(HttpError::UnknownEncoding(name.to_owned())),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Utf16Le => "utf16le",
            Self::Hex => "hex",
            Self::Base64 => "base64",
        }
    }
}

/// Response body decoding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Decode into a string
    Text(TextEncoding),
    /// Keep raw bytes
    Binary,
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Text(TextEncoding::Utf8)
    }
}

/// Finished response body; exactly one representation is ever produced
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Bytes),
    /// Parsed JSON, present only when the request enabled JSON and the
    /// text body parsed
    Json(Value),
}

impl ResponseBody {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) | Self::Json(_) => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(_) | Self::Json(_) => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) | Self::Bytes(_) => None,
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Bytes(bytes) => serializer.serialize_bytes(bytes),
            Self::Json(value) => value.serialize(serializer),
        }
    }
}

/// Incremental text decoder
///
/// UTF-8 and UTF-16 keep incomplete trailing code units until the next
/// chunk arrives.
#[derive(Debug)]
struct TextDecoder {
    encoding: TextEncoding,
    pending: Vec<u8>,
}

impl TextDecoder {
    fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    fn decode(&mut self, chunk: &[u8], out: &mut String) {
        match self.encoding {
            TextEncoding::Utf8 => self.decode_utf8(chunk, out),
            TextEncoding::Utf16Le => self.decode_utf16le(chunk, out),
            TextEncoding::Ascii => out.extend(chunk.iter().map(|b| char::from(b & 0x7f))),
            TextEncoding::Latin1 => out.extend(chunk.iter().map(|&b| char::from(b))),
            TextEncoding::Hex => out.push_str(&hex::encode(chunk)),
            TextEncoding::Base64 => {
                out.push_str(&base64::engine::general_purpose::STANDARD.encode(chunk));
            }
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8], out: &mut String) {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut rest = buf.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn decode_utf16le(&mut self, chunk: &[u8], out: &mut String) {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut units: Vec<u16> = buf
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let odd = buf.len() % 2 == 1;
        if odd {
            self.pending.push(buf[buf.len() - 1]);
        }
        if let Some(&last) = units.last()
            && (0xD800..=0xDBFF).contains(&last)
        {
            units.pop();
            let mut carried = last.to_le_bytes().to_vec();
            carried.append(&mut self.pending);
            self.pending = carried;
        }

        out.extend(
            char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
    }

    fn finish(self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }
}

#[derive(Debug)]
enum Aggregate {
    Binary { chunks: Vec<Bytes>, length: usize },
    Text { decoder: TextDecoder, text: String, received: usize },
}

/// Collects response chunks into a [`ResponseBody`]
#[derive(Debug)]
pub struct BodyAggregator {
    state: Aggregate,
}

impl BodyAggregator {
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        let state = match encoding {
            Encoding::Binary => Aggregate::Binary {
                chunks: Vec::new(),
                length: 0,
            },
            Encoding::Text(text) => Aggregate::Text {
                decoder: TextDecoder::new(text),
                text: String::new(),
                received: 0,
            },
        };
        Self { state }
    }

    /// Append one chunk in arrival order
    pub fn push(&mut self, chunk: Bytes) {
        match &mut self.state {
            Aggregate::Binary { chunks, length } => {
                *length += chunk.len();
                chunks.push(chunk);
            }
            Aggregate::Text {
                decoder,
                text,
                received,
            } => {
                *received += chunk.len();
                decoder.decode(&chunk, text);
            }
        }
    }

    /// Raw bytes received so far, before any decoding
    #[must_use]
    pub fn received(&self) -> usize {
        match &self.state {
            Aggregate::Binary { length, .. } | Aggregate::Text { received: length, .. } => *length,
        }
    }

    /// Finalize the body
    ///
    /// A single binary chunk is returned as-is. With JSON enabled a text body
    /// is parsed; when parsing fails the text is returned unchanged.
    #[must_use]
    pub fn finish(self, json: &JsonMode) -> ResponseBody {
        let body = match self.state {
            Aggregate::Binary { mut chunks, length } => {
                if chunks.len() == 1 {
                    ResponseBody::Bytes(chunks.remove(0))
                } else {
                    let mut joined = BytesMut::with_capacity(length);
                    for chunk in &chunks {
                        joined.extend_from_slice(chunk);
                    }
                    ResponseBody::Bytes(joined.freeze())
                }
            }
            Aggregate::Text { decoder, mut text, .. } => {
                decoder.finish(&mut text);
                ResponseBody::Text(text)
            }
        };

        match body {
            ResponseBody::Text(text) if json.is_enabled() => match serde_json::from_str(&text) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    tracing::debug!(error = %e, "response body is not JSON; keeping text");
                    ResponseBody::Text(text)
                }
            },
            other => other,
        }
    }
}
