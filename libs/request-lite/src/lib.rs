#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Request client with derivable defaults
//!
//! This crate provides a small hyper-based HTTP client with:
//! - Immutable default chains that derive child chains, with tombstones to
//!   remove inherited keys
//! - Caller options resolved against those defaults into a typed request
//! - Plain-text, raw-byte and JSON request bodies
//! - 301/302 redirect following with per-request limits and predicates
//! - Response bodies decoded as text, kept as bytes, or parsed as JSON
//! - Both `http` and `https` via rustls, pooled connections
//!
//! Every HTTP status is a response. Errors are either configuration errors,
//! returned before anything is sent, or failures of the attempt in flight.
//!
//! # Example
//!
//! ```ignore
//! use request_lite::{Client, RequestOptions};
//! use serde_json::json;
//!
//! let client = Client::new()?;
//!
//! let record = client.get("https://example.com/")?.send().await?;
//! assert!(record.body().as_text().is_some());
//!
//! let record = client
//!     .post(
//!         RequestOptions::new()
//!             .url("https://example.com/items")
//!             .json_value(json!({ "a": 1 })),
//!     )?
//!     .send()
//!     .await?;
//!
//! client.call("https://example.com/", |result| match result {
//!     Ok(record) => println!("{}", record.status_code()),
//!     Err(e) => eprintln!("{e}"),
//! })?;
//! ```
//!
//! # Debug output
//!
//! Set `HTTP_DEBUG=request-lite` to emit verbose dumps under the
//! `request_lite::trace` tracing target.

mod body;
mod builder;
mod client;
mod config;
pub mod debug;
mod defaults;
mod dispatch;
mod error;
mod options;
mod prepared;
mod redirect;
mod request;
mod response;
pub mod transport;
mod uri;

#[cfg(test)]
mod test_support;

pub use body::{
    BodyAggregator, Encoding, JsonMode, RequestBody, ResponseBody, TextEncoding, encode as encode_body,
};
pub use builder::ClientBuilder;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_USER_AGENT, TlsRootConfig};
pub use defaults::{DEFAULT_MAX_REDIRECTS, DefaultChain, merge_or_delete};
pub use error::{HttpError, InvalidUriKind};
pub use options::{OptionMap, OptionValue, RedirectPredicate, RequestOptions, keys};
pub use prepared::{FollowRedirect, PreparedRequest};
pub use redirect::{AttemptState, RedirectDecision, StopReason, evaluate as evaluate_redirect};
pub use request::PendingRequest;
pub use response::{HeadersView, RequestView, ResponseHead, ResponseRecord, ResponseView};
pub use transport::{TransportBody, TransportService};
pub use uri::{Address, ResolvedUri, Scheme, resolve, resolve_location};
