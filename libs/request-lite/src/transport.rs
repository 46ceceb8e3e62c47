//! Transport seam.
//!
//! The dispatcher talks to a [`TransportService`]: a boxed tower service from
//! `http::Request` to a streaming `http::Response`. The default is a pooled
//! hyper-util client over a rustls connector that speaks both `http` and
//! `https`; tests inject scripted services through
//! [`ClientBuilder::transport`](crate::ClientBuilder::transport).

use crate::config::{ClientConfig, TlsRootConfig};
use crate::error::HttpError;
use bytes::Bytes;
use http::header::USER_AGENT;
use http::{HeaderValue, Request, Response};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::error::Error as StdError;
use std::sync::Arc;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceExt};

/// Streaming response body produced by a transport
pub type TransportBody = BoxBody<Bytes, BoxError>;

/// Type-erased transport used by the dispatcher
pub type TransportService =
    BoxCloneSyncService<Request<Full<Bytes>>, Response<TransportBody>, HttpError>;

/// Erase any compatible tower service into a [`TransportService`]
///
/// Errors that already are [`HttpError`] pass through; TLS failures anywhere
/// in the source chain become [`HttpError::Tls`], everything else
/// [`HttpError::Transport`].
pub fn boxed<S, B>(service: S) -> TransportService
where
    S: Service<Request<Full<Bytes>>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let service = service
        .map_response(|response: Response<B>| {
            let (parts, body) = response.into_parts();
            let body: TransportBody = body.map_err(Into::into).boxed();
            Response::from_parts(parts, body)
        })
        .map_err(|e: S::Error| classify_error(e.into()));
    BoxCloneSyncService::new(service)
}

/// Default transport: pooled hyper client, HTTP/1.1 and HTTP/2 via ALPN
///
/// # Errors
/// Returns `HttpError::Tls` if the root store cannot be loaded and
/// `HttpError::InvalidHeaderValue` for an unusable User-Agent.
pub fn hyper_transport(config: &ClientConfig) -> Result<TransportService, HttpError> {
    let connector = https_connector(config.tls_roots)?;

    let mut builder = Client::builder(TokioExecutor::new());
    // pool_idle_timeout has no effect without a pool timer
    builder
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host);
    if let Some(idle) = config.pool_idle_timeout {
        builder.pool_idle_timeout(idle);
    }
    let client = builder.build::<_, Full<Bytes>>(connector);

    let user_agent = HeaderValue::from_str(&config.user_agent)?;
    let service = client.map_request(move |mut request: Request<Full<Bytes>>| {
        if !request.headers().contains_key(USER_AGENT) {
            request.headers_mut().insert(USER_AGENT, user_agent.clone());
        }
        request
    });

    tracing::debug!(
        tls_roots = ?config.tls_roots,
        pool_max_idle_per_host = config.pool_max_idle_per_host,
        "built hyper transport"
    );
    Ok(boxed(service))
}

fn https_connector(roots: TlsRootConfig) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let provider = crypto_provider();
    let builder = match roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(provider)
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(provider)
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
    };
    Ok(builder.https_or_http().enable_all_versions().build())
}

/// Globally installed provider if any, otherwise a private aws-lc-rs one
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

pub(crate) fn classify_error(err: BoxError) -> HttpError {
    let err = match err.downcast::<HttpError>() {
        Ok(http_err) => return *http_err,
        Err(other) => other,
    };
    let root: &(dyn StdError + 'static) = &*err;
    let is_tls = std::iter::successors(Some(root), |&e| e.source()).any(|e| e.is::<rustls::Error>());
    if is_tls {
        HttpError::Tls(err)
    } else {
        HttpError::Transport(err)
    }
}
