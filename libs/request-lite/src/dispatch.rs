//! Request dispatch loop.
//!
//! One iteration per attempt: send the current [`PreparedRequest`], consult
//! the redirect policy on the response head, then either retarget and loop
//! or read the body and finish. Only the last attempt's response is ever
//! returned.

use crate::body::BodyAggregator;
use crate::debug::{self, TRACE_TARGET};
use crate::error::HttpError;
use crate::prepared::PreparedRequest;
use crate::redirect::{self, AttemptState, RedirectDecision};
use crate::response::{RequestView, ResponseHead, ResponseRecord};
use crate::transport::{self, TransportBody, TransportService};
use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, Full};
use tower::ServiceExt;

enum Step {
    Redirect(String),
    Done(ResponseRecord),
}

/// Run `request` to completion, following redirects as its options allow
///
/// # Errors
/// Transport, TLS and timeout errors end the chain at the failing attempt.
/// A `Location` that cannot be resolved or has an unsupported scheme is
/// returned as the corresponding configuration error.
pub async fn dispatch(
    transport: TransportService,
    mut request: PreparedRequest,
) -> Result<ResponseRecord, HttpError> {
    loop {
        let attempt = request.redirect_count();
        tracing::debug!(
            method = %request.method(),
            url = request.url(),
            scheme = request.resolved().scheme().as_str(),
            attempt,
            state = %AttemptState::Dispatched,
            "dispatching request"
        );
        if debug::enabled() {
            tracing::debug!(
                target: TRACE_TARGET,
                headers = ?request.headers(),
                body_len = request.body().map_or(0, Bytes::len),
                json = ?request.json(),
                encoding = ?request.encoding(),
                "{} request to {}",
                request.resolved().scheme().as_str(),
                request.url()
            );
        }

        let step = match request.timeout() {
            Some(limit) => tokio::time::timeout(limit, run_attempt(&transport, &request))
                .await
                .map_err(|_| HttpError::Timeout(limit))
                .and_then(|step| step),
            None => run_attempt(&transport, &request).await,
        };

        match step {
            Ok(Step::Redirect(location)) => {
                tracing::debug!(
                    location = %location,
                    attempt,
                    state = %AttemptState::Redirecting,
                    "following redirect"
                );
                request.follow(&location)?;
            }
            Ok(Step::Done(record)) => {
                tracing::debug!(
                    status = record.status_code().as_u16(),
                    redirects = attempt,
                    state = %AttemptState::Completed,
                    "request completed"
                );
                if debug::enabled() {
                    match serde_json::to_string(&record.view()) {
                        Ok(dump) => tracing::debug!(target: TRACE_TARGET, response = %dump, "response"),
                        Err(e) => tracing::debug!(target: TRACE_TARGET, error = %e, "response not serializable"),
                    }
                }
                return Ok(record);
            }
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    attempt,
                    state = %AttemptState::Failed,
                    "request failed"
                );
                return Err(err);
            }
        }
    }
}

async fn run_attempt(transport: &TransportService, request: &PreparedRequest) -> Result<Step, HttpError> {
    let response = transport.clone().oneshot(to_http_request(request)?).await?;
    let (parts, body) = response.into_parts();
    let head = ResponseHead::new(parts.status, parts.headers);

    match redirect::evaluate(&head, request) {
        RedirectDecision::Follow(location) => Ok(Step::Redirect(location)),
        RedirectDecision::Stop(reason) => {
            tracing::trace!(
                status = head.status().as_u16(),
                ?reason,
                state = %AttemptState::AwaitingBody,
                "reading response body"
            );
            let body = read_body(body, request).await?;
            let view = RequestView::new(
                request.uri().clone(),
                request.method().clone(),
                request.headers().clone(),
            );
            Ok(Step::Done(ResponseRecord::new(head, body, view)))
        }
    }
}

fn to_http_request(request: &PreparedRequest) -> Result<Request<Full<Bytes>>, HttpError> {
    let mut builder = Request::builder()
        .method(request.method().clone())
        .uri(request.url());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.headers().clone());
    }
    let body = request.body().cloned().unwrap_or_default();
    Ok(builder.body(Full::new(body))?)
}

async fn read_body(
    mut body: TransportBody,
    request: &PreparedRequest,
) -> Result<crate::body::ResponseBody, HttpError> {
    let mut aggregator = BodyAggregator::new(request.encoding());
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(transport::classify_error)?;
        if let Ok(chunk) = frame.into_data() {
            aggregator.push(chunk);
        }
    }
    tracing::trace!(received = aggregator.received(), "response body complete");
    Ok(aggregator.finish(request.json()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::body::ResponseBody;
    use crate::defaults::DefaultChain;
    use crate::options::RequestOptions;
    use crate::test_support::{Reply, scripted};
    use http::{Method, StatusCode};
    use std::time::Duration;

    fn prepare(options: RequestOptions) -> PreparedRequest {
        PreparedRequest::build(&options, &DefaultChain::base()).unwrap()
    }

    #[tokio::test]
    async fn test_single_attempt_text_body() {
        let (transport, seen) = scripted(vec![Reply::ok(&[b"hel", b"lo"])]);
        let record = dispatch(transport, prepare(RequestOptions::from("http://a.test/x")))
            .await
            .unwrap();

        assert_eq!(record.status_code(), StatusCode::OK);
        assert_eq!(record.body(), &ResponseBody::Text("hello".to_owned()));
        assert_eq!(record.request().uri().as_str(), "http://a.test/x");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].uri, "http://a.test/x");
        assert!(seen[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_chain_returns_last_response() {
        let (transport, seen) = scripted(vec![
            Reply::redirect(302, "http://b.test/second"),
            Reply::redirect(301, "/third"),
            Reply::ok(&[b"done"]),
        ]);
        let record = dispatch(transport, prepare(RequestOptions::from("http://a.test/first")))
            .await
            .unwrap();

        assert_eq!(record.status_code(), StatusCode::OK);
        assert_eq!(record.body().as_text(), Some("done"));
        assert_eq!(record.request().uri().as_str(), "http://b.test/third");

        let uris: Vec<String> = seen.lock().unwrap().iter().map(|r| r.uri.clone()).collect();
        assert_eq!(
            uris,
            ["http://a.test/first", "http://b.test/second", "http://b.test/third"]
        );
    }

    #[tokio::test]
    async fn test_max_redirects_reached_delivers_redirect() {
        let (transport, seen) = scripted(vec![
            Reply::redirect(302, "/1"),
            Reply::redirect(302, "/2"),
            Reply::redirect(302, "/3"),
        ]);
        let record = dispatch(
            transport,
            prepare(RequestOptions::from("http://a.test/").max_redirects(2)),
        )
        .await
        .unwrap();

        assert_eq!(record.status_code(), StatusCode::FOUND);
        assert_eq!(
            record.headers()[http::header::LOCATION],
            "/3"
        );
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_post_redirect_becomes_get_without_body() {
        let (transport, seen) = scripted(vec![Reply::redirect(301, "/moved"), Reply::ok(&[b"ok"])]);
        let options = RequestOptions::from("http://a.test/submit")
            .method("POST")
            .body("payload")
            .follow_all_redirects(true);
        let record = dispatch(transport, prepare(options)).await.unwrap();

        assert_eq!(record.status_code(), StatusCode::OK);
        assert_eq!(record.request().method(), Method::GET);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(&seen[0].body[..], b"payload");
        assert_eq!(seen[1].method, Method::GET);
        assert!(seen[1].body.is_empty());
    }

    #[tokio::test]
    async fn test_predicate_declines_redirect() {
        let (transport, seen) = scripted(vec![Reply::redirect(301, "/elsewhere")]);
        let options = RequestOptions::from("http://a.test/").follow_redirect_if(|_| false);
        let record = dispatch(transport, prepare(options)).await.unwrap();

        assert_eq!(record.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_binary_chunks_aggregate() {
        let (transport, _) = scripted(vec![Reply::ok(&[b"abcd", b"", b"efghij"])]);
        let record = dispatch(transport, prepare(RequestOptions::from("http://a.test/").binary()))
            .await
            .unwrap();
        let bytes = record.body().as_bytes().unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..], b"abcdefghij");
    }

    #[tokio::test]
    async fn test_transport_error_ends_chain() {
        let (transport, seen) = scripted(vec![Reply::redirect(302, "/next"), Reply::fail("connection reset")]);
        let err = dispatch(transport, prepare(RequestOptions::from("http://a.test/")))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
        assert!(!err.is_configuration());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_redirect_scheme_fails() {
        let (transport, _) = scripted(vec![Reply::redirect(302, "ftp://files.test/")]);
        let err = dispatch(transport, prepare(RequestOptions::from("http://a.test/")))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { .. }));
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let (transport, _) = scripted(vec![Reply::ok(&[b"late"]).delayed(Duration::from_millis(500))]);
        let options = RequestOptions::from("http://a.test/").timeout(Duration::from_millis(20));
        let err = dispatch(transport, prepare(options)).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(20)));
    }

    #[test]
    fn test_http_request_carries_headers_and_body() {
        let options = RequestOptions::from("http://a.test/p?q=1")
            .method("put")
            .header("x-one", "1")
            .body("data");
        let request = to_http_request(&prepare(options)).unwrap();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri(), "http://a.test/p?q=1");
        assert_eq!(request.headers()["x-one"], "1");
        assert!(request.headers().get(http::header::CONTENT_LENGTH).is_none());
    }
}
