//! Scripted transport for unit tests.

use crate::transport::{self, TransportService};
use bytes::Bytes;
use futures::stream;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body::Frame;
use http_body_util::{BodyExt, Full, StreamBody};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request as the transport received it
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One scripted answer, consumed in order
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    chunks: Vec<Bytes>,
    delay: Option<Duration>,
    failure: Option<&'static str>,
}

impl Reply {
    pub fn ok(chunks: &[&[u8]]) -> Self {
        Self::status(200, chunks)
    }

    pub fn status(status: u16, chunks: &[&[u8]]) -> Self {
        Self {
            status,
            headers: Vec::new(),
            chunks: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            delay: None,
            failure: None,
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::status(status, &[b"redirecting"]).header("location", location)
    }

    pub fn fail(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::status(0, &[])
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_owned()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

type ScriptedBody = StreamBody<stream::Iter<std::vec::IntoIter<Result<Frame<Bytes>, Infallible>>>>;

/// Transport answering with `replies` in order; every request is recorded
pub(crate) fn scripted(replies: Vec<Reply>) -> (TransportService, Arc<Mutex<Vec<Recorded>>>) {
    let replies = Arc::new(Mutex::new(VecDeque::from(replies)));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let service = tower::service_fn(move |request: Request<Full<Bytes>>| {
        let replies = Arc::clone(&replies);
        let recorder = Arc::clone(&recorder);
        async move {
            let (parts, body) = request.into_parts();
            let body = body.collect().await.unwrap().to_bytes();
            recorder.lock().unwrap().push(Recorded {
                method: parts.method,
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });

            let reply = replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more often than scripted");
            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = reply.failure {
                return Err(std::io::Error::other(message));
            }

            let frames: Vec<Result<Frame<Bytes>, Infallible>> =
                reply.chunks.into_iter().map(|c| Ok(Frame::data(c))).collect();
            let mut response: Response<ScriptedBody> =
                Response::new(StreamBody::new(stream::iter(frames)));
            *response.status_mut() = StatusCode::from_u16(reply.status).unwrap();
            for (name, value) in reply.headers {
                response
                    .headers_mut()
                    .append(name, value.parse().unwrap());
            }
            Ok(response)
        }
    });

    (transport::boxed(service), seen)
}
