use crate::dispatch;
use crate::error::HttpError;
use crate::prepared::PreparedRequest;
use crate::response::ResponseRecord;
use crate::transport::TransportService;

/// A validated request waiting to be sent
///
/// Created by [`Client::request`](crate::Client::request) and the verb
/// helpers once every option has been resolved. Nothing touches the network
/// until [`send()`](PendingRequest::send) is awaited.
///
/// # Example
///
/// ```ignore
/// use request_lite::{Client, RequestOptions};
///
/// let client = Client::new()?;
///
/// let record = client.get("https://api.example.com/users")?.send().await?;
///
/// let record = client
///     .post(
///         RequestOptions::new()
///             .url("https://api.example.com/users")
///             .json_value(serde_json::json!({ "name": "Alice" })),
///     )?
///     .send()
///     .await?;
/// ```
#[must_use = "PendingRequest does nothing until .send() is called"]
pub struct PendingRequest {
    transport: TransportService,
    prepared: PreparedRequest,
}

impl PendingRequest {
    pub(crate) fn new(transport: TransportService, prepared: PreparedRequest) -> Self {
        Self {
            transport,
            prepared,
        }
    }

    /// The resolved request as it will be sent on the first attempt
    #[must_use]
    pub fn prepared(&self) -> &PreparedRequest {
        &self.prepared
    }

    /// Send the request and follow redirects to the final response
    ///
    /// Every HTTP status is a successful outcome here; only transport, TLS
    /// and timeout failures (or an unusable redirect target) are errors.
    ///
    /// # Errors
    /// Returns the error of the failing attempt.
    pub async fn send(self) -> Result<ResponseRecord, HttpError> {
        dispatch::dispatch(self.transport, self.prepared).await
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("method", self.prepared.method())
            .field("url", &self.prepared.url())
            .finish_non_exhaustive()
    }
}
