use crate::builder::ClientBuilder;
use crate::debug::{self, TRACE_TARGET};
use crate::defaults::DefaultChain;
use crate::error::HttpError;
use crate::options::RequestOptions;
use crate::prepared::PreparedRequest;
use crate::request::PendingRequest;
use crate::response::ResponseRecord;
use crate::transport::TransportService;
use tokio::task::JoinHandle;

/// Request client bound to a default chain
///
/// `Client` is `Clone + Send + Sync`; clones share the transport and its
/// connection pool. Each client owns an immutable [`DefaultChain`], and
/// [`Client::defaults`] derives a new client over a child chain without
/// touching this one.
///
/// # Example
///
/// ```ignore
/// use request_lite::{Client, RequestOptions};
///
/// let client = Client::new()?;
/// let api = client.defaults(RequestOptions::new().header("accept", "application/json"));
///
/// let record = api.get("https://api.example.com/users")?.send().await?;
/// println!("{} {:?}", record.status_code(), record.body());
/// ```
#[derive(Clone)]
pub struct Client {
    transport: TransportService,
    defaults: DefaultChain,
}

impl Client {
    /// Create a client with the stock defaults and the hyper transport
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        ClientBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(transport: TransportService, defaults: DefaultChain) -> Self {
        Self {
            transport,
            defaults,
        }
    }

    /// The default chain requests are resolved against
    #[must_use]
    pub fn default_chain(&self) -> &DefaultChain {
        &self.defaults
    }

    /// A client over a chain derived from this one
    ///
    /// See [`DefaultChain::derive`] for the merge rules. The new client
    /// shares this client's transport.
    #[must_use]
    pub fn defaults(&self, overrides: impl Into<RequestOptions>) -> Client {
        Self {
            transport: self.transport.clone(),
            defaults: self.defaults.derive(overrides),
        }
    }

    /// Validate `options` and return a request ready to send
    ///
    /// A bare address (`&str`, `String` or `Url`) is shorthand for options
    /// holding only that address.
    ///
    /// # Errors
    /// Returns a configuration error (see [`HttpError::is_configuration`]);
    /// nothing has been sent at that point.
    pub fn request(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        let options = options.into();
        if debug::enabled() {
            let keys: Vec<&str> = options.as_map().keys().collect();
            tracing::debug!(target: TRACE_TARGET, ?keys, options = ?options, "received options");
        }
        let prepared = PreparedRequest::build(&options, &self.defaults)?;
        Ok(PendingRequest::new(self.transport.clone(), prepared))
    }

    /// Send a request in the background and hand the outcome to `callback`
    ///
    /// Configuration errors are returned here and `callback` is never run.
    /// Otherwise `callback` runs exactly once, with the final response or
    /// the error that ended the chain.
    ///
    /// # Errors
    /// Same as [`Client::request`].
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn call<F>(
        &self,
        options: impl Into<RequestOptions>,
        callback: F,
    ) -> Result<JoinHandle<()>, HttpError>
    where
        F: FnOnce(Result<ResponseRecord, HttpError>) + Send + 'static,
    {
        let pending = self.request(options)?;
        Ok(tokio::spawn(async move {
            callback(pending.send().await);
        }))
    }

    /// `GET` request
    ///
    /// Like every verb helper this overrides any `method` in `options` and
    /// returns the same [`PendingRequest`] as [`Client::request`].
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn get(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "GET")
    }

    /// `PUT` request
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn put(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "PUT")
    }

    /// `POST` request
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn post(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "POST")
    }

    /// `PATCH` request
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn patch(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "PATCH")
    }

    /// `DELETE` request
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn delete(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "DELETE")
    }

    /// Alias of [`Client::delete`]
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn del(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.delete(options)
    }

    /// `HEAD` request
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn head(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "HEAD")
    }

    /// `OPTIONS` request
    ///
    /// # Errors
    /// Same as [`Client::request`].
    pub fn options(&self, options: impl Into<RequestOptions>) -> Result<PendingRequest, HttpError> {
        self.with_method(options, "OPTIONS")
    }

    fn with_method(
        &self,
        options: impl Into<RequestOptions>,
        method: &str,
    ) -> Result<PendingRequest, HttpError> {
        self.request(options.into().method(method))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
