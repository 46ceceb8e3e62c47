use crate::client::Client;
use crate::config::{ClientConfig, TlsRootConfig};
use crate::defaults::DefaultChain;
use crate::error::HttpError;
use crate::options::RequestOptions;
use crate::transport::{self, TransportService};
use std::time::Duration;

/// Builder for constructing a [`Client`]
///
/// Transport settings come from a [`ClientConfig`]; the starting default
/// chain is the config's chain unless replaced or extended here.
pub struct ClientBuilder {
    config: ClientConfig,
    defaults: Option<DefaultChain>,
    transport: Option<TransportService>,
}

impl ClientBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            defaults: None,
            transport: None,
        }
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the TLS root certificate strategy
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Set the idle connection timeout for the connection pool
    ///
    /// Set to `None` to keep hyper-util's default.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle connections per host
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Derive the client's default chain with `overrides`
    ///
    /// Calls accumulate: each one derives from the result of the previous.
    #[must_use]
    pub fn defaults(mut self, overrides: impl Into<RequestOptions>) -> Self {
        let chain = self
            .defaults
            .take()
            .unwrap_or_else(|| self.config.default_chain());
        self.defaults = Some(chain.derive(overrides));
        self
    }

    /// Replace the starting default chain
    #[must_use]
    pub fn default_chain(mut self, chain: DefaultChain) -> Self {
        self.defaults = Some(chain);
        self
    }

    /// Use `transport` instead of the built-in hyper client
    ///
    /// Any tower service can be adapted with [`transport::boxed`]. Pool,
    /// TLS and User-Agent settings only apply to the built-in transport.
    #[must_use]
    pub fn transport(mut self, transport: TransportService) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the User-Agent is not
    /// a valid header value.
    pub fn build(self) -> Result<Client, HttpError> {
        let transport = match self.transport {
            Some(transport) => {
                tracing::debug!("using injected transport");
                transport
            }
            None => transport::hyper_transport(&self.config)?,
        };
        let defaults = self
            .defaults
            .unwrap_or_else(|| self.config.default_chain());
        Ok(Client::from_parts(transport, defaults))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use crate::options::{OptionValue, keys};
    use crate::test_support::{Reply, scripted};
    use serde_json::json;

    fn method_of(client: &Client) -> Option<serde_json::Value> {
        client
            .default_chain()
            .get(keys::METHOD)
            .and_then(OptionValue::to_json)
    }

    #[test]
    fn test_builder_default() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(builder.config.pool_max_idle_per_host, 32);
        assert!(builder.defaults.is_none());
        assert!(builder.transport.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let builder = ClientBuilder::new()
            .user_agent("probe/1.0")
            .tls_roots(TlsRootConfig::Native)
            .pool_idle_timeout(None)
            .pool_max_idle_per_host(2);
        assert_eq!(builder.config.user_agent, "probe/1.0");
        assert_eq!(builder.config.tls_roots, TlsRootConfig::Native);
        assert_eq!(builder.config.pool_idle_timeout, None);
        assert_eq!(builder.config.pool_max_idle_per_host, 2);
    }

    #[test]
    fn test_builder_defaults_accumulate() {
        let (transport, _) = scripted(Vec::new());
        let client = ClientBuilder::new()
            .transport(transport)
            .defaults(RequestOptions::new().method("POST"))
            .defaults(RequestOptions::new().max_redirects(1))
            .build()
            .unwrap();

        assert_eq!(method_of(&client), Some(json!("POST")));
        assert_eq!(
            client
                .default_chain()
                .get(keys::MAX_REDIRECTS)
                .and_then(OptionValue::to_json),
            Some(json!(1))
        );
    }

    #[test]
    fn test_builder_starts_from_config_defaults() {
        let mut config = ClientConfig::for_testing();
        config.defaults.insert("method".to_owned(), json!("PATCH"));
        let (transport, _) = scripted(Vec::new());

        let client = ClientBuilder::with_config(config)
            .transport(transport)
            .build()
            .unwrap();
        assert_eq!(method_of(&client), Some(json!("PATCH")));
    }

    #[test]
    fn test_builder_replaces_chain() {
        let (transport, _) = scripted(Vec::new());
        let client = ClientBuilder::new()
            .transport(transport)
            .default_chain(DefaultChain::empty())
            .build()
            .unwrap();
        assert!(client.default_chain().as_map().is_empty());
    }

    #[tokio::test]
    async fn test_builder_uses_injected_transport() {
        let (transport, seen) = scripted(vec![Reply::ok(&[b"scripted"])]);
        let client = ClientBuilder::new().transport(transport).build().unwrap();
        let record = client.get("http://a.test/").unwrap().send().await.unwrap();

        assert_eq!(record.body().as_text(), Some("scripted"));
        assert_eq!(seen.lock().unwrap().len(), 1);
        // User-Agent is only injected by the built-in transport
        assert!(seen.lock().unwrap()[0].headers.get("user-agent").is_none());
    }

    #[tokio::test]
    async fn test_builder_rejects_bad_user_agent() {
        let err = ClientBuilder::new().user_agent("bad\nagent").build().unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeaderValue(_)));
    }
}
