use crate::defaults::DefaultChain;
use crate::options::OptionMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default User-Agent string for the request client
pub const DEFAULT_USER_AGENT: &str = concat!("request-lite/", env!("CARGO_PKG_VERSION"));

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport and default-chain settings for a [`Client`](crate::Client)
///
/// Durations are written the humantime way (`"90s"`, `"1m 30s"`):
///
/// ```json
/// {
///   "user_agent": "my-app/1.0",
///   "tls_roots": "native",
///   "pool_idle_timeout": "30s",
///   "defaults": { "max_redirects": 3, "headers": { "accept": "application/json" } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// User-Agent header value, sent when a request sets none
    pub user_agent: String,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Timeout for idle pooled connections (default: 90 seconds)
    ///
    /// `None` keeps hyper-util's own default.
    #[serde(with = "humantime_option")]
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    pub pool_max_idle_per_host: usize,

    /// Option overrides applied on top of the stock default chain
    pub defaults: serde_json::Map<String, serde_json::Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            defaults: serde_json::Map::new(),
        }
    }
}

impl ClientConfig {
    /// Small pool with a short idle timeout, for tests against local mock servers
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }

    /// Stock default chain with [`ClientConfig::defaults`] applied
    #[must_use]
    pub fn default_chain(&self) -> DefaultChain {
        if self.defaults.is_empty() {
            return DefaultChain::base();
        }
        DefaultChain::base().derive(OptionMap::from_json(self.defaults.clone()))
    }
}

mod humantime_option {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => s.serialize_str(&humantime::format_duration(*duration).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| humantime::parse_duration(&text).map_err(de::Error::custom))
            .transpose()
    }
}
