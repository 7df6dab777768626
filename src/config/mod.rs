//! Client-wide configuration.
//!
//! A [`ClientConfig`] is immutable once built and is shared by reference (or
//! `Arc`) between every request that runs against it. The cookie jar and the
//! authentication registry inside it are the only mutable parts and carry
//! their own synchronization.

pub mod constants;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT_ENCODING, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use thiserror::Error;
use url::Url;

use crate::auth::AuthenticationManager;
use crate::cookie::CookieJar;
use crate::http::{InterceptorTable, ReqwestTransport, Transport};

/// Errors raised while building a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A default header name or value is invalid.
    #[error("invalid default header: {name}")]
    InvalidHeader {
        /// Header name as given.
        name: String,
    },

    /// The proxy is not an `http`, `https` or `socks5` URL.
    #[error("invalid proxy URL: {proxy}")]
    InvalidProxy {
        /// Proxy as given.
        proxy: String,
    },

    /// A timeout of zero would fail every request.
    #[error("{field} must be greater than zero")]
    ZeroTimeout {
        /// Which timeout.
        field: &'static str,
    },
}

/// Process-wide defaults and shared state for request execution.
#[derive(Clone)]
pub struct ClientConfig {
    proxy: Option<String>,
    connect_timeout: Duration,
    read_timeout: Duration,
    default_headers: HeaderMap,
    max_redirects: u32,
    cookie_jar: Arc<CookieJar>,
    auth_manager: Arc<AuthenticationManager>,
    interceptors: InterceptorTable,
    transport: Arc<dyn Transport>,
}

impl ClientConfig {
    /// Starts a builder with the defaults from [`constants`].
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Default proxy URL.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Headers sent with every request unless the request overrides them.
    #[must_use]
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Redirect hops allowed per request.
    #[must_use]
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Jar shared by every request that does not bring its own.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.cookie_jar
    }

    #[must_use]
    pub fn auth_manager(&self) -> &Arc<AuthenticationManager> {
        &self.auth_manager
    }

    /// Status code interceptors (301/302 redirects by default).
    #[must_use]
    pub fn interceptors(&self) -> &InterceptorTable {
        &self.interceptors
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(constants::USER_AGENT));
        default_headers.insert(
            ACCEPT_ENCODING,
            HeaderValue::from_static(constants::ACCEPT_ENCODING),
        );
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(constants::CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(constants::READ_TIMEOUT_SECS),
            default_headers,
            max_redirects: constants::MAX_REDIRECTS,
            cookie_jar: Arc::new(CookieJar::new()),
            auth_manager: Arc::new(AuthenticationManager::new()),
            interceptors: InterceptorTable::with_redirects(),
            transport: Arc::new(ReqwestTransport::new()),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("proxy", &self.proxy)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("default_headers", &self.default_headers.keys().collect::<Vec<_>>())
            .field("max_redirects", &self.max_redirects)
            .field("cookies", &self.cookie_jar.len())
            .field("auth_manager", &self.auth_manager)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

/// Builds a [`ClientConfig`]. Validation errors surface in [`build`](Self::build).
#[must_use]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    error: Option<ConfigError>,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            error: None,
        }
    }

    /// Routes every request through `proxy` unless the request overrides it.
    pub fn proxy(mut self, proxy: &str) -> Self {
        let valid = Url::parse(proxy)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https" | "socks5" | "socks5h"));
        if valid {
            self.config.proxy = Some(proxy.to_string());
        } else {
            self.error.get_or_insert(ConfigError::InvalidProxy {
                proxy: proxy.to_string(),
            });
        }
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            self.error
                .get_or_insert(ConfigError::ZeroTimeout { field: "connect_timeout" });
        }
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            self.error
                .get_or_insert(ConfigError::ZeroTimeout { field: "read_timeout" });
        }
        self.config.read_timeout = timeout;
        self
    }

    /// Adds or replaces a default header.
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.config.default_headers.insert(name, value);
            }
            _ => {
                self.error.get_or_insert(ConfigError::InvalidHeader {
                    name: name.to_string(),
                });
            }
        }
        self
    }

    /// Replaces the default `User-Agent`.
    pub fn user_agent(self, user_agent: &str) -> Self {
        self.default_header(USER_AGENT.as_str(), user_agent)
    }

    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Shares an existing jar (e.g. one loaded from disk).
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.config.cookie_jar = jar;
        self
    }

    pub fn auth_manager(mut self, manager: Arc<AuthenticationManager>) -> Self {
        self.config.auth_manager = manager;
        self
    }

    /// Replaces the interception table.
    pub fn interceptors(mut self, table: InterceptorTable) -> Self {
        self.config.interceptors = table;
        self
    }

    /// Replaces the transport (the `reqwest` one by default).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = transport;
        self
    }

    /// Finishes the config.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.config),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.read_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_redirects(), 10);
        assert!(config.proxy().is_none());
        assert!(
            config.default_headers()["user-agent"]
                .to_str()
                .unwrap()
                .starts_with("courier/")
        );
        assert_eq!(config.default_headers()["accept-encoding"], "gzip, deflate");
        assert!(config.interceptors().contains(301));
        assert!(config.interceptors().contains(302));
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let result = ClientConfig::builder().proxy("not a proxy").build();
        assert!(matches!(result, Err(ConfigError::InvalidProxy { .. })));
        let result = ClientConfig::builder().proxy("ftp://proxy:21").build();
        assert!(matches!(result, Err(ConfigError::InvalidProxy { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ClientConfig::builder().read_timeout(Duration::ZERO).build();
        assert!(matches!(
            result,
            Err(ConfigError::ZeroTimeout { field: "read_timeout" })
        ));
    }

    #[test]
    fn test_first_error_wins() {
        let result = ClientConfig::builder()
            .default_header("bad header", "x")
            .proxy("nope")
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn test_user_agent_override() {
        let config = ClientConfig::builder().user_agent("probe/1.0").build().unwrap();
        assert_eq!(config.default_headers()["user-agent"], "probe/1.0");
    }

    #[test]
    fn test_clones_share_jar_and_registry() {
        let config = ClientConfig::builder().build().unwrap();
        let copy = config.clone();
        assert!(Arc::ptr_eq(config.cookie_jar(), copy.cookie_jar()));
        assert!(Arc::ptr_eq(config.auth_manager(), copy.auth_manager()));
    }
}
