//! [`Transport`] backed by `reqwest::blocking`.
//!
//! Automatic redirect following and content decoding are switched off; the
//! executor owns both. Error statuses (>= 400) come back as a
//! [`TransportFailure`] carrying the exchange, so the executor decides whether
//! the error body is read. Clients are cached per (proxy, connect timeout) pair so
//! connection pools are reused across requests.

use std::io::Read;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use reqwest::{Proxy, redirect};
use tracing::{debug, instrument};

use super::error::TransportError;
use super::transport::{Exchange, PreparedRequest, Transport, TransportFailure};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: Option<String>,
    connect_timeout: Duration,
}

/// Blocking reqwest transport.
///
/// Cheap to share: wrap in `Arc` and hand it to
/// [`ClientConfigBuilder::transport`](crate::ClientConfigBuilder::transport).
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    clients: DashMap<ClientKey, Client>,
}

impl ReqwestTransport {
    /// Creates a transport with an empty client cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, request: &PreparedRequest) -> Result<Client, TransportError> {
        let key = ClientKey {
            proxy: request.proxy.clone(),
            connect_timeout: request.connect_timeout,
        };
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(&key)?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

fn build_client(key: &ClientKey) -> Result<Client, TransportError> {
    debug!(proxy = ?key.proxy, connect_timeout_ms = key.connect_timeout.as_millis(), "building HTTP client");
    let mut builder = Client::builder()
        .redirect(redirect::Policy::none())
        .connect_timeout(key.connect_timeout)
        .no_gzip()
        .no_deflate();
    if let Some(proxy) = &key.proxy {
        let proxy_config =
            Proxy::all(proxy.as_str()).map_err(|e| TransportError::invalid_proxy(proxy, e))?;
        builder = builder.proxy(proxy_config);
    }
    builder
        .build()
        .map_err(|e| TransportError::invalid_proxy(key.proxy.clone().unwrap_or_default(), e))
}

impl Transport for ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(method = %request.method, url = %request.url))]
    fn send(&self, request: &PreparedRequest) -> Result<Box<dyn Exchange>, TransportFailure> {
        let client = self.client_for(request)?;

        let mut headers = request.headers.clone();
        if !request.use_caches {
            headers
                .entry(CACHE_CONTROL)
                .or_insert(HeaderValue::from_static("no-cache"));
            headers
                .entry(PRAGMA)
                .or_insert(HeaderValue::from_static("no-cache"));
        }

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .timeout(request.read_timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| TransportError::from_reqwest(request.url.as_str(), e))?;
        let status = response.status().as_u16();
        debug!(status, "received status line");
        let exchange = Box::new(ReqwestExchange::new(response));
        if status >= 400 {
            return Err(TransportFailure::with_exchange(
                TransportError::status(request.url.as_str(), status),
                exchange,
            ));
        }
        Ok(exchange)
    }
}

/// Exchange over a reqwest blocking response.
struct ReqwestExchange {
    status: u16,
    headers: HeaderMap,
    response: Option<Response>,
}

impl ReqwestExchange {
    fn new(response: Response) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            response: Some(response),
        }
    }
}

impl Exchange for ReqwestExchange {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn take_body(&mut self) -> Option<Box<dyn Read + Send>> {
        self.response
            .take()
            .map(|response| Box::new(response) as Box<dyn Read + Send>)
    }

    fn disconnect(&mut self) {
        self.response = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn prepared(proxy: Option<&str>) -> PreparedRequest {
        PreparedRequest {
            method: reqwest::Method::GET,
            url: url::Url::parse("http://example.com/").unwrap(),
            headers: HeaderMap::new(),
            body: None,
            proxy: proxy.map(str::to_string),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            use_caches: true,
        }
    }

    #[test]
    fn test_clients_are_cached_per_key() {
        let transport = ReqwestTransport::new();
        transport.client_for(&prepared(None)).unwrap();
        transport.client_for(&prepared(None)).unwrap();
        assert_eq!(transport.clients.len(), 1);

        transport
            .client_for(&prepared(Some("http://proxy.local:3128")))
            .unwrap();
        assert_eq!(transport.clients.len(), 2);
    }

    #[test]
    fn test_invalid_proxy_is_reported() {
        let transport = ReqwestTransport::new();
        let result = transport.client_for(&prepared(Some("::not a proxy::")));
        assert!(matches!(result, Err(TransportError::InvalidProxy { .. })));
    }
}
