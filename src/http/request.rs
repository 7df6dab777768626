//! The request descriptor and its builder.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use super::error::ExecuteError;
use super::hooks::{ConnectionObserver, ResponseHandler};
use crate::cookie::{Cookie, CookieJar};

/// Everything needed to execute one logical request.
///
/// A `Request` is a plain value: cloning it never aliases header maps or
/// ignore sets. Shared collaborators (jar, observer, handler) are `Arc`s.
/// Execute it with [`Request::execute`](Self::execute).
#[derive(Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) payload: Option<Vec<u8>>,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) jar: Option<Arc<CookieJar>>,
    pub(crate) request_cookies: bool,
    pub(crate) store_cookies: bool,
    pub(crate) close: bool,
    pub(crate) use_caches: bool,
    pub(crate) ignored_statuses: HashSet<u16>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) proxy: Option<String>,
    pub(crate) observer: Option<Arc<dyn ConnectionObserver>>,
    pub(crate) response_handler: Option<Arc<dyn ResponseHandler>>,
    pub(crate) redirect_hops: u32,
}

impl Request {
    fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            payload: None,
            cookies: Vec::new(),
            jar: None,
            request_cookies: true,
            store_cookies: true,
            close: false,
            use_caches: true,
            ignored_statuses: HashSet::new(),
            connect_timeout: None,
            read_timeout: None,
            proxy: None,
            observer: None,
            response_handler: None,
            redirect_hops: 0,
        }
    }

    /// Starts a request with an arbitrary method.
    #[must_use]
    pub fn builder(method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Starts a `GET` request.
    #[must_use]
    pub fn get(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::GET, url)
    }

    /// Starts a `POST` request.
    #[must_use]
    pub fn post(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::POST, url)
    }

    /// Starts a `PUT` request.
    #[must_use]
    pub fn put(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::PUT, url)
    }

    /// Starts a `HEAD` request.
    #[must_use]
    pub fn head(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::HEAD, url)
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Per-request header overrides.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Payload bytes, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Ad-hoc cookies attached to this request.
    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Whether `status` bypasses error recovery and interception.
    #[must_use]
    pub fn ignores_status(&self, status: u16) -> bool {
        self.ignored_statuses.contains(&status)
    }

    /// Redirects followed so far to reach this request.
    #[must_use]
    pub fn redirect_hops(&self) -> u32 {
        self.redirect_hops
    }

    /// Replaces a per-request header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Removes a per-request header.
    pub fn remove_header(&mut self, name: &HeaderName) {
        self.headers.remove(name);
    }

    /// Derives the request that follows a redirect to `location`.
    ///
    /// `switch_to_get` drops the payload and its content headers.
    /// Credentials are dropped when the redirect leaves the origin host.
    pub(crate) fn redirected(&self, location: Url, switch_to_get: bool) -> Self {
        let mut next = self.clone();
        if switch_to_get && next.method != Method::HEAD {
            next.method = Method::GET;
            next.payload = None;
            next.headers.remove(CONTENT_TYPE);
            next.headers.remove(reqwest::header::CONTENT_LENGTH);
        }
        if location.host_str() != self.url.host_str() {
            next.headers.remove(reqwest::header::AUTHORIZATION);
        }
        next.url = location;
        next.redirect_hops += 1;
        next
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("payload_len", &self.payload.as_ref().map(Vec::len))
            .field("cookies", &self.cookies)
            .field("has_jar", &self.jar.is_some())
            .field("request_cookies", &self.request_cookies)
            .field("store_cookies", &self.store_cookies)
            .field("close", &self.close)
            .field("ignored_statuses", &self.ignored_statuses)
            .field("redirect_hops", &self.redirect_hops)
            .finish_non_exhaustive()
    }
}

/// Builds a [`Request`], deferring validation errors to [`build`](Self::build).
#[must_use]
pub struct RequestBuilder {
    request: Result<Request, ExecuteError>,
}

impl RequestBuilder {
    fn new(method: Method, url: &str) -> Self {
        let request = Url::parse(url)
            .ok()
            .filter(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
            .map(|parsed| Request::new(method, parsed))
            .ok_or_else(|| ExecuteError::invalid_url(url));
        Self { request }
    }

    fn map(mut self, apply: impl FnOnce(&mut Request) -> Result<(), ExecuteError>) -> Self {
        if let Ok(request) = self.request.as_mut() {
            if let Err(e) = apply(request) {
                self.request = Err(e);
            }
        }
        self
    }

    /// Adds a header, replacing earlier values of the same name.
    pub fn header(self, name: &str, value: &str) -> Self {
        self.map(|request| {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ExecuteError::invalid_header(name))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| ExecuteError::invalid_header(name))?;
            request.headers.insert(header_name, header_value);
            Ok(())
        })
    }

    /// Sets a raw payload (sent only for `POST` and `PUT`).
    pub fn body(self, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        self.map(|request| {
            request.payload = Some(payload);
            Ok(())
        })
    }

    /// Sets an `application/x-www-form-urlencoded` payload.
    pub fn form(self, fields: &[(&str, &str)]) -> Self {
        let encoded = fields
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        self.body(encoded)
    }

    /// Sets a JSON payload and its content type.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        let serialized = serde_json::to_vec(value);
        self.map(|request| {
            request.payload = Some(serialized?);
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(())
        })
    }

    /// Attaches an ad-hoc cookie.
    pub fn cookie(self, cookie: Cookie) -> Self {
        self.map(|request| {
            request.cookies.push(cookie);
            Ok(())
        })
    }

    /// Uses `jar` instead of the shared jar for storing response cookies,
    /// and as the first cookie source.
    pub fn jar(self, jar: Arc<CookieJar>) -> Self {
        self.map(|request| {
            request.jar = Some(jar);
            Ok(())
        })
    }

    /// Whether the shared jar contributes cookies (default `true`).
    pub fn request_cookies(self, enabled: bool) -> Self {
        self.map(|request| {
            request.request_cookies = enabled;
            Ok(())
        })
    }

    /// Whether response cookies go to the shared jar (default `true`).
    pub fn store_cookies(self, enabled: bool) -> Self {
        self.map(|request| {
            request.store_cookies = enabled;
            Ok(())
        })
    }

    /// Close the response before returning it (default `false`).
    ///
    /// The caller then only gets status and headers.
    pub fn close(self, enabled: bool) -> Self {
        self.map(|request| {
            request.close = enabled;
            Ok(())
        })
    }

    /// Whether intermediate caches may answer (default `true`).
    pub fn use_caches(self, enabled: bool) -> Self {
        self.map(|request| {
            request.use_caches = enabled;
            Ok(())
        })
    }

    /// Exempts `status` from error recovery and interception.
    pub fn ignore_status(self, status: u16) -> Self {
        self.map(|request| {
            request.ignored_statuses.insert(status);
            Ok(())
        })
    }

    /// Overrides the configured connect timeout.
    pub fn connect_timeout(self, timeout: Duration) -> Self {
        self.map(|request| {
            request.connect_timeout = Some(timeout);
            Ok(())
        })
    }

    /// Overrides the configured read timeout.
    pub fn read_timeout(self, timeout: Duration) -> Self {
        self.map(|request| {
            request.read_timeout = Some(timeout);
            Ok(())
        })
    }

    /// Overrides the configured proxy.
    pub fn proxy(self, proxy: &str) -> Self {
        let proxy = proxy.to_string();
        self.map(|request| {
            request.proxy = Some(proxy);
            Ok(())
        })
    }

    /// Installs a connection observer.
    pub fn observer(self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.map(|request| {
            request.observer = Some(observer);
            Ok(())
        })
    }

    /// Installs a response handler with first refusal on classification.
    pub fn response_handler(self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.map(|request| {
            request.response_handler = Some(handler);
            Ok(())
        })
    }

    /// Finishes the request.
    ///
    /// # Errors
    ///
    /// Returns the first invalid URL, header or payload encountered.
    pub fn build(self) -> Result<Request, ExecuteError> {
        self.request
    }
}
