//! The request execution pipeline.
//!
//! One call to [`Request::execute`] runs:
//!
//! 1. proxy and timeout resolution (request overrides config)
//! 2. cookie injection: explicit jar, then ad-hoc cookies, then the shared
//!    jar; later sources win on identical `(domain, name, path)`
//! 3. header merge: config defaults, request overrides win
//! 4. `before_send` observer hook, then transmission
//! 5. error-body recovery for failed exchanges with status >= 400
//! 6. status interception (redirects), bounded by `max_redirects`
//! 7. cookie harvest, `after_receive` hook, response classification

use std::borrow::Cow;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderValue};
use tracing::{debug, instrument, warn};

use super::error::{ExecuteError, TransportError};
use super::request::Request;
use super::response::{Response, classify};
use super::transport::{Exchange, PreparedRequest};
use crate::config::ClientConfig;
use crate::cookie::{Cookie, merge_cookies, render_cookie_header};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

impl Request {
    /// Executes the request, following intercepted statuses.
    ///
    /// Redirects registered in the config's interceptor table are followed
    /// transparently; 401 challenges are returned as
    /// [`ResponseKind::Authenticate`](super::ResponseKind::Authenticate) (see
    /// [`AuthenticatingRequest`](super::AuthenticatingRequest) for retries).
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::Transport`] when the exchange fails without a
    /// recoverable error body, and [`ExecuteError::TooManyRedirects`] when a
    /// redirect chain exceeds the configured limit.
    #[instrument(skip_all, fields(method = %self.method, url = %self.url))]
    pub fn execute(&self, config: &ClientConfig) -> Result<Response, ExecuteError> {
        let mut current = Cow::Borrowed(self);
        loop {
            let (prepared, mut response) = current.exchange(config)?;
            let status = response.status();

            if !current.ignores_status(status) {
                if let Some(interceptor) = config.interceptors().get(status) {
                    if let Some(next) = interceptor.intercept(&current, &response, config)? {
                        response.close();
                        current = Cow::Owned(next);
                        continue;
                    }
                }
            }

            current.harvest_cookies(&response, config);
            if let Some(observer) = &current.observer {
                observer.after_receive(&prepared, status, response.headers());
            }
            if current.close {
                response.close();
            }
            debug!(status, kind = ?response.kind(), "request complete");
            return Ok(response);
        }
    }

    /// Stores the response's cookies in the explicit jar if one was given,
    /// else in the shared jar when storing is enabled.
    pub(crate) fn harvest_cookies(&self, response: &Response, config: &ClientConfig) {
        if let Some(jar) = &self.jar {
            jar.store_response(response.url(), response.headers());
        } else if self.store_cookies {
            config.cookie_jar().store_response(response.url(), response.headers());
        }
    }

    /// Performs one exchange without interception.
    fn exchange(&self, config: &ClientConfig) -> Result<(PreparedRequest, Response), ExecuteError> {
        let prepared = self.prepare(config)?;
        if let Some(observer) = &self.observer {
            observer.before_send(&prepared);
        }

        let exchange = match config.transport().send(&prepared) {
            Ok(exchange) => exchange,
            Err(failure) => self.recover(failure.exchange, failure.error)?,
        };

        let status = exchange.status();
        let kind = self
            .response_handler
            .as_ref()
            .and_then(|handler| handler.classify(status, exchange.headers(), &self.url))
            .unwrap_or_else(|| classify(status, exchange.headers(), &self.url));
        debug!(status, "exchange complete");

        let response = Response::from_exchange(self.method.clone(), self.url.clone(), exchange, kind);
        Ok((prepared, response))
    }

    /// Recovers an error body from a failed exchange, or re-raises.
    fn recover(
        &self,
        exchange: Option<Box<dyn Exchange>>,
        error: TransportError,
    ) -> Result<Box<dyn Exchange>, ExecuteError> {
        match exchange {
            Some(exchange) if exchange.status() >= 400 && !self.ignores_status(exchange.status()) => {
                warn!(status = exchange.status(), reason = %error, "transport failed, reading error body");
                Ok(exchange)
            }
            _ => Err(error.into()),
        }
    }

    /// Applies config defaults, cookies and payload rules.
    fn prepare(&self, config: &ClientConfig) -> Result<PreparedRequest, ExecuteError> {
        let proxy = self.proxy.clone().or_else(|| config.proxy().map(str::to_string));
        let connect_timeout = self.connect_timeout.unwrap_or(config.connect_timeout());
        let read_timeout = self.read_timeout.unwrap_or(config.read_timeout());

        let mut headers = config.default_headers().clone();
        for name in self.headers.keys() {
            headers.remove(name);
            for value in self.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        if let Some(pairs) = render_cookie_header(&self.collect_cookies(config)) {
            let value = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(explicit) => format!("{explicit}; {pairs}"),
                None => pairs,
            };
            let value =
                HeaderValue::from_str(&value).map_err(|_| ExecuteError::invalid_header("cookie"))?;
            headers.insert(COOKIE, value);
        }

        let body = match (&self.method, &self.payload) {
            (&Method::POST | &Method::PUT, Some(payload)) => {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static(FORM_CONTENT_TYPE));
                Some(payload.clone())
            }
            _ => None,
        };

        Ok(PreparedRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            body,
            proxy,
            connect_timeout,
            read_timeout,
            use_caches: self.use_caches,
        })
    }

    fn collect_cookies(&self, config: &ClientConfig) -> Vec<Cookie> {
        let mut cookies = Vec::new();
        if let Some(jar) = &self.jar {
            merge_cookies(&mut cookies, jar.matching(&self.url));
        }
        merge_cookies(&mut cookies, self.cookies.iter().cloned());
        if self.request_cookies {
            merge_cookies(&mut cookies, config.cookie_jar().matching(&self.url));
        }
        cookies
    }
}
