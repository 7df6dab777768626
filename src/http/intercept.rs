//! Status-code interception.
//!
//! An [`InterceptorTable`] maps status codes to handlers that may replace the
//! current exchange with a new request. The table belongs to a
//! [`ClientConfig`]; the default one follows 301 and 302.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;

use super::error::ExecuteError;
use super::request::Request;
use super::response::Response;
use crate::config::ClientConfig;

/// Turns a response into a follow-up request, or lets it through.
pub trait StatusInterceptor: Send + Sync {
    /// Returns the request to run instead of returning `response`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError`] to abort the whole execution.
    fn intercept(
        &self,
        request: &Request,
        response: &Response,
        config: &ClientConfig,
    ) -> Result<Option<Request>, ExecuteError>;
}

/// Follows redirects.
///
/// Stores the redirect response's cookies before following so that
/// session cookies set on a login redirect reach the target. `POST`/`PUT`
/// become `GET` on 301/302, every method but `HEAD` does on 303.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectInterceptor;

impl StatusInterceptor for RedirectInterceptor {
    fn intercept(
        &self,
        request: &Request,
        response: &Response,
        config: &ClientConfig,
    ) -> Result<Option<Request>, ExecuteError> {
        let Some(location) = response.location() else {
            return Ok(None);
        };

        let limit = config.max_redirects();
        if request.redirect_hops() >= limit {
            return Err(ExecuteError::too_many_redirects(request.url().as_str(), limit));
        }

        request.harvest_cookies(response, config);

        let switch_to_get = match response.status() {
            303 => true,
            301 | 302 => matches!(*request.method(), Method::POST | Method::PUT),
            _ => false,
        };
        debug!(
            status = response.status(),
            from = %request.url(),
            to = %location,
            hop = request.redirect_hops() + 1,
            "following redirect"
        );
        Ok(Some(request.redirected(location.clone(), switch_to_get)))
    }
}

/// Status code to interceptor table.
#[derive(Clone, Default)]
pub struct InterceptorTable {
    handlers: HashMap<u16, Arc<dyn StatusInterceptor>>,
}

impl InterceptorTable {
    /// A table with no interceptors (redirects are returned to the caller).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A table that follows 301 and 302.
    #[must_use]
    pub fn with_redirects() -> Self {
        let redirect: Arc<dyn StatusInterceptor> = Arc::new(RedirectInterceptor);
        let mut table = Self::empty();
        table.register(301, Arc::clone(&redirect));
        table.register(302, redirect);
        table
    }

    /// Registers `handler` for `status`, replacing any previous one.
    pub fn register(&mut self, status: u16, handler: Arc<dyn StatusInterceptor>) {
        self.handlers.insert(status, handler);
    }

    /// Removes the handler for `status`.
    pub fn unregister(&mut self, status: u16) {
        self.handlers.remove(&status);
    }

    /// Handler registered for `status`.
    #[must_use]
    pub fn get(&self, status: u16) -> Option<&Arc<dyn StatusInterceptor>> {
        self.handlers.get(&status)
    }

    /// Whether a handler is registered for `status`.
    #[must_use]
    pub fn contains(&self, status: u16) -> bool {
        self.handlers.contains_key(&status)
    }
}

impl fmt::Debug for InterceptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut statuses: Vec<_> = self.handlers.keys().collect();
        statuses.sort();
        f.debug_struct("InterceptorTable")
            .field("statuses", &statuses)
            .finish()
    }
}
