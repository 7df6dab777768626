//! Challenge-response retries on top of [`Request::execute`].

use std::fmt;
use std::sync::{Arc, PoisonError};

use tracing::{debug, instrument, warn};

use super::error::ExecuteError;
use super::request::Request;
use super::response::Response;
use crate::auth::{AuthScope, SharedAuthentication};
use crate::config::ClientConfig;

/// Default number of authenticated retries after a 401.
pub const DEFAULT_AUTH_RETRIES: u32 = 1;

/// A request that answers 401 challenges.
///
/// The strategy is the explicit one if given, else the one registered in the
/// config's [`AuthenticationManager`](crate::AuthenticationManager) for the
/// request's host and port, narrowed by the challenge's scheme and realm once
/// a 401 arrives. Without a strategy this is plain execution.
///
/// A challenge that is still unanswered after the retry budget is returned as
/// an [`Authenticate`](super::ResponseKind::Authenticate) response, not as an
/// error.
#[derive(Clone)]
pub struct AuthenticatingRequest {
    request: Request,
    auth: Option<SharedAuthentication>,
    retry: u32,
}

impl AuthenticatingRequest {
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            auth: None,
            retry: DEFAULT_AUTH_RETRIES,
        }
    }

    /// Uses `auth` instead of looking one up.
    #[must_use]
    pub fn with_authentication(mut self, auth: SharedAuthentication) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Maximum authenticated retries.
    #[must_use]
    pub fn retry_limit(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Executes, retrying with credentials while the server challenges.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Request::execute`] returns. Authentication failures
    /// are not errors.
    #[instrument(skip_all, fields(url = %self.request.url(), retry = self.retry))]
    pub fn execute(&self, config: &ClientConfig) -> Result<Response, ExecuteError> {
        let auth = self.auth.clone().or_else(|| {
            AuthScope::for_url(self.request.url())
                .and_then(|scope| config.auth_manager().find(&scope))
        });
        let Some(mut auth) = auth else {
            debug!("no authentication registered, executing plainly");
            return self.request.execute(config);
        };

        let mut request = self.request.clone();
        {
            let mut strategy = auth.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = strategy.setup(&mut request) {
                warn!(error = %e, "authentication setup failed, sending without credentials");
            }
        }

        let mut response = request.execute(config)?;
        let mut attempts = 0;
        while response.is_authenticate() && attempts < self.retry {
            if self.auth.is_none() {
                match self.registered_for_challenge(&response, config) {
                    Some(matched) => {
                        if !Arc::ptr_eq(&matched, &auth) {
                            debug!("switching to the strategy registered for the challenge realm");
                            auth = matched;
                        }
                    }
                    None => {
                        debug!("no strategy registered for the challenge realm");
                        break;
                    }
                }
            }
            {
                let mut strategy = auth.lock().unwrap_or_else(PoisonError::into_inner);
                if !strategy.authenticate_supported() {
                    break;
                }
                strategy.reset();
                if let Err(e) = strategy.authenticate(&mut request, &response) {
                    warn!(scheme = strategy.scheme(), error = %e, "declining challenge");
                    break;
                }
            }
            attempts += 1;
            debug!(attempt = attempts, "retrying with credentials");
            response.close();
            response = request.execute(config)?;
        }
        Ok(response)
    }

    /// Manager lookup narrowed by the challenge's scheme and realm.
    fn registered_for_challenge(
        &self,
        response: &Response,
        config: &ClientConfig,
    ) -> Option<SharedAuthentication> {
        let challenge = response.challenge()?;
        let scope = AuthScope::for_challenge(self.request.url(), challenge)?;
        config.auth_manager().find(&scope)
    }
}

impl fmt::Debug for AuthenticatingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatingRequest")
            .field("request", &self.request)
            .field("has_authentication", &self.auth.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::auth::{AuthError, Authentication, DigestAuthentication};
    use crate::http::transport::mock::{MockExchange, ScriptedTransport};

    const CHALLENGE: &str = r#"Digest realm="r", nonce="n1", qop="auth""#;

    fn config_with(transport: Arc<ScriptedTransport>) -> ClientConfig {
        ClientConfig::builder().transport(transport).build().unwrap()
    }

    /// Digest wrapper that counts resets.
    struct CountingDigest {
        inner: DigestAuthentication,
        resets: Arc<AtomicUsize>,
    }

    impl Authentication for CountingDigest {
        fn scheme(&self) -> &'static str {
            self.inner.scheme()
        }

        fn setup(&mut self, request: &mut Request) -> Result<(), AuthError> {
            self.inner.setup(request)
        }

        fn authenticate(&mut self, request: &mut Request, response: &Response) -> Result<(), AuthError> {
            self.inner.authenticate(request, response)
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.inner.reset();
        }
    }

    #[test]
    fn test_digest_challenge_then_success() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", CHALLENGE))
                .reply(MockExchange::new(200).body("secret")),
        );
        let config = config_with(Arc::clone(&transport));
        let resets = Arc::new(AtomicUsize::new(0));
        let auth: SharedAuthentication = Arc::new(Mutex::new(CountingDigest {
            inner: DigestAuthentication::new("u", "p"),
            resets: Arc::clone(&resets),
        }));

        let mut response = AuthenticatingRequest::new(Request::get("http://host/private").build().unwrap())
            .with_authentication(auth)
            .retry_limit(1)
            .execute(&config)
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(!response.is_authenticate());
        assert_eq!(response.text().unwrap(), "secret");
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        let sent = transport.sent();
        assert!(sent[0].headers.get("authorization").is_none());
        let header = sent[1].headers.get("authorization").unwrap().to_str().unwrap();
        assert!(header.starts_with("Digest username=\"u\""), "{header}");
        assert!(header.contains("nc=00000001"));
    }

    #[test]
    fn test_cached_nonce_skips_challenge_on_next_request() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", CHALLENGE))
                .reply(MockExchange::new(200))
                .reply(MockExchange::new(200)),
        );
        let config = config_with(Arc::clone(&transport));
        config
            .auth_manager()
            .register(AuthScope::new("host"), DigestAuthentication::new("u", "p"));

        for _ in 0..2 {
            let response = AuthenticatingRequest::new(Request::get("http://host/a").build().unwrap())
                .execute(&config)
                .unwrap();
            assert_eq!(response.status(), 200);
        }

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        let third = sent[2].headers.get("authorization").unwrap().to_str().unwrap();
        assert!(third.contains("nc=00000002"), "{third}");
    }

    #[test]
    fn test_exhausted_retries_return_challenge() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", CHALLENGE))
                .reply(MockExchange::new(401).header("www-authenticate", CHALLENGE)),
        );
        let config = config_with(Arc::clone(&transport));
        let auth: SharedAuthentication = Arc::new(Mutex::new(DigestAuthentication::new("u", "bad")));

        let response = AuthenticatingRequest::new(Request::get("http://host/").build().unwrap())
            .with_authentication(auth)
            .execute(&config)
            .unwrap();

        assert!(response.is_authenticate());
        assert_eq!(response.challenge(), Some(CHALLENGE));
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_unusable_challenge_returns_401_without_retry() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", r#"Digest realm="r""#)),
        );
        let config = config_with(Arc::clone(&transport));
        let auth: SharedAuthentication = Arc::new(Mutex::new(DigestAuthentication::new("u", "p")));

        let response = AuthenticatingRequest::new(Request::get("http://host/").build().unwrap())
            .with_authentication(auth)
            .execute(&config)
            .unwrap();
        assert!(response.is_authenticate());
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_challenge_realm_selects_registered_strategy() {
        let guests_challenge = r#"Digest realm="guests", nonce="n2", qop="auth""#;
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", guests_challenge))
                .reply(MockExchange::new(200)),
        );
        let config = config_with(Arc::clone(&transport));
        config.auth_manager().register(
            AuthScope::new("host").with_realm("staff"),
            DigestAuthentication::new("staff-user", "p1"),
        );
        config.auth_manager().register(
            AuthScope::new("host").with_realm("guests"),
            DigestAuthentication::new("guest-user", "p2"),
        );

        let response = AuthenticatingRequest::new(Request::get("http://host/").build().unwrap())
            .execute(&config)
            .unwrap();

        assert_eq!(response.status(), 200);
        let sent = transport.sent();
        let header = sent[1].headers.get("authorization").unwrap().to_str().unwrap();
        assert!(header.starts_with("Digest username=\"guest-user\""), "{header}");
        assert!(header.contains("realm=\"guests\""), "{header}");
    }

    #[test]
    fn test_challenge_realm_without_registration_returns_401() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", CHALLENGE)),
        );
        let config = config_with(Arc::clone(&transport));
        config.auth_manager().register(
            AuthScope::new("host").with_realm("elsewhere"),
            DigestAuthentication::new("u", "p"),
        );

        let response = AuthenticatingRequest::new(Request::get("http://host/").build().unwrap())
            .execute(&config)
            .unwrap();
        assert!(response.is_authenticate());
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_without_strategy_executes_plainly() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(MockExchange::new(401).header("www-authenticate", CHALLENGE)),
        );
        let config = config_with(Arc::clone(&transport));
        let response = AuthenticatingRequest::new(Request::get("http://other/").build().unwrap())
            .execute(&config)
            .unwrap();
        assert!(response.is_authenticate());
        assert_eq!(transport.sent().len(), 1);
    }
}
