//! HTTP Basic authentication.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use zeroize::Zeroizing;

use super::{AuthError, Authentication, SecretString, authorization_value, challenge_scheme};
use crate::http::{Request, Response};

const SCHEME: &str = "Basic";

/// Sends `Authorization: Basic base64(user:pass)`.
///
/// Without [`preemptive`](Self::preemptive) the header is only attached after
/// a `Basic` challenge; afterwards `setup` keeps attaching it until `reset`.
#[derive(Debug)]
pub struct BasicAuthentication {
    username: String,
    password: SecretString,
    preemptive: bool,
    challenged: bool,
}

impl BasicAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            preemptive: false,
            challenged: false,
        }
    }

    /// Attach credentials on the first attempt, before any challenge.
    #[must_use]
    pub fn preemptive(mut self, enabled: bool) -> Self {
        self.preemptive = enabled;
        self
    }

    fn attach(&self, request: &mut Request) -> Result<(), AuthError> {
        let credentials = Zeroizing::new(format!("{}:{}", self.username, self.password.expose()));
        let token = Zeroizing::new(STANDARD.encode(credentials.as_bytes()));
        let header = Zeroizing::new(format!("{SCHEME} {}", token.as_str()));
        let value = authorization_value(SCHEME, &header)?;
        request.set_header(reqwest::header::AUTHORIZATION, value);
        Ok(())
    }
}

impl Authentication for BasicAuthentication {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn setup(&mut self, request: &mut Request) -> Result<(), AuthError> {
        if self.preemptive || self.challenged {
            self.attach(request)?;
        }
        Ok(())
    }

    fn authenticate(&mut self, request: &mut Request, response: &Response) -> Result<(), AuthError> {
        let challenge = response.challenge().unwrap_or_default();
        let (scheme, _) = challenge_scheme(challenge);
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(AuthError::unsupported_scheme(SCHEME, scheme));
        }
        debug!("answering basic challenge");
        self.challenged = true;
        self.attach(request)
    }

    fn reset(&mut self) {
        self.challenged = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_preemptive_setup_attaches_header() {
        let mut auth = BasicAuthentication::new("Aladdin", "open sesame").preemptive(true);
        let mut request = Request::get("http://example.com/").build().unwrap();
        auth.setup(&mut request).unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn test_setup_without_challenge_does_nothing() {
        let mut auth = BasicAuthentication::new("a", "b");
        let mut request = Request::get("http://example.com/").build().unwrap();
        auth.setup(&mut request).unwrap();
        assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_header_is_marked_sensitive() {
        let mut auth = BasicAuthentication::new("a", "b").preemptive(true);
        let mut request = Request::get("http://example.com/").build().unwrap();
        auth.setup(&mut request).unwrap();
        assert!(
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .unwrap()
                .is_sensitive()
        );
    }
}
