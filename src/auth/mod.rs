//! Pluggable request authentication.
//!
//! An [`Authentication`] strategy attaches credentials to a [`Request`],
//! either up front ([`setup`](Authentication::setup)) or in answer to a 401
//! challenge ([`authenticate`](Authentication::authenticate)). Strategies are
//! registered per [`AuthScope`] in an [`AuthenticationManager`] and driven by
//! [`AuthenticatingRequest`](crate::AuthenticatingRequest).

mod basic;
mod digest;
mod error;
mod manager;
mod scope;
mod secret;

use std::sync::{Arc, Mutex};

use reqwest::header::HeaderValue;

pub use basic::BasicAuthentication;
pub use digest::{DigestAlgorithm, DigestAuthentication, DigestInput, compute_response, format_nc};
pub use error::AuthError;
pub use manager::AuthenticationManager;
pub use scope::AuthScope;
pub use secret::SecretString;

use crate::http::{Request, Response};

/// A stateful credential strategy for one scope.
///
/// Implementations keep credentials for their whole life; [`reset`](Self::reset)
/// only clears single-use protocol state such as a cached nonce.
pub trait Authentication: Send {
    /// Scheme name, e.g. `Digest`.
    fn scheme(&self) -> &'static str;

    /// Called before the first attempt. May attach credentials from cached
    /// protocol state.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the cached state cannot produce a header.
    fn setup(&mut self, _request: &mut Request) -> Result<(), AuthError> {
        Ok(())
    }

    /// Whether this strategy can answer challenges at all.
    fn authenticate_supported(&self) -> bool {
        true
    }

    /// Computes credentials for `request` from the challenge in `response`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the challenge is unusable; the caller then
    /// stops retrying.
    fn authenticate(&mut self, request: &mut Request, response: &Response) -> Result<(), AuthError>;

    /// Clears protocol state, never credentials.
    fn reset(&mut self);
}

/// A strategy shared between the registry and in-flight requests.
pub type SharedAuthentication = Arc<Mutex<dyn Authentication>>;

/// Splits a challenge into its scheme token and the parameter list.
pub(crate) fn challenge_scheme(challenge: &str) -> (&str, &str) {
    let challenge = challenge.trim_start();
    challenge
        .split_once(char::is_whitespace)
        .unwrap_or((challenge, ""))
}

/// Builds a sensitive `Authorization` value.
pub(crate) fn authorization_value(scheme: &'static str, value: &str) -> Result<HeaderValue, AuthError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeader { scheme })?;
    header.set_sensitive(true);
    Ok(header)
}
