//! Error types for authentication strategies.

use thiserror::Error;

/// Errors raised while computing credentials.
///
/// An error from [`Authentication::authenticate`](super::Authentication::authenticate)
/// means the strategy declines; the 401 response is handed back to the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The challenge lacks a required attribute or is malformed.
    #[error("unusable {scheme} challenge: {reason}")]
    UnusableChallenge {
        /// Scheme the strategy speaks.
        scheme: &'static str,
        /// What is missing or wrong.
        reason: String,
    },

    /// The challenge names a different scheme than the strategy speaks.
    #[error("challenge scheme '{found}' not supported, expected {expected}")]
    UnsupportedScheme {
        /// Scheme the strategy speaks.
        expected: &'static str,
        /// Scheme found in the challenge.
        found: String,
    },

    /// The challenge asks for an unsupported digest algorithm.
    #[error("digest algorithm '{0}' not supported")]
    UnsupportedAlgorithm(String),

    /// The computed header is not a valid header value.
    #[error("computed {scheme} Authorization header is not a valid header value")]
    InvalidHeader {
        /// Scheme the strategy speaks.
        scheme: &'static str,
    },
}

impl AuthError {
    /// Creates an unusable challenge error.
    pub fn unusable(scheme: &'static str, reason: impl Into<String>) -> Self {
        Self::UnusableChallenge {
            scheme,
            reason: reason.into(),
        }
    }

    /// Creates an unsupported scheme error.
    pub fn unsupported_scheme(expected: &'static str, found: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            expected,
            found: found.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_challenge_message() {
        let error = AuthError::unusable("Digest", "missing nonce");
        assert_eq!(error.to_string(), "unusable Digest challenge: missing nonce");
    }

    #[test]
    fn test_unsupported_scheme_message() {
        let error = AuthError::unsupported_scheme("Digest", "Negotiate");
        assert!(error.to_string().contains("Negotiate"));
        assert!(error.to_string().contains("Digest"));
    }
}
