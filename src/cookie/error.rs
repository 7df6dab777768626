//! Error types for the cookie module.

use thiserror::Error;

/// Errors raised while parsing, storing or persisting cookies.
///
/// Messages carry the cookie name at most, never the value.
#[derive(Debug, Error)]
pub enum CookieError {
    /// The leading `name=value` pair of a `Set-Cookie` line has no `=`.
    #[error("malformed cookie: expected name=value pair, got '{fragment}'")]
    MissingNameValue {
        /// The part before the first `;`, truncated to the name.
        fragment: String,
    },

    /// The cookie name is empty.
    #[error("malformed cookie: empty name")]
    EmptyName,

    /// The `Domain` attribute does not cover the host the cookie came from.
    #[error("cookie '{name}' rejected: domain {domain} does not match host {host}")]
    DomainMismatch {
        /// Cookie name.
        name: String,
        /// Normalized `Domain` attribute.
        domain: String,
        /// Request host.
        host: String,
    },

    /// The request URL has no host to default the cookie domain from.
    #[error("cannot derive cookie domain from URL without host: {url}")]
    MissingHost {
        /// The offending URL.
        url: String,
    },

    /// I/O error reading or writing a persisted jar.
    #[error("cookie jar I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted jar could not be (de)serialized.
    #[error("cookie jar serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CookieError {
    /// Creates a missing `=` error, keeping only the text before any `=`-less value.
    pub fn missing_name_value(fragment: &str) -> Self {
        let fragment: String = fragment.trim().chars().take(64).collect();
        Self::MissingNameValue { fragment }
    }

    /// Creates a domain mismatch error.
    pub fn domain_mismatch(
        name: impl Into<String>,
        domain: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self::DomainMismatch {
            name: name.into(),
            domain: domain.into(),
            host: host.into(),
        }
    }

    /// Creates a missing host error.
    pub fn missing_host(url: impl Into<String>) -> Self {
        Self::MissingHost { url: url.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_name_value_truncates_fragment() {
        let long = "x".repeat(200);
        let error = CookieError::missing_name_value(&long);
        let msg = error.to_string();
        assert!(msg.contains("expected name=value"), "got: {msg}");
        assert!(msg.len() < 150, "fragment should be truncated: {msg}");
    }

    #[test]
    fn test_domain_mismatch_display() {
        let error = CookieError::domain_mismatch("sid", "evil.com", "www.example.com");
        let msg = error.to_string();
        assert!(msg.contains("sid"));
        assert!(msg.contains("evil.com"));
        assert!(msg.contains("www.example.com"));
    }
}
