//! Error types for request execution.
//!
//! Authentication failure is not an error: a caller that still receives a
//! 401 response after the retry budget is spent decides what that means.

use thiserror::Error;

/// Failures of the connect/send/receive primitive.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connect or read timed out.
    #[error("timeout talking to {url}")]
    Timeout {
        /// Target URL.
        url: String,
    },

    /// Connection refused, DNS failure, TLS failure and similar.
    #[error("network error talking to {url}: {source}")]
    Network {
        /// Target URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The configured proxy could not be used.
    #[error("invalid proxy {proxy}: {source}")]
    InvalidProxy {
        /// Proxy URL as configured.
        proxy: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an error status (>= 400).
    #[error("HTTP {status} from {url}")]
    Status {
        /// Target URL.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// Raw I/O failure.
    #[error("I/O error talking to {url}: {source}")]
    Io {
        /// Target URL.
        url: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Classifies a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an I/O error.
    pub fn io(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            url: url.into(),
            source,
        }
    }

    /// Creates an error-status failure.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid proxy error.
    pub fn invalid_proxy(proxy: impl Into<String>, source: reqwest::Error) -> Self {
        Self::InvalidProxy {
            proxy: proxy.into(),
            source,
        }
    }
}

/// Errors returned by [`Request::execute`](super::Request::execute).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The request URL could not be parsed or is not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
    },

    /// A header name or value is not valid HTTP.
    #[error("invalid header: {name}")]
    InvalidHeader {
        /// Header name (values are never included).
        name: String,
    },

    /// JSON payload serialization failed.
    #[error("failed to serialize JSON payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The transport failed and no error body could be recovered.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A redirect chain exceeded the configured hop limit.
    #[error("too many redirects ({limit}) following {url}")]
    TooManyRedirects {
        /// The URL that answered with the redirect over the limit.
        url: String,
        /// Configured maximum.
        limit: u32,
    },
}

impl ExecuteError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid header error.
    pub fn invalid_header(name: impl Into<String>) -> Self {
        Self::InvalidHeader { name: name.into() }
    }

    /// Creates a redirect-limit error.
    pub fn too_many_redirects(url: impl Into<String>, limit: u32) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_io_display() {
        let error = TransportError::io(
            "http://example.com/",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        );
        let msg = error.to_string();
        assert!(msg.contains("http://example.com/"), "got: {msg}");
        assert!(msg.contains("reset"), "got: {msg}");
    }

    #[test]
    fn test_status_display() {
        let error = TransportError::status("http://example.com/missing", 404);
        assert_eq!(error.to_string(), "HTTP 404 from http://example.com/missing");
    }

    #[test]
    fn test_too_many_redirects_display() {
        let error = ExecuteError::too_many_redirects("http://example.com/loop", 10);
        let msg = error.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("/loop"));
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let error: ExecuteError = TransportError::Timeout {
            url: "http://slow.example.com/".to_string(),
        }
        .into();
        assert_eq!(error.to_string(), "timeout talking to http://slow.example.com/");
    }
}
