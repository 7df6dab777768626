//! Client defaults (timeouts, redirects, headers).

/// Default connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout (5 minutes for slow endpoints).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default maximum redirects followed per request.
pub const MAX_REDIRECTS: u32 = 10;

/// Default `User-Agent`.
pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Encodings the response body decoder understands.
pub const ACCEPT_ENCODING: &str = "gzip, deflate";
