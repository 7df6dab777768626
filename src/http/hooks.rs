//! Pluggable per-request hooks.

use reqwest::header::HeaderMap;
use url::Url;

use super::response::ResponseKind;
use super::transport::PreparedRequest;

/// Observes a connection around transmission.
///
/// `before_send` is the only externally visible side effect before the
/// request goes out. Both methods default to no-ops.
pub trait ConnectionObserver: Send + Sync {
    /// Called with the fully prepared request right before it is sent.
    fn before_send(&self, _request: &PreparedRequest) {}

    /// Called after the status line and headers were read and cookies stored.
    fn after_receive(&self, _request: &PreparedRequest, _status: u16, _headers: &HeaderMap) {}
}

/// Gets first refusal when a response flavor is chosen.
///
/// Returning `None` falls back to [`classify`](super::classify).
pub trait ResponseHandler: Send + Sync {
    /// Chooses the response flavor, or defers.
    fn classify(&self, status: u16, headers: &HeaderMap, url: &Url) -> Option<ResponseKind>;
}
