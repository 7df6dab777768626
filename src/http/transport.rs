//! Transport abstraction the executor drives.
//!
//! A [`Transport`] sends one fully prepared request and hands back an
//! [`Exchange`]: the status line and headers already read, the body still on
//! the wire. The executor never follows redirects or decodes content through
//! the transport; both happen above it.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use url::Url;

use super::error::TransportError;

/// A request with every cross-cutting concern already applied.
///
/// This is what observers see before transmission.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Final header set, `Cookie` included.
    pub headers: HeaderMap,
    /// Fixed-length payload, only for methods that carry one.
    pub body: Option<Vec<u8>>,
    /// Proxy URL, if any.
    pub proxy: Option<String>,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Read timeout.
    pub read_timeout: Duration,
    /// Whether intermediate caches may answer.
    pub use_caches: bool,
}

/// One completed request/response exchange on an open connection.
pub trait Exchange: Send {
    /// HTTP status code.
    fn status(&self) -> u16;

    /// Response headers.
    fn headers(&self) -> &HeaderMap;

    /// Takes the raw (still encoded) body stream. Returns `None` once taken.
    fn take_body(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Releases the underlying connection.
    fn disconnect(&mut self);
}

/// Connect/send/receive primitive.
pub trait Transport: Send + Sync {
    /// Sends `request` and reads the status line and headers.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportFailure`]. When the failure happened after the
    /// status line was read, the failure carries the exchange so the caller
    /// can still inspect the status and read an error body.
    fn send(&self, request: &PreparedRequest) -> Result<Box<dyn Exchange>, TransportFailure>;
}

/// A failed send, optionally with the partially completed exchange.
pub struct TransportFailure {
    /// What went wrong.
    pub error: TransportError,
    /// The exchange, when a status line was received before the failure.
    pub exchange: Option<Box<dyn Exchange>>,
}

impl TransportFailure {
    /// A failure with no usable exchange.
    #[must_use]
    pub fn new(error: TransportError) -> Self {
        Self {
            error,
            exchange: None,
        }
    }

    /// A failure that still carries a readable exchange.
    #[must_use]
    pub fn with_exchange(error: TransportError, exchange: Box<dyn Exchange>) -> Self {
        Self {
            error,
            exchange: Some(exchange),
        }
    }
}

impl From<TransportError> for TransportFailure {
    fn from(error: TransportError) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportFailure")
            .field("error", &self.error)
            .field("status", &self.exchange.as_ref().map(|e| e.status()))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory transport for unit tests.

    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use reqwest::header::{HeaderName, HeaderValue};

    use super::*;

    /// Canned exchange.
    pub(crate) struct MockExchange {
        status: u16,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
        disconnected: Arc<AtomicBool>,
    }

    impl MockExchange {
        pub(crate) fn new(status: u16) -> Self {
            Self {
                status,
                headers: HeaderMap::new(),
                body: Some(Vec::new()),
                disconnected: Arc::new(AtomicBool::new(false)),
            }
        }

        pub(crate) fn header(mut self, name: &'static str, value: &str) -> Self {
            self.headers.append(
                HeaderName::from_static(name),
                HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("")),
            );
            self
        }

        pub(crate) fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
            self.body = Some(body.into());
            self
        }

        pub(crate) fn disconnect_flag(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.disconnected)
        }
    }

    impl Exchange for MockExchange {
        fn status(&self) -> u16 {
            self.status
        }

        fn headers(&self) -> &HeaderMap {
            &self.headers
        }

        fn take_body(&mut self) -> Option<Box<dyn Read + Send>> {
            self.body
                .take()
                .map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>)
        }

        fn disconnect(&mut self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) enum Scripted {
        Reply(MockExchange),
        Fail(TransportFailure),
    }

    /// Replays scripted outcomes in order and records what was sent.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        sent: Mutex<Vec<PreparedRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(self, exchange: MockExchange) -> Self {
            self.push(Scripted::Reply(exchange));
            self
        }

        pub(crate) fn fail(self, failure: TransportFailure) -> Self {
            self.push(Scripted::Fail(failure));
            self
        }

        fn push(&self, step: Scripted) {
            self.script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push_back(step);
        }

        pub(crate) fn sent(&self) -> Vec<PreparedRequest> {
            self.sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &PreparedRequest) -> Result<Box<dyn Exchange>, TransportFailure> {
            self.sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(request.clone());
            let step = self
                .script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front();
            match step {
                Some(Scripted::Reply(exchange)) => Ok(Box::new(exchange)),
                Some(Scripted::Fail(failure)) => Err(failure),
                None => Err(TransportFailure::new(TransportError::io(
                    request.url.as_str(),
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "script exhausted"),
                ))),
            }
        }
    }
}
