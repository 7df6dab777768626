//! Typed responses.
//!
//! Every completed exchange becomes exactly one [`Response`] whose
//! [`ResponseKind`] is chosen from the status code. The body is exposed
//! decoded; the connection behind it stays open until [`Response::close`]
//! runs or the response is dropped.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::mem;

use flate2::bufread::{GzDecoder, ZlibDecoder};
use reqwest::Method;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, LOCATION, WWW_AUTHENTICATE};
use tracing::{debug, trace};
use url::Url;

use super::transport::Exchange;

/// Which flavor of response an exchange produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Terminal response, successful or not.
    Plain,
    /// A 3xx carrying a usable `Location`.
    Redirect {
        /// Absolute redirect target.
        location: Url,
    },
    /// A 401 challenge.
    Authenticate {
        /// The first `WWW-Authenticate` value (empty if the server sent none).
        challenge: String,
    },
}

/// Content coding applied to a body on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
    Gzip,
    Deflate,
}

impl Coding {
    fn from_header(value: Option<&str>) -> Option<Self> {
        match value {
            Some("gzip" | "x-gzip") => Some(Self::Gzip),
            Some("deflate") => Some(Self::Deflate),
            _ => None,
        }
    }
}

enum BodyState {
    /// Encoded body whose first bytes have not been looked at yet.
    Pending(BufReader<Box<dyn Read + Send>>, Coding),
    Streaming(Box<dyn Read + Send>),
}

/// Decoded response body stream.
///
/// The decoder is attached on first read, and only when the body has bytes:
/// a 204 or 304 that still carries `Content-Encoding` reads as empty.
///
/// [`close`](Self::close) is deliberately a no-op: the transport may still
/// need the stream for connection reuse. The connection is released by
/// [`Response::close`].
pub struct ResponseBody {
    state: BodyState,
}

impl ResponseBody {
    fn decoded(raw: Box<dyn Read + Send>, content_encoding: Option<&str>) -> Self {
        let state = match Coding::from_header(content_encoding) {
            Some(coding) => BodyState::Pending(BufReader::new(raw), coding),
            None => BodyState::Streaming(raw),
        };
        Self { state }
    }

    /// Soft close. Does not release the connection.
    pub fn close(&mut self) {
        trace!("ignoring soft close of response body");
    }

    fn start_decoding(&mut self) -> io::Result<()> {
        let BodyState::Pending(reader, _) = &mut self.state else {
            return Ok(());
        };
        let empty = reader.fill_buf()?.is_empty();
        let pending = mem::replace(&mut self.state, BodyState::Streaming(Box::new(io::empty())));
        if let BodyState::Pending(reader, coding) = pending {
            if empty {
                trace!(?coding, "encoded body is empty, skipping decoder");
            } else {
                self.state = BodyState::Streaming(match coding {
                    Coding::Gzip => Box::new(GzDecoder::new(reader)),
                    Coding::Deflate => Box::new(ZlibDecoder::new(reader)),
                });
            }
        }
        Ok(())
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.start_decoding()?;
        match &mut self.state {
            BodyState::Streaming(inner) => inner.read(buf),
            BodyState::Pending(..) => Ok(0),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

/// A completed response.
pub struct Response {
    status: u16,
    method: Method,
    url: Url,
    headers: HeaderMap,
    charset: Option<String>,
    kind: ResponseKind,
    body: Option<ResponseBody>,
    exchange: Option<Box<dyn Exchange>>,
}

impl Response {
    /// Wraps an exchange. `HEAD` requests never get a body.
    pub(crate) fn from_exchange(
        method: Method,
        url: Url,
        mut exchange: Box<dyn Exchange>,
        kind: ResponseKind,
    ) -> Self {
        let status = exchange.status();
        let headers = exchange.headers().clone();
        let charset = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_from_content_type);

        let body = if method == Method::HEAD {
            None
        } else {
            let encoding = headers
                .get(CONTENT_ENCODING)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_ascii_lowercase());
            exchange
                .take_body()
                .map(|raw| ResponseBody::decoded(raw, encoding.as_deref()))
        };

        Self {
            status,
            method,
            url,
            headers,
            charset,
            kind,
            body,
            exchange: Some(exchange),
        }
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Method of the request that produced this response.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URL that produced this response (the final one after redirects).
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of header `name`, if present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// `charset` parameter of `Content-Type`, if any.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Response flavor.
    #[must_use]
    pub fn kind(&self) -> &ResponseKind {
        &self.kind
    }

    /// Whether this is a redirect response.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, ResponseKind::Redirect { .. })
    }

    /// Whether this is an authentication challenge.
    #[must_use]
    pub fn is_authenticate(&self) -> bool {
        matches!(self.kind, ResponseKind::Authenticate { .. })
    }

    /// Redirect target, for redirect responses.
    #[must_use]
    pub fn location(&self) -> Option<&Url> {
        match &self.kind {
            ResponseKind::Redirect { location } => Some(location),
            _ => None,
        }
    }

    /// Challenge header, for authentication responses.
    #[must_use]
    pub fn challenge(&self) -> Option<&str> {
        match &self.kind {
            ResponseKind::Authenticate { challenge } => Some(challenge.as_str()),
            _ => None,
        }
    }

    /// Decoded body stream. `None` for `HEAD` or after [`close`](Self::close).
    pub fn body_mut(&mut self) -> Option<&mut ResponseBody> {
        self.body.as_mut()
    }

    /// Whether a body stream is still attached.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Reads the remaining decoded body.
    ///
    /// # Errors
    ///
    /// Returns any I/O or decoding error from the body stream.
    pub fn read_to_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        if let Some(body) = self.body.as_mut() {
            body.read_to_end(&mut bytes)?;
        }
        Ok(bytes)
    }

    /// Reads the remaining decoded body as text (invalid UTF-8 replaced).
    ///
    /// # Errors
    ///
    /// Returns any I/O or decoding error from the body stream.
    pub fn text(&mut self) -> io::Result<String> {
        let bytes = self.read_to_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Releases the body stream and the connection. Idempotent.
    pub fn close(&mut self) {
        self.body = None;
        if let Some(mut exchange) = self.exchange.take() {
            exchange.disconnect();
            debug!(status = self.status, url = %self.url, "response closed");
        }
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.exchange.is_none()
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("kind", &self.kind)
            .field("charset", &self.charset)
            .field("has_body", &self.body.is_some())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Picks the response flavor from the status code alone.
///
/// 3xx with a resolvable `Location` is a redirect, 401 is a challenge,
/// everything else is plain.
#[must_use]
pub fn classify(status: u16, headers: &HeaderMap, url: &Url) -> ResponseKind {
    match status {
        300..=399 => headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| url.join(location.trim()).ok())
            .map_or(ResponseKind::Plain, |location| ResponseKind::Redirect { location }),
        401 => ResponseKind::Authenticate {
            challenge: headers
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        },
        _ => ResponseKind::Plain,
    }
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}
