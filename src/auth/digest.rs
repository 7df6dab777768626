//! HTTP Digest access authentication (RFC 2617, RFC 2069 fallback).
//!
//! The strategy is a two-call state machine:
//!
//! - [`authenticate`](Authentication::authenticate) parses a fresh
//!   challenge, restarts the nonce count at 1 and attaches credentials.
//! - [`setup`](Authentication::setup) reuses the cached nonce before a
//!   request is sent, bumping the nonce count, so later requests to the same
//!   realm skip the 401 round trip.

use std::collections::HashMap;
use std::fmt::Write as _;

use md5::{Digest, Md5};
use rand::Rng;
use tracing::{debug, trace};
use url::Position;
use zeroize::Zeroizing;

use super::{AuthError, Authentication, SecretString, authorization_value, challenge_scheme};
use crate::http::{Request, Response};

const SCHEME: &str = "Digest";

/// Hash variant requested by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// `MD5` (also assumed when the challenge omits `algorithm`).
    #[default]
    Md5,
    /// `MD5-sess`: the first hash also covers the nonces.
    Md5Sess,
}

impl DigestAlgorithm {
    fn parse(value: Option<&str>) -> Result<Self, AuthError> {
        match value {
            None => Ok(Self::Md5),
            Some(v) if v.eq_ignore_ascii_case("MD5") => Ok(Self::Md5),
            Some(v) if v.eq_ignore_ascii_case("MD5-sess") => Ok(Self::Md5Sess),
            Some(other) => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
        }
    }
}

/// Everything the response hash depends on.
#[derive(Debug, Clone, Copy)]
pub struct DigestInput<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub password: &'a str,
    pub nonce: &'a str,
    pub nc: u32,
    pub cnonce: &'a str,
    /// `None` selects the RFC 2069 computation (no nc/cnonce).
    pub qop: Option<&'a str>,
    pub method: &'a str,
    pub uri: &'a str,
    pub algorithm: DigestAlgorithm,
    /// Hash the credentials as UTF-8 instead of US-ASCII.
    pub utf8: bool,
}

/// Computes the `response` value: 32 lowercase hex digits.
///
/// `MD5(HA1 : nonce : nc : cnonce : qop : MD5(method:uri))` with
/// `HA1 = MD5(user:realm:pass)`, or `MD5(HA1:nonce:HA2)` without qop.
#[must_use]
pub fn compute_response(input: &DigestInput<'_>) -> String {
    let credentials = Zeroizing::new(format!(
        "{}:{}:{}",
        input.username, input.realm, input.password
    ));
    let mut ha1 = md5_hex(&encode(&credentials, input.utf8));
    if input.algorithm == DigestAlgorithm::Md5Sess {
        ha1 = md5_hex(format!("{ha1}:{}:{}", input.nonce, input.cnonce).as_bytes());
    }
    let ha2 = md5_hex(format!("{}:{}", input.method, input.uri).as_bytes());

    let material = match input.qop {
        Some(qop) => format!(
            "{ha1}:{}:{}:{}:{qop}:{ha2}",
            input.nonce,
            format_nc(input.nc),
            input.cnonce
        ),
        None => format!("{ha1}:{}:{ha2}", input.nonce),
    };
    md5_hex(material.as_bytes())
}

/// Nonce count as exactly 8 zero-padded lowercase hex digits.
#[must_use]
pub fn format_nc(nc: u32) -> String {
    format!("{nc:08x}")
}

fn md5_hex(bytes: &[u8]) -> String {
    to_hex(&Md5::digest(bytes))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// US-ASCII encoding replaces every non-ASCII character with `?`.
fn encode(text: &str, utf8: bool) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(if utf8 {
        text.as_bytes().to_vec()
    } else {
        text.chars()
            .map(|c| u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(b'?'))
            .collect()
    })
}

fn random_cnonce() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill(&mut bytes);
    to_hex(&bytes)
}

/// Splits `key=value, key="quoted, value"` into a map with lowercase keys.
///
/// Backslash escapes inside quoted strings are honored. Returns `None` on an
/// unterminated quoted string.
pub(crate) fn parse_params(input: &str) -> Option<HashMap<String, String>> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            if chars.peek().is_none() {
                return Some(params);
            }
            chars.next();
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            while chars.next_if(|c| *c == ' ' || *c == '\t').is_some() {}
            if chars.next_if_eq(&'"').is_some() {
                loop {
                    match chars.next()? {
                        '\\' => value.push(chars.next()?),
                        '"' => break,
                        c => value.push(c),
                    }
                }
            } else {
                while let Some(c) = chars.next_if(|c| *c != ',') {
                    value.push(c);
                }
                value = value.trim().to_string();
            }
        }
        params.insert(key, value);
    }
}

/// Cached challenge state for one realm.
#[derive(Debug, Clone)]
struct DigestState {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    algorithm: DigestAlgorithm,
    qop: Option<&'static str>,
    utf8: bool,
    nonce_count: u32,
    /// Fixed per challenge for `MD5-sess`, whose HA1 covers it.
    session_cnonce: Option<String>,
}

impl DigestState {
    fn from_challenge(challenge: &str) -> Result<Self, AuthError> {
        let (scheme, rest) = challenge_scheme(challenge);
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(AuthError::unsupported_scheme(SCHEME, scheme));
        }
        let mut params =
            parse_params(rest).ok_or_else(|| AuthError::unusable(SCHEME, "unterminated quoted value"))?;

        let realm = params
            .remove("realm")
            .ok_or_else(|| AuthError::unusable(SCHEME, "missing realm"))?;
        let nonce = params
            .remove("nonce")
            .filter(|nonce| !nonce.is_empty())
            .ok_or_else(|| AuthError::unusable(SCHEME, "missing nonce"))?;
        let algorithm = DigestAlgorithm::parse(params.get("algorithm").map(String::as_str))?;

        let qop = match params.get("qop") {
            None => None,
            Some(offered) => {
                if offered
                    .split(',')
                    .any(|option| option.trim().eq_ignore_ascii_case("auth"))
                {
                    Some("auth")
                } else {
                    return Err(AuthError::unusable(
                        SCHEME,
                        format!("no supported qop in '{offered}'"),
                    ));
                }
            }
        };
        let utf8 = params
            .get("charset")
            .is_some_and(|charset| charset.eq_ignore_ascii_case("UTF-8"));

        Ok(Self {
            realm,
            nonce,
            opaque: params.remove("opaque"),
            algorithm,
            qop,
            utf8,
            nonce_count: 0,
            session_cnonce: (algorithm == DigestAlgorithm::Md5Sess).then(random_cnonce),
        })
    }
}

/// Digest strategy bound to one set of credentials.
#[derive(Debug)]
pub struct DigestAuthentication {
    username: String,
    password: SecretString,
    state: Option<DigestState>,
}

impl DigestAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            state: None,
        }
    }

    /// Nonce count of the last header produced (0 without a cached challenge).
    #[must_use]
    pub fn nonce_count(&self) -> u32 {
        self.state.as_ref().map_or(0, |state| state.nonce_count)
    }

    /// Realm of the cached challenge.
    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.state.as_ref().map(|state| state.realm.as_str())
    }

    /// Bumps the nonce count and attaches a fresh `Authorization` header.
    fn authorize(&mut self, request: &mut Request) -> Result<(), AuthError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        let Some(nonce_count) = state.nonce_count.checked_add(1) else {
            self.state = None;
            return Err(AuthError::unusable(SCHEME, "nonce count exhausted"));
        };
        state.nonce_count = nonce_count;

        let uri = request.url()[Position::BeforePath..Position::AfterQuery].to_string();
        let cnonce = state.session_cnonce.clone().unwrap_or_else(random_cnonce);
        let method = request.method().as_str().to_string();
        let response = compute_response(&DigestInput {
            username: &self.username,
            realm: &state.realm,
            password: self.password.expose(),
            nonce: &state.nonce,
            nc: state.nonce_count,
            cnonce: &cnonce,
            qop: state.qop,
            method: &method,
            uri: &uri,
            algorithm: state.algorithm,
            utf8: state.utf8,
        });

        let mut header = format!(
            "{SCHEME} username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm=\"{}\", response=\"{}\"",
            quote(&self.username),
            quote(&state.realm),
            quote(&state.nonce),
            quote(&uri),
            state.algorithm.as_str(),
            response
        );
        if let Some(qop) = state.qop {
            let _ = write!(
                header,
                ", qop={qop}, nc={}, cnonce=\"{cnonce}\"",
                format_nc(state.nonce_count)
            );
        }
        if let Some(opaque) = &state.opaque {
            let _ = write!(header, ", opaque=\"{}\"", quote(opaque));
        }

        trace!(nc = state.nonce_count, realm = %state.realm, "digest header computed");
        request.set_header(
            reqwest::header::AUTHORIZATION,
            authorization_value(SCHEME, &header)?,
        );
        Ok(())
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Authentication for DigestAuthentication {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn setup(&mut self, request: &mut Request) -> Result<(), AuthError> {
        if self.state.is_some() {
            debug!("reusing cached digest nonce");
        }
        self.authorize(request)
    }

    fn authenticate(&mut self, request: &mut Request, response: &Response) -> Result<(), AuthError> {
        let challenge = response
            .challenge()
            .ok_or_else(|| AuthError::unusable(SCHEME, "response is not a challenge"))?;
        self.state = Some(DigestState::from_challenge(challenge)?);
        debug!(realm = ?self.realm(), "digest challenge accepted");
        self.authorize(request)
    }

    fn reset(&mut self) {
        self.state = None;
    }
}
