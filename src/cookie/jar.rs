//! Thread-safe cookie jar with domain-suffix lookup.
//!
//! Cookies are bucketed by normalized domain. A lookup for a host walks the
//! host's domain suffixes (see [`domain_candidates`]) and collects the
//! matching, unexpired cookies of each bucket.

use std::io::{Read, Write};
use std::net::IpAddr;

use dashmap::DashMap;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::CookieError;
use super::item::{Cookie, normalize_domain, now_millis};

/// A collection of cookies keyed by normalized domain.
///
/// The jar never holds two cookies with the same `(domain, name, path)`;
/// inserting one replaces the other. Expired cookies stay until
/// [`purge_expired`](Self::purge_expired) runs but are never attached to
/// requests.
///
/// `CookieJar` is `Send + Sync` and meant to be shared through `Arc`.
#[derive(Debug, Default)]
pub struct CookieJar {
    entries: DashMap<String, Vec<Cookie>>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a cookie, returning the one it replaced.
    pub fn insert(&self, cookie: Cookie) -> Option<Cookie> {
        let mut bucket = self.entries.entry(cookie.domain().to_string()).or_default();
        if let Some(existing) = bucket.iter_mut().find(|stored| **stored == cookie) {
            return Some(std::mem::replace(existing, cookie));
        }
        bucket.push(cookie);
        None
    }

    /// Parses every `Set-Cookie` header in `headers` received for `url` and
    /// stores the results. Malformed cookies are skipped with a warning.
    ///
    /// Returns the number of cookies stored.
    #[instrument(level = "debug", skip(self, headers), fields(url = %url))]
    pub fn store_response(&self, url: &Url, headers: &HeaderMap) -> usize {
        let mut stored = 0;
        for raw in headers.get_all(SET_COOKIE) {
            let Ok(line) = raw.to_str() else {
                warn!("skipping non-ASCII Set-Cookie header");
                continue;
            };
            match Cookie::parse(line, url) {
                Ok(cookie) => {
                    debug!(name = cookie.name(), domain = cookie.domain(), "storing cookie");
                    self.insert(cookie);
                    stored += 1;
                }
                Err(e) => warn!(reason = %e, "rejecting cookie"),
            }
        }
        stored
    }

    /// Returns unexpired cookies that apply to `url`, longest path first.
    #[must_use]
    pub fn matching(&self, url: &Url) -> Vec<Cookie> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let now = now_millis();
        let mut found: Vec<Cookie> = domain_candidates(host)
            .iter()
            .filter_map(|domain| self.entries.get(domain))
            .flat_map(|bucket| {
                bucket
                    .iter()
                    .filter(|cookie| !cookie.is_expired_at(now) && cookie.matches_url(url))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        found.sort_by(|a, b| b.path().len().cmp(&a.path().len()));
        found
    }

    /// Renders the `Cookie` request header value for `url`, if any cookie applies.
    #[must_use]
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        render_cookie_header(&self.matching(url))
    }

    /// Looks up a cookie by identity.
    #[must_use]
    pub fn get(&self, domain: &str, name: &str, path: &str) -> Option<Cookie> {
        self.entries
            .get(&normalize_domain(domain))?
            .iter()
            .find(|cookie| cookie.name() == name && cookie.path() == path)
            .cloned()
    }

    /// Removes a cookie by identity, returning it.
    pub fn remove(&self, domain: &str, name: &str, path: &str) -> Option<Cookie> {
        let key = normalize_domain(domain);
        let removed = {
            let mut bucket = self.entries.get_mut(&key)?;
            let position = bucket
                .iter()
                .position(|cookie| cookie.name() == name && cookie.path() == path)?;
            bucket.remove(position)
        };
        self.entries.remove_if(&key, |_, bucket| bucket.is_empty());
        Some(removed)
    }

    /// Drops expired cookies and empty buckets, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = now_millis();
        let mut purged = 0;
        self.entries.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|cookie| !cookie.is_expired_at(now));
            purged += before - bucket.len();
            !bucket.is_empty()
        });
        if purged > 0 {
            debug!(purged, "purged expired cookies");
        }
        purged
    }

    /// Snapshot of every stored cookie, expired ones included.
    #[must_use]
    pub fn cookies(&self) -> Vec<Cookie> {
        self.entries
            .iter()
            .flat_map(|bucket| bucket.value().clone())
            .collect()
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|bucket| bucket.len()).sum()
    }

    /// Whether the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every cookie.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Writes the unexpired cookies as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Json`] if serialization or writing fails.
    pub fn save_json(&self, writer: impl Write) -> Result<(), CookieError> {
        let now = now_millis();
        let cookies: Vec<Cookie> = self
            .cookies()
            .into_iter()
            .filter(|cookie| !cookie.is_expired_at(now))
            .collect();
        serde_json::to_writer_pretty(writer, &cookies)?;
        Ok(())
    }

    /// Loads cookies previously written by [`save_json`](Self::save_json),
    /// skipping those that expired since. Returns how many were loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Json`] if the input is not a valid jar snapshot.
    pub fn load_json(&self, reader: impl Read) -> Result<usize, CookieError> {
        let cookies: Vec<Cookie> = serde_json::from_reader(reader)?;
        let now = now_millis();
        let mut loaded = 0;
        for cookie in cookies.into_iter().filter(|c| !c.is_expired_at(now)) {
            self.insert(cookie);
            loaded += 1;
        }
        Ok(loaded)
    }
}

/// Derives the domain buckets a host may receive cookies from.
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com` and
/// `example.com`; the bare top-level label is never a candidate unless the
/// host is a single label (`localhost`). IP addresses only match themselves.
#[must_use]
pub fn domain_candidates(host: &str) -> Vec<String> {
    let host = normalize_domain(host);
    if host.is_empty() {
        return Vec::new();
    }
    if host.parse::<IpAddr>().is_ok() || !host.contains('.') {
        return vec![host];
    }

    let mut candidates = vec![host.clone()];
    let mut rest = host.as_str();
    while let Some((_, parent)) = rest.split_once('.') {
        if !parent.contains('.') {
            break;
        }
        candidates.push(parent.to_string());
        rest = parent;
    }
    candidates
}

/// Merges `incoming` into `target`, later cookies replacing earlier ones
/// with the same identity while keeping their original position.
pub(crate) fn merge_cookies(target: &mut Vec<Cookie>, incoming: impl IntoIterator<Item = Cookie>) {
    for cookie in incoming {
        if let Some(existing) = target.iter_mut().find(|stored| **stored == cookie) {
            *existing = cookie;
        } else {
            target.push(cookie);
        }
    }
}

/// Joins cookies into a `Cookie` header value.
pub(crate) fn render_cookie_header(cookies: &[Cookie]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(Cookie::to_header_pair)
            .collect::<Vec<_>>()
            .join("; "),
    )
}
