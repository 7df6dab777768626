//! The [`Cookie`] value object and `Set-Cookie` line parsing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::UNIX_EPOCH;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::error::CookieError;

/// Max-age marker for a session cookie (never expires by time alone).
pub const SESSION_MAX_AGE: i64 = -1;

/// `Expires` layouts accepted besides what `httpdate` understands.
const EXPIRES_FORMATS: [&str; 2] = ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d %b %Y %H:%M:%S GMT"];

/// A single HTTP cookie.
///
/// Identity (`Eq`/`Hash`) is `(domain, name, path)`; value and flags are not
/// part of it, so a jar replaces a cookie when a newer one with the same
/// identity arrives. The domain is stored lowercased without a leading dot.
///
/// The value is redacted in `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    max_age_secs: i64,
    created_at_millis: i64,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    /// Creates a session cookie for `domain` with path `/`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: &str) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(domain),
            path: "/".to_string(),
            max_age_secs: SESSION_MAX_AGE,
            created_at_millis: now_millis(),
            secure: false,
            http_only: false,
        }
    }

    /// Sets the path scope. Paths not starting with `/` are ignored.
    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        if path.starts_with('/') {
            self.path = path.to_string();
        }
        self
    }

    /// Sets the max-age (`-1` session, `0` expired, `>0` seconds to live).
    #[must_use]
    pub fn with_max_age(mut self, max_age_secs: i64) -> Self {
        self.max_age_secs = max_age_secs.max(SESSION_MAX_AGE);
        self
    }

    /// Overrides the creation timestamp (milliseconds since the Unix epoch).
    #[must_use]
    pub fn with_created_at_millis(mut self, created_at_millis: i64) -> Self {
        self.created_at_millis = created_at_millis;
        self
    }

    /// Marks the cookie as HTTPS-only.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Marks the cookie as hidden from scripts.
    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Parses one `Set-Cookie` header value received for `request_url`.
    ///
    /// Recognized attributes are `Domain`, `Path`, `Expires`, `Max-Age`,
    /// `Secure` and `HttpOnly` (case-insensitive); anything else is ignored.
    /// `Max-Age` wins over `Expires`. A missing `Domain` defaults to the
    /// request host, a missing `Path` to `/`.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError`] when the name/value pair has no `=`, the name
    /// is empty, the URL has no host, or the `Domain` attribute does not
    /// cover the request host.
    pub fn parse(set_cookie: &str, request_url: &Url) -> Result<Self, CookieError> {
        Self::parse_at(set_cookie, request_url, now_millis())
    }

    pub(crate) fn parse_at(
        set_cookie: &str,
        request_url: &Url,
        now_millis: i64,
    ) -> Result<Self, CookieError> {
        let host = request_url
            .host_str()
            .map(normalize_domain)
            .ok_or_else(|| CookieError::missing_host(request_url.as_str()))?;

        let mut parts = set_cookie.split(';');
        let pair = parts.next().unwrap_or_default();
        let Some((raw_name, raw_value)) = pair.split_once('=') else {
            return Err(CookieError::missing_name_value(pair));
        };
        let name = raw_name.trim();
        if name.is_empty() {
            return Err(CookieError::EmptyName);
        }

        let mut cookie = Self {
            name: name.to_string(),
            value: raw_value.trim().to_string(),
            domain: host.clone(),
            path: "/".to_string(),
            max_age_secs: SESSION_MAX_AGE,
            created_at_millis: now_millis,
            secure: false,
            http_only: false,
        };

        let mut max_age = None;
        let mut expires_at = None;
        for attribute in parts {
            let (key, value) = match attribute.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (attribute.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    let domain = normalize_domain(value);
                    if !domain.is_empty() {
                        cookie.domain = domain;
                    }
                }
                "path" => {
                    if value.starts_with('/') {
                        cookie.path = value.to_string();
                    }
                }
                "max-age" => max_age = value.parse::<i64>().ok(),
                "expires" => expires_at = parse_expires(value),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => debug!(attribute = key, "ignoring unrecognized cookie attribute"),
            }
        }

        if !domain_matches(&host, &cookie.domain) {
            return Err(CookieError::domain_mismatch(
                cookie.name,
                cookie.domain,
                host,
            ));
        }

        cookie.max_age_secs = match (max_age, expires_at) {
            (Some(secs), _) => secs.max(0),
            (None, Some(at)) => {
                let remaining = at - now_millis;
                if remaining <= 0 {
                    0
                } else {
                    (remaining / 1000).max(1)
                }
            }
            (None, None) => SESSION_MAX_AGE,
        };

        Ok(cookie)
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value (sensitive, avoid logging).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Normalized domain (lowercase, no leading dot).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Path scope.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Max-age in seconds (`-1` session, `0` expired).
    #[must_use]
    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// Creation timestamp in milliseconds since the Unix epoch.
    #[must_use]
    pub fn created_at_millis(&self) -> i64 {
        self.created_at_millis
    }

    /// Whether the cookie is restricted to HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Whether the cookie carries the `HttpOnly` flag.
    #[must_use]
    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Whether the cookie has expired as of now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Whether the cookie has expired as of `now_millis`.
    #[must_use]
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        match self.max_age_secs {
            secs if secs < 0 => false,
            0 => true,
            secs => {
                let lifetime = secs.saturating_mul(1000);
                now_millis >= self.created_at_millis.saturating_add(lifetime)
            }
        }
    }

    /// Whether this cookie should be sent with a request to `url`.
    ///
    /// Checks domain suffix, path prefix and the secure flag; expiry is
    /// checked separately.
    #[must_use]
    pub fn matches_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        domain_matches(&normalize_domain(host), &self.domain) && path_matches(url.path(), &self.path)
    }

    /// Renders the `name=value` pair used in a `Cookie` request header.
    #[must_use]
    pub fn to_header_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl PartialEq for Cookie {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain && self.name == other.name && self.path == other.path
    }
}

impl Eq for Cookie {}

impl Hash for Cookie {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain.hash(state);
        self.name.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("max_age_secs", &self.max_age_secs)
            .field("created_at_millis", &self.created_at_millis)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .finish()
    }
}

impl fmt::Display for Cookie {
    /// Renders a `Set-Cookie`-style line with the value redacted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}=[REDACTED]; Domain={}; Path={}",
            self.name, self.domain, self.path
        )?;
        if self.max_age_secs >= 0 {
            write!(f, "; Max-Age={}", self.max_age_secs)?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

/// Lowercases a domain and strips leading dots and a trailing dot.
pub(crate) fn normalize_domain(domain: &str) -> String {
    domain
        .trim()
        .trim_start_matches('.')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Whether `host` equals `domain` or is a subdomain of it. Both normalized.
pub(crate) fn domain_matches(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// RFC 6265 path-match.
pub(crate) fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

/// Parses a cookie `Expires` value into epoch milliseconds.
fn parse_expires(raw: &str) -> Option<i64> {
    for format in EXPIRES_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(at.and_utc().timestamp_millis());
        }
    }
    let at = httpdate::parse_http_date(raw).ok()?;
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    i64::try_from(millis).ok()
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_session_cookie_never_expires() {
        let cookie = Cookie::new("s", "v", "example.com").with_created_at_millis(0);
        assert!(!cookie.is_expired_at(0));
        assert!(!cookie.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_zero_max_age_expires_immediately() {
        let cookie = Cookie::new("s", "v", "example.com")
            .with_max_age(0)
            .with_created_at_millis(NOW);
        assert!(cookie.is_expired_at(NOW));
        assert!(cookie.is_expired_at(NOW - 10_000));
    }

    #[test]
    fn test_positive_max_age_expires_after_ttl() {
        let cookie = Cookie::new("s", "v", "example.com")
            .with_max_age(60)
            .with_created_at_millis(NOW);
        assert!(!cookie.is_expired_at(NOW + 59_999));
        assert!(cookie.is_expired_at(NOW + 60_000));
    }

    #[test]
    fn test_identity_ignores_value_and_flags() {
        let a = Cookie::new("s", "v1", ".Example.com");
        let b = Cookie::new("s", "v2", "example.com").with_secure(true);
        let c = Cookie::new("s", "v1", "example.com").with_path("/app");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_defaults_domain_and_path() {
        let cookie = Cookie::parse_at("sid=abc", &url("http://www.example.com/a/b"), NOW).unwrap();
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.domain(), "www.example.com");
        assert_eq!(cookie.path(), "/");
        assert_eq!(cookie.max_age_secs(), SESSION_MAX_AGE);
        assert_eq!(cookie.created_at_millis(), NOW);
    }

    #[test]
    fn test_parse_attributes_case_insensitive() {
        let cookie = Cookie::parse_at(
            "token=xyz; DOMAIN=.Example.com; Path=/api; SECURE; HttpOnly; SameSite=Lax",
            &url("https://api.example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.domain(), "example.com");
        assert_eq!(cookie.path(), "/api");
        assert!(cookie.is_secure());
        assert!(cookie.is_http_only());
    }

    #[test]
    fn test_parse_expires_dashed_format() {
        // 2023-11-14 22:13:20 UTC is NOW; one hour later.
        let cookie = Cookie::parse_at(
            "s=v; expires=Tue, 14-Nov-2023 23:13:20 GMT",
            &url("http://example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.max_age_secs(), 3600);
    }

    #[test]
    fn test_parse_expires_spaced_format() {
        let cookie = Cookie::parse_at(
            "s=v; Expires=Tue, 14 Nov 2023 23:13:20 GMT",
            &url("http://example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.max_age_secs(), 3600);
    }

    #[test]
    fn test_parse_expires_in_past_is_expired() {
        let cookie = Cookie::parse_at(
            "s=v; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            &url("http://example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.max_age_secs(), 0);
        assert!(cookie.is_expired_at(NOW));
    }

    #[test]
    fn test_parse_max_age_wins_over_expires() {
        let cookie = Cookie::parse_at(
            "s=v; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=120",
            &url("http://example.com/"),
            NOW,
        )
        .unwrap();
        assert_eq!(cookie.max_age_secs(), 120);
    }

    #[test]
    fn test_parse_unparseable_expires_is_session() {
        let cookie =
            Cookie::parse_at("s=v; Expires=someday", &url("http://example.com/"), NOW).unwrap();
        assert_eq!(cookie.max_age_secs(), SESSION_MAX_AGE);
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        let result = Cookie::parse_at("justaname; Path=/", &url("http://example.com/"), NOW);
        assert!(matches!(result, Err(CookieError::MissingNameValue { .. })));
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        let result = Cookie::parse_at("=value", &url("http://example.com/"), NOW);
        assert!(matches!(result, Err(CookieError::EmptyName)));
    }

    #[test]
    fn test_parse_rejects_foreign_domain() {
        let result = Cookie::parse_at(
            "s=v; Domain=notexample.com",
            &url("http://www.example.com/"),
            NOW,
        );
        assert!(matches!(result, Err(CookieError::DomainMismatch { .. })));
    }

    #[test]
    fn test_parse_keeps_equals_inside_value() {
        let cookie = Cookie::parse_at("data=a=b=c", &url("http://example.com/"), NOW).unwrap();
        assert_eq!(cookie.value(), "a=b=c");
    }

    #[test]
    fn test_domain_matches_suffix_boundaries() {
        let cookie = Cookie::new("s", "v", ".example.com");
        assert!(cookie.matches_url(&url("http://example.com/")));
        assert!(cookie.matches_url(&url("http://www.example.com/")));
        assert!(cookie.matches_url(&url("http://a.b.example.com/")));
        assert!(!cookie.matches_url(&url("http://notexample.com/")));
        assert!(!cookie.matches_url(&url("http://example.org/")));
    }

    #[test]
    fn test_path_matching() {
        assert!(path_matches("/", "/"));
        assert!(path_matches("/docs/page", "/docs"));
        assert!(path_matches("/docs/page", "/docs/"));
        assert!(!path_matches("/docsearch", "/docs"));
        assert!(!path_matches("/", "/docs"));
    }

    #[test]
    fn test_secure_cookie_only_matches_https() {
        let cookie = Cookie::new("s", "v", "example.com").with_secure(true);
        assert!(cookie.matches_url(&url("https://example.com/")));
        assert!(!cookie.matches_url(&url("http://example.com/")));
    }

    #[test]
    fn test_debug_and_display_redact_value() {
        let cookie = Cookie::new("session", "super_secret_token", "example.com");
        let debug = format!("{cookie:?}");
        let display = cookie.to_string();
        assert!(!debug.contains("super_secret_token"));
        assert!(!display.contains("super_secret_token"));
        assert!(display.starts_with("session=[REDACTED]"));
    }
}
