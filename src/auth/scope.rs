//! Where a registered credential applies.

use url::Url;

use super::challenge_scheme;
use super::digest::parse_params;

/// `(host, realm?, scheme?, port?)`.
///
/// The host must match case-insensitively. Realm, scheme and port only
/// constrain a match when the scope sets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthScope {
    host: String,
    realm: Option<String>,
    scheme: Option<String>,
    port: Option<u16>,
}

impl AuthScope {
    /// A scope covering every realm, scheme and port of `host`.
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            realm: None,
            scheme: None,
            port: None,
        }
    }

    /// Restricts the scope to `realm` (compared exactly).
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Restricts the scope to an auth scheme such as `Digest` (case-insensitive).
    #[must_use]
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_ascii_lowercase());
        self
    }

    /// Restricts the scope to `port`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// The lookup key for a request URL: host and effective port, realm and
    /// scheme unknown. Returns `None` for URLs without a host.
    #[must_use]
    pub fn for_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        let mut scope = Self::new(host);
        scope.port = url.port_or_known_default();
        Some(scope)
    }

    /// [`for_url`](Self::for_url) narrowed by a `WWW-Authenticate` challenge:
    /// its scheme and, when present, its `realm` parameter.
    pub(crate) fn for_challenge(url: &Url, challenge: &str) -> Option<Self> {
        let mut scope = Self::for_url(url)?;
        let (scheme, params) = challenge_scheme(challenge);
        if !scheme.is_empty() {
            scope = scope.with_scheme(scheme);
        }
        if let Some(realm) = parse_params(params).and_then(|mut params| params.remove("realm")) {
            scope = scope.with_realm(realm);
        }
        Some(scope)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether this registered scope covers the `query` scope.
    ///
    /// Fields absent on either side match anything.
    #[must_use]
    pub fn matches(&self, query: &AuthScope) -> bool {
        fn field<T: PartialEq + ?Sized>(ours: Option<&T>, theirs: Option<&T>) -> bool {
            match (ours, theirs) {
                (Some(ours), Some(theirs)) => ours == theirs,
                _ => true,
            }
        }

        self.host.eq_ignore_ascii_case(&query.host)
            && field(self.realm(), query.realm())
            && field(self.scheme(), query.scheme())
            && field(self.port.as_ref(), query.port.as_ref())
    }

    /// Number of constraining fields; the most specific match wins lookup.
    pub(crate) fn specificity(&self) -> usize {
        usize::from(self.realm.is_some())
            + usize::from(self.scheme.is_some())
            + usize::from(self.port.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_host_match_is_case_insensitive_and_mandatory() {
        let scope = AuthScope::new("Example.COM");
        assert!(scope.matches(&AuthScope::new("example.com")));
        assert!(!scope.matches(&AuthScope::new("example.org")));
    }

    #[test]
    fn test_absent_fields_are_wildcards() {
        let scope = AuthScope::new("example.com");
        let query = AuthScope::new("example.com")
            .with_realm("private")
            .with_scheme("Digest")
            .with_port(8080);
        assert!(scope.matches(&query));
    }

    #[test]
    fn test_present_fields_constrain() {
        let scope = AuthScope::new("example.com").with_realm("private").with_port(443);
        assert!(scope.matches(&AuthScope::new("example.com").with_realm("private")));
        assert!(!scope.matches(&AuthScope::new("example.com").with_realm("public")));
        assert!(!scope.matches(&AuthScope::new("example.com").with_port(80)));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let scope = AuthScope::new("example.com").with_scheme("DIGEST");
        assert!(scope.matches(&AuthScope::new("example.com").with_scheme("digest")));
    }

    #[test]
    fn test_for_url_uses_default_port() {
        let scope = AuthScope::for_url(&Url::parse("https://Example.com/a").unwrap()).unwrap();
        assert_eq!(scope.host(), "example.com");
        assert_eq!(scope.port(), Some(443));
        assert_eq!(scope.realm(), None);
    }

    #[test]
    fn test_for_challenge_carries_scheme_and_realm() {
        let url = Url::parse("http://example.com:8080/a").unwrap();
        let scope =
            AuthScope::for_challenge(&url, r#"Digest realm="Staff Only", nonce="n""#).unwrap();
        assert_eq!(scope.scheme(), Some("digest"));
        assert_eq!(scope.realm(), Some("Staff Only"));
        assert_eq!(scope.port(), Some(8080));

        let bare = AuthScope::for_challenge(&url, "").unwrap();
        assert_eq!(bare.scheme(), None);
        assert_eq!(bare.realm(), None);
    }
}
