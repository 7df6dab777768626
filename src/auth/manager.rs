//! Scope-keyed registry of authentication strategies.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use super::{Authentication, AuthScope, SharedAuthentication};

/// Maps [`AuthScope`]s to strategies.
///
/// Shared by every request of a [`ClientConfig`](crate::ClientConfig); lookups
/// take a read lock, registration a write lock. Each registration owns its
/// own strategy instance, so protocol state never leaks across scopes.
#[derive(Default)]
pub struct AuthenticationManager {
    entries: RwLock<Vec<(AuthScope, SharedAuthentication)>>,
}

impl AuthenticationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `auth` for `scope`, replacing an identical scope.
    ///
    /// Returns the shared handle to the registered strategy.
    pub fn register<A>(&self, scope: AuthScope, auth: A) -> SharedAuthentication
    where
        A: Authentication + 'static,
    {
        let shared: SharedAuthentication = Arc::new(Mutex::new(auth));
        self.register_shared(scope, Arc::clone(&shared));
        shared
    }

    /// Registers an already shared strategy.
    pub fn register_shared(&self, scope: AuthScope, auth: SharedAuthentication) {
        debug!(host = scope.host(), realm = ?scope.realm(), "registering authentication");
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.iter_mut().find(|(existing, _)| *existing == scope) {
            entry.1 = auth;
        } else {
            entries.push((scope, auth));
        }
    }

    /// The strategy whose scope covers `query`, preferring the most specific.
    ///
    /// Equally specific matches go to the earliest registration. A query
    /// without a realm matches every realm of its host, so callers narrow it
    /// with the challenge's realm once one is known.
    #[must_use]
    pub fn find(&self, query: &AuthScope) -> Option<SharedAuthentication> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        // max_by_key keeps the last maximum; reversed, that is the earliest entry.
        entries
            .iter()
            .rev()
            .filter(|(scope, _)| scope.matches(query))
            .max_by_key(|(scope, _)| scope.specificity())
            .map(|(_, auth)| Arc::clone(auth))
    }

    /// Removes the registration for exactly `scope`.
    pub fn remove(&self, scope: &AuthScope) -> Option<SharedAuthentication> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let index = entries.iter().position(|(existing, _)| existing == scope)?;
        Some(entries.remove(index).1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AuthenticationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let scopes: Vec<&AuthScope> = entries.iter().map(|(scope, _)| scope).collect();
        f.debug_struct("AuthenticationManager")
            .field("scopes", &scopes)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::BasicAuthentication;

    fn scheme_of(auth: &SharedAuthentication) -> &'static str {
        auth.lock().unwrap().scheme()
    }

    #[test]
    fn test_find_prefers_most_specific_scope() {
        let manager = AuthenticationManager::new();
        manager.register(AuthScope::new("example.com"), BasicAuthentication::new("a", "1"));
        let specific = manager.register(
            AuthScope::new("example.com").with_port(8443),
            crate::auth::DigestAuthentication::new("b", "2"),
        );

        let found = manager
            .find(&AuthScope::new("example.com").with_port(8443))
            .unwrap();
        assert!(Arc::ptr_eq(&found, &specific));
        assert_eq!(scheme_of(&found), "Digest");

        let fallback = manager.find(&AuthScope::new("example.com").with_port(80)).unwrap();
        assert_eq!(scheme_of(&fallback), "Basic");
    }

    #[test]
    fn test_equally_specific_scopes_resolve_to_earliest_registration() {
        let manager = AuthenticationManager::new();
        let staff = manager.register(
            AuthScope::new("example.com").with_realm("staff"),
            BasicAuthentication::new("staff", "1"),
        );
        let guests = manager.register(
            AuthScope::new("example.com").with_realm("guests"),
            crate::auth::DigestAuthentication::new("guest", "2"),
        );

        let unknown_realm = manager.find(&AuthScope::new("example.com")).unwrap();
        assert!(Arc::ptr_eq(&unknown_realm, &staff));

        let narrowed = manager
            .find(&AuthScope::new("example.com").with_realm("guests"))
            .unwrap();
        assert!(Arc::ptr_eq(&narrowed, &guests));
    }

    #[test]
    fn test_find_misses_other_hosts() {
        let manager = AuthenticationManager::new();
        manager.register(AuthScope::new("example.com"), BasicAuthentication::new("a", "1"));
        assert!(manager.find(&AuthScope::new("example.org")).is_none());
    }

    #[test]
    fn test_register_same_scope_replaces() {
        let manager = AuthenticationManager::new();
        let scope = AuthScope::new("example.com").with_realm("r");
        manager.register(scope.clone(), BasicAuthentication::new("a", "1"));
        manager.register(scope.clone(), crate::auth::DigestAuthentication::new("a", "1"));
        assert_eq!(manager.len(), 1);
        assert_eq!(scheme_of(&manager.find(&scope).unwrap()), "Digest");
    }

    #[test]
    fn test_remove() {
        let manager = AuthenticationManager::new();
        let scope = AuthScope::new("example.com");
        manager.register(scope.clone(), BasicAuthentication::new("a", "1"));
        assert!(manager.remove(&scope).is_some());
        assert!(manager.is_empty());
        assert!(manager.remove(&scope).is_none());
    }
}
