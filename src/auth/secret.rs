//! Scrubbable credential storage.

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

/// A password held in a buffer that is zeroed on drop or on [`clear`](Self::clear).
///
/// `Debug` never prints the contents.
#[derive(Clone, Default)]
pub struct SecretString {
    inner: Zeroizing<String>,
}

impl SecretString {
    /// Wraps `secret`, taking ownership of its buffer.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self {
            inner: Zeroizing::new(secret),
        }
    }

    /// Borrows the plaintext. Keep the borrow short.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Zeroes and empties the buffer now.
    pub fn clear(&mut self) {
        self.inner.zeroize();
    }

    /// Whether the secret is empty (or was cleared).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

impl From<&str> for SecretString {
    fn from(secret: &str) -> Self {
        Self::new(secret.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut secret = SecretString::from("hunter2");
        assert_eq!(secret.expose(), "hunter2");
        secret.clear();
        assert!(secret.is_empty());
        assert_eq!(secret.expose(), "");
    }
}
