//! Redacting wrapper for bearer tokens and API keys

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value. Redacted in Debug/Display, zeroized on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Callers must not log it.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Borrow the inner string as `&str`, for header construction.
    pub fn expose_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let token = Secret::new(String::from("eyJhbGciOi.access"));
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(token.to_string(), "[REDACTED]");
    }

    #[test]
    fn expose_returns_inner_value() {
        let token: Secret<String> = String::from("minted-token").into();
        assert_eq!(token.expose(), "minted-token");
        assert_eq!(token.expose_str(), "minted-token");
    }

    #[test]
    fn clone_is_independent() {
        let a = Secret::new(String::from("abc"));
        let b = a.clone();
        drop(a);
        assert_eq!(b.expose_str(), "abc");
    }
}
