//! A redacting wrapper for credentials.
//!
//! The reconciliation stack carries several long-lived secrets: the Stripe and Paystack webhook
//! signing keys, the PayPal client credentials and the static admin API key. All of them are
//! wrapped in [`Secret`] so that configuration structs can be logged and `Debug`-dumped freely.
//! The inner value is only reachable through an explicit [`Secret::reveal`] call, which makes
//! every use of a raw credential easy to audit with a grep.

use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A value that must never end up in a log line. Both `Debug` and `Display` print `****`.
#[derive(Clone, Default)]
pub struct Secret<T: Clone + Default> {
    inner: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Hands out the raw credential. The name is deliberately conspicuous.
    pub fn reveal(&self) -> &T {
        &self.inner
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "****")
    }
}

#[cfg(test)]
mod test {
    use super::Secret;

    #[test]
    fn secrets_are_redacted_in_debug_and_display() {
        let key = Secret::new("whsec_supersecret".to_string());
        assert_eq!(format!("{key}"), "****");
        assert_eq!(format!("{key:?}"), "****");
        assert_eq!(format!("{:?}", Some(&key)), "Some(****)");
    }

    #[test]
    fn reveal_returns_the_inner_value() {
        let key = Secret::new("sk_live_123".to_string());
        assert_eq!(key.reveal(), "sk_live_123");
    }
}
