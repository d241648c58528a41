use serde::{Deserialize, Serialize};
use std::fmt;

/// Password holder that never leaks its value through `Debug` or `Display`,
/// so a configuration snapshot can be logged as a whole.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        SecretString(s.into())
    }

    /// Access the raw secret if explicitly needed
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<REDACTED, length {}>", self.0.len())
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::new("Harbor12345");
        assert_eq!(format!("{:?}", secret), "<REDACTED, length 11>");
        assert_eq!(secret.to_string(), "<REDACTED>");
        assert_eq!(secret.expose_secret(), "Harbor12345");
    }

    #[test]
    fn test_blank_secret() {
        assert!(SecretString::new("  \t").is_blank());
        assert!(!SecretString::new(" x ").is_blank());
    }
}
