use secrecy::{ExposeSecret, SecretBox, SecretString};

use crate::config::KEY_SIZE;

/// A derived AES-256 key, zeroized on drop.
pub struct SecretKey {
    inner: SecretBox<[u8; KEY_SIZE]>,
}

impl SecretKey {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { inner: SecretBox::new(Box::new(key)) }
    }

    pub fn expose_secret(&self) -> &[u8; KEY_SIZE] {
        self.inner.expose_secret()
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// A user or system password.
pub struct Password {
    inner: SecretString,
}

impl Password {
    pub fn new(password: &str) -> Self {
        Self { inner: SecretString::from(password.to_owned()) }
    }

    pub fn from_string(password: String) -> Self {
        Self { inner: SecretString::from(password) }
    }

    pub fn expose_secret(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl Clone for Password {
    fn clone(&self) -> Self {
        Self::new(self.expose_secret())
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self::new(password)
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self::from_string(password)
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}
