//! # Key Derivation with PBKDF2
//!
//! Password-based keys for envelopes, container blocks and invitations are all
//! derived with PBKDF2-HMAC-SHA256 at a fixed iteration count. The count is
//! part of the stored format: encrypting and decrypting with different counts
//! silently produces unrelated keys and every tag check fails.
//!
//! Derivation is slow and never cached. Async callers run the whole
//! password-based operation on the blocking pool.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::config::{KDF_ITERATIONS, KEY_SIZE};
use crate::error::{Error, Result};
use crate::secret::{Password, SecretKey};

/// # Key Derivation Function
///
/// Stateless wrapper around PBKDF2 holding the iteration count.
#[derive(Debug, Clone, Copy)]
pub struct Derive {
    iterations: u32,
}

impl Default for Derive {
    fn default() -> Self {
        Self { iterations: KDF_ITERATIONS }
    }
}

impl Derive {
    /// Derives a 256-bit AES key from a password and salt.
    ///
    /// The same password and salt always produce the same key. The salt may be
    /// any length: random 16-byte salts for envelopes and blocks, the static
    /// ASCII salt for invitations.
    pub fn derive_key(&self, password: &Password, salt: &[u8]) -> SecretKey {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(password.expose_secret().as_bytes(), salt, self.iterations, &mut key);

        let secret = SecretKey::new(key);
        key.zeroize();
        secret
    }

    /// Generates `N` bytes from the operating system's CSPRNG.
    ///
    /// Used for salts and nonces.
    pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| Error::Crypto(format!("rng failed: {e}")))?;

        Ok(bytes)
    }
}

/// Derives a key with the default parameters.
#[inline]
pub fn derive_key(password: &Password, salt: &[u8]) -> SecretKey {
    Derive::default().derive_key(password, salt)
}
