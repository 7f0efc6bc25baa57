use aes_gcm::aead::Aead;
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aes::Aes256;
use aes_gcm::{KeyInit, Nonce};

use crate::config::{AES_NONCE_SIZE, INVITATION_IV_SIZE};
use crate::error::{Error, Result};
use crate::secret::SecretKey;

type Gcm96 = aes_gcm::AesGcm<Aes256, U12>;
type Gcm128 = aes_gcm::AesGcm<Aes256, U16>;

/// AES-256-GCM with a 128-bit tag and an explicit nonce.
///
/// Supports the 12-byte nonces of envelopes and container blocks and the
/// 16-byte IVs of invitations. The caller owns nonce placement, since each
/// format frames it differently.
pub struct AesGcm {
    key: SecretKey,
}

impl AesGcm {
    #[inline]
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let sealed = match nonce.len() {
            AES_NONCE_SIZE => self.cipher::<Gcm96>()?.encrypt(Nonce::<U12>::from_slice(nonce), plaintext),
            INVITATION_IV_SIZE => self.cipher::<Gcm128>()?.encrypt(Nonce::<U16>::from_slice(nonce), plaintext),
            other => return Err(Error::Crypto(format!("unsupported nonce length {other}"))),
        };

        sealed.map_err(|e| Error::Crypto(format!("aes-gcm encryption failed: {e}")))
    }

    /// Decrypts and authenticates `ciphertext` (ciphertext followed by tag).
    ///
    /// Any tag mismatch is [`Error::DecryptionFailed`].
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let opened = match nonce.len() {
            AES_NONCE_SIZE => self.cipher::<Gcm96>()?.decrypt(Nonce::<U12>::from_slice(nonce), ciphertext),
            INVITATION_IV_SIZE => self.cipher::<Gcm128>()?.decrypt(Nonce::<U16>::from_slice(nonce), ciphertext),
            other => return Err(Error::Crypto(format!("unsupported nonce length {other}"))),
        };

        opened.map_err(|_| Error::DecryptionFailed)
    }

    fn cipher<C: KeyInit>(&self) -> Result<C> {
        C::new_from_slice(self.key.expose_secret()).map_err(|e| Error::Crypto(format!("invalid aes key: {e}")))
    }
}
