//! # Password Envelope
//!
//! Protects small secrets at rest (the service endpoint, mostly) under a user
//! password. Each envelope carries its own random salt and nonce, so sealing
//! the same plaintext twice never yields the same token.
//!
//! ## Token Format
//!
//! ```text
//! base64( {"salt": base64(16 bytes), "iv": base64(12 bytes), "data": base64(ciphertext || tag)} )
//! ```
//!
//! The JSON member names are those of tokens already sitting in users'
//! stores and cannot change.

use serde::{Deserialize, Serialize};

use crate::cipher::{AesGcm, Derive, derive_key};
use crate::config::{AES_NONCE_SIZE, KDF_SALT_SIZE, TAG_SIZE};
use crate::encoding::{from_base64, to_base64};
use crate::error::{Error, Result};
use crate::secret::Password;

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    salt: String,
    #[serde(default)]
    iv: String,
    #[serde(default)]
    data: String,
}

/// A sealed secret: salt, nonce and authenticated ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    salt: [u8; KDF_SALT_SIZE],
    nonce: [u8; AES_NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encrypts `plaintext` under a key derived from `password` and fresh randomness.
    pub fn seal(plaintext: &[u8], password: &Password) -> Result<Self> {
        let salt: [u8; KDF_SALT_SIZE] = Derive::random_bytes()?;
        let nonce: [u8; AES_NONCE_SIZE] = Derive::random_bytes()?;

        let ciphertext = AesGcm::new(derive_key(password, &salt)).encrypt(&nonce, plaintext)?;

        Ok(Self { salt, nonce, ciphertext })
    }

    /// Decrypts the envelope. A wrong password and a tampered envelope are
    /// indistinguishable and both yield [`Error::DecryptionFailed`].
    pub fn open(&self, password: &Password) -> Result<Vec<u8>> {
        AesGcm::new(derive_key(password, &self.salt)).decrypt(&self.nonce, &self.ciphertext)
    }

    /// Serializes to the stored token form.
    pub fn to_token(&self) -> Result<String> {
        let wire = WireEnvelope { salt: to_base64(&self.salt), iv: to_base64(&self.nonce), data: to_base64(&self.ciphertext) };
        let json = serde_json::to_string(&wire).map_err(|e| Error::Crypto(format!("envelope serialization failed: {e}")))?;

        Ok(to_base64(json.as_bytes()))
    }

    /// Parses a stored token. Every framing problem is [`Error::MalformedEnvelope`].
    pub fn from_token(token: &str) -> Result<Self> {
        let json = from_base64(token).map_err(Error::MalformedEnvelope)?;
        let wire: WireEnvelope = serde_json::from_slice(&json).map_err(|e| Error::MalformedEnvelope(format!("invalid json: {e}")))?;

        if wire.salt.is_empty() || wire.iv.is_empty() || wire.data.is_empty() {
            return Err(Error::MalformedEnvelope("salt, iv and data are all required".into()));
        }

        let salt = decode_field::<KDF_SALT_SIZE>("salt", &wire.salt)?;
        let nonce = decode_field::<AES_NONCE_SIZE>("iv", &wire.iv)?;
        let ciphertext = from_base64(&wire.data).map_err(|e| Error::MalformedEnvelope(format!("data: {e}")))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::MalformedEnvelope(format!("data is {} bytes, shorter than the tag", ciphertext.len())));
        }

        Ok(Self { salt, nonce, ciphertext })
    }
}

fn decode_field<const N: usize>(name: &str, value: &str) -> Result<[u8; N]> {
    let bytes = from_base64(value).map_err(|e| Error::MalformedEnvelope(format!("{name}: {e}")))?;
    let len = bytes.len();

    bytes.try_into().map_err(|_| Error::MalformedEnvelope(format!("{name} must be {N} bytes, got {len}")))
}

/// Seals `plaintext` and returns the stored token.
pub fn encrypt(plaintext: &[u8], password: &Password) -> Result<String> {
    Envelope::seal(plaintext, password)?.to_token()
}

/// Opens a stored token.
pub fn decrypt(token: &str, password: &Password) -> Result<Vec<u8>> {
    Envelope::from_token(token)?.open(password)
}

/// Seals UTF-8 text.
#[inline]
pub fn seal(text: &str, password: &Password) -> Result<String> {
    encrypt(text.as_bytes(), password)
}

/// Opens a token holding UTF-8 text.
pub fn open(token: &str, password: &Password) -> Result<String> {
    String::from_utf8(decrypt(token, password)?).map_err(|_| Error::MalformedEnvelope("plaintext is not utf-8".into()))
}

/// Runs [`seal`] on the blocking pool.
pub async fn seal_blocking(text: String, password: Password) -> Result<String> {
    tokio::task::spawn_blocking(move || seal(&text, &password)).await.map_err(|e| Error::Crypto(format!("envelope task failed: {e}")))?
}

/// Runs [`open`] on the blocking pool.
pub async fn open_blocking(token: String, password: Password) -> Result<String> {
    tokio::task::spawn_blocking(move || open(&token, &password)).await.map_err(|e| Error::Crypto(format!("envelope task failed: {e}")))?
}
