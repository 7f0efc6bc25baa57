//! RSASSA-PKCS1-v1_5 / SHA-256 verification against a JWK public key.

use ring::signature::{RSA_PKCS1_2048_8192_SHA256, RsaPublicKeyComponents};
use serde::Deserialize;

use crate::encoding::from_base64_url;
use crate::error::{Error, Result};

const MIN_MODULUS_BITS: usize = 2048;
const MAX_MODULUS_BITS: usize = 8192;
const MAX_EXPONENT_LEN: usize = 4;

#[derive(Deserialize)]
struct Jwk {
    kty: String,
    n: String,
    e: String,
}

/// An RSA public key accepted for invitation signatures.
#[derive(Clone)]
pub struct VerifyingKey {
    n: Vec<u8>,
    e: Vec<u8>,
}

impl VerifyingKey {
    /// Parses a JWK document with `kty = "RSA"`.
    ///
    /// The modulus must be 2048 to 8192 bits and the exponent odd.
    pub fn from_jwk(jwk: &str) -> Result<Self> {
        let jwk: Jwk = serde_json::from_str(jwk).map_err(|e| Error::InvalidPublicKey(format!("not a JWK document: {e}")))?;
        if jwk.kty != "RSA" {
            return Err(Error::InvalidPublicKey(format!("unsupported key type {:?}", jwk.kty)));
        }

        let n = strip_leading_zeros(from_base64_url(&jwk.n).map_err(Error::InvalidPublicKey)?);
        let e = strip_leading_zeros(from_base64_url(&jwk.e).map_err(Error::InvalidPublicKey)?);

        let bits = n.first().map_or(0, |top| (n.len() - 1) * 8 + (8 - top.leading_zeros() as usize));
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bits) {
            return Err(Error::InvalidPublicKey(format!("modulus of {bits} bits is out of range")));
        }

        if e.is_empty() || e.len() > MAX_EXPONENT_LEN || e.last().is_some_and(|low| low & 1 == 0) {
            return Err(Error::InvalidPublicKey("invalid public exponent".into()));
        }

        Ok(Self { n, e })
    }

    /// Modulus length in bytes, which is also the signature length.
    #[inline]
    pub fn modulus_len(&self) -> usize {
        self.n.len()
    }

    /// Verifies `signature` over `message`; the message is hashed with SHA-256 by the scheme.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let key = RsaPublicKeyComponents { n: self.n.as_slice(), e: self.e.as_slice() };
        key.verify(&RSA_PKCS1_2048_8192_SHA256, message, signature).map_err(|_| Error::InvalidSignature)
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyingKey").field("bits", &(self.n.len() * 8)).finish_non_exhaustive()
    }
}

fn strip_leading_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();
    bytes.drain(..zeros);
    bytes
}
