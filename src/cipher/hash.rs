//! SHA-256 digests for username binding and invitation signatures.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Size of a SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// A computed SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Hash {
    hash: [u8; HASH_SIZE],
}

impl Hash {
    /// Hashes the concatenation of `parts` as one message.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        parts.iter().for_each(|part| hasher.update(part));
        Self { hash: hasher.finalize().into() }
    }

    #[inline]
    pub fn of(data: &[u8]) -> Self {
        Self::of_parts(&[data])
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.hash
    }

    /// Lowercase hex, the form stored in invitations.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Compares against a hex digest in constant time.
    ///
    /// Upper-case hex from a foreign issuer is accepted; anything that is not
    /// 64 hex digits never matches.
    pub fn matches_hex(&self, expected: &str) -> bool {
        let Ok(decoded) = hex::decode(expected.trim()) else {
            return false;
        };

        decoded.len() == HASH_SIZE && bool::from(self.hash.ct_eq(decoded.as_slice()))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

/// Lowercase hex SHA-256 of a username.
pub fn username_hash(username: &str) -> String {
    Hash::of(username.as_bytes()).to_hex()
}
