//! # Cryptographic Primitives
//!
//! The building blocks every format in this crate is assembled from:
//!
//! - **Key derivation**: PBKDF2-HMAC-SHA256 at a fixed iteration count
//! - **AEAD**: AES-256-GCM with 12-byte nonces, or 16-byte IVs for invitations
//! - **Hashing**: SHA-256 for username binding and signature messages
//! - **Signatures**: RSASSA-PKCS1-v1_5 verification against a JWK key
//!
//! Nothing here knows about envelopes, containers or invitations; those
//! layers own their own framing and error mapping.

mod aes_gcm;
mod derive;
mod hash;
mod signature;

pub use aes_gcm::AesGcm;
pub use derive::{Derive, derive_key};
pub use hash::{HASH_SIZE, Hash, username_hash};
pub use signature::VerifyingKey;
