//! memovault - credential and session cryptography for memo services.
//!
//! - PBKDF2-HMAC-SHA256 key derivation at 100,000 iterations
//! - AES-256-GCM password envelopes for secrets at rest
//! - Dual-password containers opened by a multi-block decryption trial
//! - RSA-signed invitations bound to a username and a pinned endpoint
//! - A session client with key rotation over a single-flight request queue

pub mod cipher;
pub mod compression;
pub mod config;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod invitation;
pub mod multiblock;
pub mod pages;
pub mod queue;
pub mod secret;
pub mod session;
pub mod store;

pub use error::{Error, Result};
