//! Global Configuration Constants
//!
//! This module contains the parameters shared by every cryptographic and
//! session component. Most of them are wire-format constants: changing any of
//! them makes previously stored envelopes, issued invitations or dual-password
//! containers undecryptable.
//!
//! ## Groups
//!
//! - **Key derivation**: PBKDF2-HMAC-SHA256 iteration count and key length
//! - **AEAD layout**: salt, nonce and tag sizes for AES-256-GCM
//! - **Multi-block container**: block identifiers and their width
//! - **Invitations**: the built-in system passphrase, static salt and public key
//! - **Storage**: keys used in the durable key-value store
//! - **Protocol**: command names, response fields and the page index key

// === Key Derivation Parameters ===

/// PBKDF2-HMAC-SHA256 iteration count.
///
/// Every envelope, block and invitation in circulation was produced with this
/// exact value, so it is part of the format rather than a tuning knob.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Length of derived keys in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Length of the random PBKDF2 salt in envelopes and container headers.
pub const KDF_SALT_SIZE: usize = 16;

// === Compression ===

/// Upper bound on inflated container and invitation payloads.
///
/// Both arrive from outside, so a few kilobytes of zlib must not be allowed to
/// expand into gigabytes. Real payloads are a few kilobytes.
pub const MAX_INFLATED_SIZE: usize = 16 * 1024 * 1024;

// === AEAD Layout ===

/// AES-GCM nonce size for envelopes and container blocks.
pub const AES_NONCE_SIZE: usize = 12;

/// AES-GCM IV size used by invitations.
///
/// Invitations are produced by a WebCrypto issuer that uses a 16-byte IV,
/// which GCM accepts through its GHASH-derived counter.
pub const INVITATION_IV_SIZE: usize = 16;

/// AES-GCM authentication tag size (128 bits).
pub const TAG_SIZE: usize = 16;

// === Multi-Block Container ===

/// Identifier of blocks keyed from the first container salt.
pub const IDENTIFIER_A: &[u8; IDENTIFIER_LEN] = b"PWA_BLOCK";

/// Identifier of blocks keyed from the second container salt.
pub const IDENTIFIER_B: &[u8; IDENTIFIER_LEN] = b"PWB_BLOCK";

/// Width of a block identifier in bytes.
pub const IDENTIFIER_LEN: usize = 9;

/// Width of the big-endian block length prefix.
pub const BLOCK_LENGTH_PREFIX: usize = 4;

// === Invitations ===

/// Static PBKDF2 salt for the invitation key.
///
/// Shared by every installation. Together with [`SYSTEM_PASSPHRASE`] this makes
/// the invitation key a global constant: confidentiality of invitations rests
/// on nobody reading this file. Authenticity still rests on the RSA signature.
pub const INVITATION_SALT: &[u8] = b"some-static-salt-for-demo-purposes";

/// Built-in passphrase for the invitation key.
pub const SYSTEM_PASSPHRASE: &str = "helloworld";

/// Built-in RSA public key (JWK) that signs invitations.
pub const SYSTEM_PUBLIC_KEY_JWK: &str = r#"{
  "alg": "RS256",
  "e": "AQAB",
  "ext": true,
  "key_ops": ["verify"],
  "kty": "RSA",
  "n": "r1iyZc0cm_yJRmjgVaOUpIcRlNuZFkFSaUdfRMuTGS2R16adIJMe33sMxZMVUro874RkY2wVU5dGrZ_Sq8e9GIqGOcd3meUpHFexn3b3Ang5WzBJGOvqPcweLtSFVTn-XahFyWrpOUtu3FfYAMTM6GMvCyHSzdyYu1FMCJjFbB2lzkxZSyoH2f3Ijf94ju4CJrLbtVHgrA7EV7uGlP1sq8LL9pLWzahm64QitcbXwCK0Wsxttgn-H5rMKR9yH1mMdGMYzPSYq8uXZj5HQMaPWVzSx7vzN_W_cNJN1yhboJgc1kGdITw_g-HA0wypbchh0onPR3pQhzq1GFp3DdQ_Pw"
}"#;

// === Storage Keys ===

/// Store key of the password-encrypted service endpoint.
pub const STORE_SERVICE_PATH: &str = "service_path";

/// Store key of the long-lived user token.
pub const STORE_USER_TOKEN: &str = "user_token";

/// Store key of the rotating session key.
pub const STORE_SESSION_KEY: &str = "session_key";

// === Protocol ===

/// Response field carrying a rotated session key.
pub const FIELD_SESSION_KEY: &str = "sessionKey";

/// Response field carrying a freshly issued user token.
pub const FIELD_TOKEN: &str = "token";

/// Response field carrying a server-side error message.
pub const FIELD_ERROR: &str = "error";

/// Response field carrying the outcome of a `set` command.
pub const FIELD_RESULT: &str = "result";

/// Marker that turns a server error into a session invalidation.
pub const SESSION_ERROR_MARKER: &str = "session";

/// Remote key holding the JSON page index.
pub const PAGE_INDEX_KEY: &str = "__page_list__";

/// Prefix of generated page keys (`page1`, `page2`, ...).
pub const PAGE_KEY_PREFIX: &str = "page";

/// Number of digits in a reset CAPTCHA.
pub const CAPTCHA_DIGITS: usize = 4;
