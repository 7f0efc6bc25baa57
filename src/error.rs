//! Error taxonomy shared by every component.
//!
//! Each variant maps to one remedy a caller can offer: re-enter the password,
//! reject the invitation, run session recovery, or retry the transport.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The stored token is not a base64-wrapped JSON envelope with all fields present.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication tag mismatch: wrong password, tampering or corruption.
    #[error("decryption failed: wrong password or corrupted data")]
    DecryptionFailed,

    #[error("malformed invitation: {0}")]
    MalformedInvitation(String),

    #[error("ciphertext too short: need at least {expected} bytes, got {actual}")]
    TruncatedCiphertext { expected: usize, actual: usize },

    /// The decrypted invitation body is not the expected JSON document.
    #[error("malformed invitation payload: {0}")]
    MalformedPayload(String),

    #[error("invitation signature is invalid")]
    InvalidSignature,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invitation was issued for a different username")]
    UsernameMismatch,

    #[error("invitation endpoint does not match the stored endpoint")]
    EndpointMismatch,

    /// The server reported a session error; recovery (reset or reconnect) is required.
    #[error("session invalidated: {0}")]
    SessionInvalidated(String),

    #[error("no user token: register or reconnect first")]
    NotRegistered,

    /// The server answered with an error unrelated to the session.
    #[error("request rejected by server: {0}")]
    Rejected(String),

    #[error("captcha answer does not match")]
    CaptchaMismatch,

    #[error("token and session key are both required")]
    MissingCredentials,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no page with key {0:?}")]
    UnknownPage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed multi-block container framing.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("compression error: {0}")]
    Compression(String),

    /// Unexpected failure inside the crypto provider.
    #[error("crypto provider error: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// A queued task panicked or was aborted before settling.
    #[error("queued task failed: {0}")]
    Queue(String),
}

impl Error {
    /// Returns true for failures that should route the caller to session recovery.
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::SessionInvalidated(_) | Self::NotRegistered)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
