//! Binary-to-text codecs.
//!
//! Envelopes use standard padded base64; invitations and dual-password
//! containers use RFC 4648 base32. Base32 input produced by hand (copied from
//! mail, pasted into a form) often loses its padding or its case, so decoding
//! normalizes both before handing the text to the strict decoder.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use data_encoding::BASE32;

/// Encodes bytes as padded standard base64.
#[inline]
pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes padded standard base64, ignoring surrounding whitespace.
pub fn from_base64(text: &str) -> Result<Vec<u8>, String> {
    STANDARD.decode(text.trim()).map_err(|e| format!("invalid base64: {e}"))
}

/// Decodes unpadded base64url, the encoding of JWK members.
pub fn from_base64_url(text: &str) -> Result<Vec<u8>, String> {
    URL_SAFE_NO_PAD.decode(text.trim().trim_end_matches('=')).map_err(|e| format!("invalid base64url: {e}"))
}

/// Encodes bytes as padded upper-case base32.
#[inline]
pub fn to_base32(data: &[u8]) -> String {
    BASE32.encode(data)
}

/// Decodes base32, tolerating whitespace, lower case and missing padding.
pub fn from_base32(text: &str) -> Result<Vec<u8>, String> {
    let mut normalized: String = text.chars().filter(|c| !c.is_whitespace()).map(|c| c.to_ascii_uppercase()).collect();
    let trimmed = normalized.trim_end_matches('=').len();
    normalized.truncate(trimmed);

    let padding = (8 - normalized.len() % 8) % 8;
    normalized.extend(std::iter::repeat_n('=', padding));

    BASE32.decode(normalized.as_bytes()).map_err(|e| format!("invalid base32: {e}"))
}
