//! # Dual-Password Container
//!
//! One payload, encrypted independently under two passwords, so that either
//! password opens it (an administrator's and the owner's, typically).
//!
//! ## Layout
//!
//! ```text
//! base32( zlib( saltA[16] || saltB[16] || ( len: u32 BE || block[len] )* ) )
//! block = identifier[9] || nonce[12] || AES-256-GCM( zlib(data) ) || tag[16]
//! ```
//!
//! `PWA_BLOCK` blocks are keyed from salt A and `PWB_BLOCK` blocks from salt B.
//! Blocks are shuffled on encryption, so position says nothing about which
//! password a block belongs to. Decryption is a trial: every block whose
//! identifier is known is attempted in container order and the first one that
//! both authenticates and inflates wins.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use crate::cipher::{AesGcm, Derive, derive_key};
use crate::compression::Compressor;
use crate::config::{AES_NONCE_SIZE, BLOCK_LENGTH_PREFIX, IDENTIFIER_A, IDENTIFIER_B, IDENTIFIER_LEN, KDF_SALT_SIZE};
use crate::encoding::{from_base32, to_base32};
use crate::error::{Error, Result};
use crate::secret::Password;

/// A label and the salt its blocks are keyed from.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub label: &'a [u8],
    pub salt: &'a [u8],
}

/// A parsed container: both salts plus the raw blocks in container order.
#[derive(Debug, Clone)]
pub struct Container {
    salt_a: [u8; KDF_SALT_SIZE],
    salt_b: [u8; KDF_SALT_SIZE],
    blocks: Vec<Vec<u8>>,
}

impl Container {
    /// Decodes and frames an encoded container without touching any keys.
    pub fn parse(encoded: &str) -> Result<Self> {
        let compressed = from_base32(encoded).map_err(Error::Parse)?;
        let payload = Compressor::decompress(&compressed)?;

        if payload.len() < KDF_SALT_SIZE * 2 {
            return Err(Error::Parse(format!("container holds {} bytes, too short for both salts", payload.len())));
        }

        let (salts, mut rest) = payload.split_at(KDF_SALT_SIZE * 2);
        let (salt_a, salt_b) = salts.split_at(KDF_SALT_SIZE);

        let mut blocks = Vec::new();
        while !rest.is_empty() {
            let Some((prefix, tail)) = rest.split_first_chunk::<BLOCK_LENGTH_PREFIX>() else {
                return Err(Error::Parse(format!("truncated block length prefix ({} bytes left)", rest.len())));
            };

            let len = u32::from_be_bytes(*prefix) as usize;
            if len > tail.len() {
                return Err(Error::Parse(format!("block declares {len} bytes but only {} remain", tail.len())));
            }

            let (block, next) = tail.split_at(len);
            blocks.push(block.to_vec());
            rest = next;
        }

        Ok(Self { salt_a: to_salt(salt_a)?, salt_b: to_salt(salt_b)?, blocks })
    }

    /// Number of framed blocks, recognized or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The ordered strategy list: which label is keyed from which salt.
    pub fn candidates(&self) -> [Candidate<'_>; 2] {
        [Candidate { label: IDENTIFIER_A, salt: &self.salt_a }, Candidate { label: IDENTIFIER_B, salt: &self.salt_b }]
    }

    /// Tries every recognized block with `password`.
    ///
    /// `Ok(None)` means no block opened: the password matches neither side, or
    /// the container was tampered with. A block that authenticates but does not
    /// inflate counts as a failed attempt. A key is derived at most once per label.
    pub fn open(&self, password: &Password) -> Result<Option<Vec<u8>>> {
        let candidates = self.candidates();
        let mut ciphers: [Option<AesGcm>; 2] = [None, None];

        for (position, block) in self.blocks.iter().enumerate() {
            if block.len() < IDENTIFIER_LEN + AES_NONCE_SIZE {
                tracing::debug!(position, len = block.len(), "skipping short block");
                continue;
            }

            let (identifier, body) = block.split_at(IDENTIFIER_LEN);
            let Some(index) = candidates.iter().position(|candidate| candidate.label == identifier) else {
                tracing::debug!(position, "skipping block with unknown identifier");
                continue;
            };

            let cipher = ciphers[index].get_or_insert_with(|| AesGcm::new(derive_key(password, candidates[index].salt)));
            let (nonce, ciphertext) = body.split_at(AES_NONCE_SIZE);

            let compressed = match cipher.decrypt(nonce, ciphertext) {
                Ok(compressed) => compressed,
                Err(_) => {
                    tracing::debug!(position, "block did not authenticate");
                    continue;
                }
            };

            match Compressor::decompress(&compressed) {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) => tracing::debug!(position, "block authenticated but did not inflate: {e}"),
            }
        }

        Ok(None)
    }
}

fn to_salt(bytes: &[u8]) -> Result<[u8; KDF_SALT_SIZE]> {
    bytes.try_into().map_err(|_| Error::Parse("salt has the wrong length".into()))
}

/// Decrypts an encoded container with either of its passwords.
///
/// Framing problems are errors; a password that opens nothing is `Ok(None)`.
pub fn decrypt(password: &Password, encoded: &str) -> Result<Option<Vec<u8>>> {
    Container::parse(encoded)?.open(password)
}

/// Builds a container that opens with either `password_a` or `password_b`.
pub fn encrypt(password_a: &Password, password_b: &Password, data: &[u8]) -> Result<String> {
    let compressor = Compressor::default();
    let compressed = compressor.compress(data)?;

    let salt_a: [u8; KDF_SALT_SIZE] = Derive::random_bytes()?;
    let salt_b: [u8; KDF_SALT_SIZE] = Derive::random_bytes()?;

    let mut blocks = vec![seal_block(password_a, &salt_a, IDENTIFIER_A, &compressed)?, seal_block(password_b, &salt_b, IDENTIFIER_B, &compressed)?];
    blocks.shuffle(&mut OsRng);

    let mut payload = Vec::with_capacity(KDF_SALT_SIZE * 2 + blocks.iter().map(|b| b.len() + BLOCK_LENGTH_PREFIX).sum::<usize>());
    payload.extend_from_slice(&salt_a);
    payload.extend_from_slice(&salt_b);
    for block in &blocks {
        let len = u32::try_from(block.len()).map_err(|_| Error::Parse("block exceeds 4 GiB".into()))?;
        payload.extend_from_slice(&len.to_be_bytes());
        payload.extend_from_slice(block);
    }

    Ok(to_base32(&compressor.compress(&payload)?))
}

fn seal_block(password: &Password, salt: &[u8], identifier: &[u8; IDENTIFIER_LEN], compressed: &[u8]) -> Result<Vec<u8>> {
    let nonce: [u8; AES_NONCE_SIZE] = Derive::random_bytes()?;
    let ciphertext = AesGcm::new(derive_key(password, salt)).encrypt(&nonce, compressed)?;

    let mut block = Vec::with_capacity(IDENTIFIER_LEN + AES_NONCE_SIZE + ciphertext.len());
    block.extend_from_slice(identifier);
    block.extend_from_slice(&nonce);
    block.extend_from_slice(&ciphertext);

    Ok(block)
}
