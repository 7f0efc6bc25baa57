//! # Signed Invitations
//!
//! An invitation admits one username to one service endpoint. The issuer
//! seals `{url, username_hash}` under a key every client can derive, then
//! signs `SHA-256(url || username_hash)` with its RSA key.
//!
//! ## Wire Format
//!
//! ```text
//! {"encrypted_data": base32(iv[16] || AES-256-GCM(zlib(payload)) || tag[16]),
//!  "signature":      base32(RSASSA-PKCS1-v1_5-SHA256(SHA-256(url || username_hash)))}
//! ```
//!
//! ## Gates
//!
//! Redemption runs seven checks and stops at the first failure:
//!
//! 1. the JSON carries non-empty `encrypted_data` and `signature`
//! 2. `encrypted_data` decodes and holds at least an IV
//! 3. AES-GCM authenticates under the system key
//! 4. the inflated payload carries non-empty `url` and `username_hash`
//! 5. the RSA signature verifies
//! 6. the username hashes to `username_hash`
//! 7. `url` equals the stored endpoint, or is stored if there is none
//!
//! Gates 1-5 produce a [`VerifiedInvitation`], gate 6 turns it into a
//! [`BoundInvitation`], and only a bound invitation can be pinned. The type
//! system rules out checking a username against an unsigned payload.

use serde::Deserialize;

use crate::cipher::{AesGcm, Hash, VerifyingKey, derive_key};
use crate::compression::Compressor;
use crate::config::{INVITATION_IV_SIZE, INVITATION_SALT, SYSTEM_PASSPHRASE, SYSTEM_PUBLIC_KEY_JWK};
use crate::encoding::from_base32;
use crate::error::{Error, Result};
use crate::secret::Password;
use crate::store::{EndpointVault, Pinned, Store};

#[derive(Deserialize)]
struct WireInvitation {
    #[serde(default)]
    encrypted_data: String,
    #[serde(default)]
    signature: String,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    url: String,
    #[serde(default)]
    username_hash: String,
}

/// The issuer an installation trusts: the passphrase invitation keys are
/// derived from and the RSA key invitations are signed with.
#[derive(Debug, Clone)]
pub struct InvitationAuthority {
    passphrase: Password,
    public_key: VerifyingKey,
}

impl InvitationAuthority {
    /// An authority with an explicit passphrase and JWK public key.
    pub fn new(passphrase: Password, public_key_jwk: &str) -> Result<Self> {
        Ok(Self { passphrase, public_key: VerifyingKey::from_jwk(public_key_jwk)? })
    }

    /// The authority built into this client.
    pub fn system() -> Result<Self> {
        Self::new(Password::new(SYSTEM_PASSPHRASE), SYSTEM_PUBLIC_KEY_JWK)
    }

    /// Runs gates 1 to 5.
    pub fn verify(&self, raw: &str) -> Result<VerifiedInvitation> {
        // Gate 1
        let wire: WireInvitation = serde_json::from_str(raw.trim()).map_err(|e| Error::MalformedInvitation(format!("invalid json: {e}")))?;
        if wire.encrypted_data.is_empty() || wire.signature.is_empty() {
            return Err(Error::MalformedInvitation("encrypted_data and signature are both required".into()));
        }

        // Gate 2
        let sealed = from_base32(&wire.encrypted_data).map_err(|e| Error::MalformedInvitation(format!("encrypted_data: {e}")))?;
        if sealed.len() < INVITATION_IV_SIZE {
            return Err(Error::TruncatedCiphertext { expected: INVITATION_IV_SIZE, actual: sealed.len() });
        }
        let (iv, body) = sealed.split_at(INVITATION_IV_SIZE);

        // Gate 3
        let compressed = AesGcm::new(derive_key(&self.passphrase, INVITATION_SALT)).decrypt(iv, body)?;

        // Gate 4
        let json = Compressor::decompress(&compressed).map_err(|e| Error::MalformedPayload(e.to_string()))?;
        let payload: Payload = serde_json::from_slice(&json).map_err(|e| Error::MalformedPayload(format!("invalid json: {e}")))?;
        if payload.url.is_empty() || payload.username_hash.is_empty() {
            return Err(Error::MalformedPayload("url and username_hash are both required".into()));
        }

        // Gate 5
        let message = Hash::of_parts(&[payload.url.as_bytes(), payload.username_hash.as_bytes()]);
        let signature = from_base32(&wire.signature).map_err(|_| Error::InvalidSignature)?;
        self.public_key.verify(message.as_bytes(), &signature).inspect_err(|_| tracing::warn!("invitation signature rejected"))?;

        tracing::debug!("invitation signature verified");
        Ok(VerifiedInvitation { url: payload.url, username_hash: payload.username_hash })
    }

    /// Runs all seven gates and pins the endpoint on success.
    pub async fn redeem<S: Store>(&self, raw: &str, username: &str, vault: &EndpointVault<'_, S>, password: &Password) -> Result<Redeemed> {
        let authority = self.clone();
        let raw = raw.to_owned();
        let verified = tokio::task::spawn_blocking(move || authority.verify(&raw)).await.map_err(|e| Error::Crypto(format!("verification task failed: {e}")))??;

        verified.check_username(username)?.pin_endpoint(vault, password).await
    }
}

/// An invitation that decrypted and carries a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInvitation {
    url: String,
    username_hash: String,
}

impl VerifiedInvitation {
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    pub fn username_hash(&self) -> &str {
        &self.username_hash
    }

    /// Gate 6: binds the invitation to `username`.
    pub fn check_username(self, username: &str) -> Result<BoundInvitation> {
        if !Hash::of(username.as_bytes()).matches_hex(&self.username_hash) {
            tracing::warn!("invitation username hash mismatch");
            return Err(Error::UsernameMismatch);
        }

        Ok(BoundInvitation { url: self.url })
    }
}

/// An invitation verified for a specific username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundInvitation {
    url: String,
}

impl BoundInvitation {
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Gate 7: checks the endpoint against the vault, storing it on first use.
    pub async fn pin_endpoint<S: Store>(self, vault: &EndpointVault<'_, S>, password: &Password) -> Result<Redeemed> {
        let pinned = vault.pin(&self.url, password).await?;
        Ok(Redeemed { url: self.url, pinned })
    }
}

/// A fully redeemed invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeemed {
    pub url: String,
    pub pinned: Pinned,
}

#[cfg(test)]
mod tests {
    use ring::rand::SystemRandom;
    use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
    use serde_json::json;

    use super::*;
    use crate::cipher::username_hash;
    use crate::encoding::to_base32;
    use crate::store::MemoryStore;

    const TEST_JWK: &str = include_str!("../tests/fixtures/rsa_test_key.jwk.json");
    const TEST_PKCS8: &[u8] = include_bytes!("../tests/fixtures/rsa_test_key.pk8");

    fn authority() -> InvitationAuthority {
        InvitationAuthority::new(Password::new(SYSTEM_PASSPHRASE), TEST_JWK).unwrap()
    }

    fn seal(payload: &serde_json::Value) -> String {
        let compressed = Compressor::default().compress(payload.to_string().as_bytes()).unwrap();
        let iv = [5u8; INVITATION_IV_SIZE];
        let mut sealed = iv.to_vec();
        sealed.extend(AesGcm::new(derive_key(&Password::new(SYSTEM_PASSPHRASE), INVITATION_SALT)).encrypt(&iv, &compressed).unwrap());
        to_base32(&sealed)
    }

    fn sign(url: &str, hash: &str) -> String {
        let key_pair = RsaKeyPair::from_pkcs8(TEST_PKCS8).unwrap();
        let message = Hash::of_parts(&[url.as_bytes(), hash.as_bytes()]);
        let mut signature = vec![0u8; key_pair.public().modulus_len()];
        key_pair.sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), message.as_bytes(), &mut signature).unwrap();
        to_base32(&signature)
    }

    fn invitation(url: &str, username: &str) -> String {
        let hash = username_hash(username);
        json!({ "encrypted_data": seal(&json!({ "url": url, "username_hash": hash })), "signature": sign(url, &hash) }).to_string()
    }

    #[test]
    fn test_verify_valid_invitation() {
        let verified = authority().verify(&invitation("https://a.example/ep", "alice")).unwrap();
        assert_eq!(verified.url(), "https://a.example/ep");
        assert_eq!(verified.username_hash(), username_hash("alice"));
    }

    #[test]
    fn test_gate1_not_json() {
        assert!(matches!(authority().verify("{not json"), Err(Error::MalformedInvitation(_))));
    }

    #[test]
    fn test_gate1_missing_signature() {
        let raw = json!({ "encrypted_data": "MZXW6===" }).to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::MalformedInvitation(_))));
    }

    #[test]
    fn test_gate2_undecodable() {
        let raw = json!({ "encrypted_data": "!!!!", "signature": "MZXW6===" }).to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::MalformedInvitation(_))));
    }

    #[test]
    fn test_gate2_truncated() {
        let raw = json!({ "encrypted_data": to_base32(&[0u8; 8]), "signature": "MZXW6===" }).to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::TruncatedCiphertext { expected: 16, actual: 8 })));
    }

    #[test]
    fn test_gate3_wrong_passphrase() {
        let other = InvitationAuthority::new(Password::new("not-helloworld"), TEST_JWK).unwrap();
        assert!(matches!(other.verify(&invitation("https://a.example/ep", "alice")), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_gate4_missing_username_hash() {
        let raw = json!({ "encrypted_data": seal(&json!({ "url": "https://a.example/ep" })), "signature": sign("https://a.example/ep", "") }).to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_gate5_forged_payload() {
        // Payload rewritten for bob but still carrying alice's signature.
        let alice_hash = username_hash("alice");
        let bob_hash = username_hash("bob");
        let raw = json!({
            "encrypted_data": seal(&json!({ "url": "https://a.example/ep", "username_hash": bob_hash })),
            "signature": sign("https://a.example/ep", &alice_hash),
        })
        .to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_gate5_rejects_other_issuer() {
        let system = InvitationAuthority::system().unwrap();
        let raw = invitation("https://a.example/ep", "alice");
        // The test issuer shares the passphrase but not the signing key.
        assert!(matches!(system.verify(&raw), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_gate5_undecodable_signature() {
        let hash = username_hash("alice");
        let raw = json!({ "encrypted_data": seal(&json!({ "url": "u", "username_hash": hash })), "signature": "1111" }).to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_signature_checked_before_username() {
        // A forged invitation for the right username still fails on the signature.
        let hash = username_hash("alice");
        let raw = json!({ "encrypted_data": seal(&json!({ "url": "https://evil.example", "username_hash": hash })), "signature": sign("https://a.example/ep", &hash) }).to_string();
        assert!(matches!(authority().verify(&raw), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_gate6_username_binding() {
        let raw = invitation("https://a.example/ep", "alice");
        assert!(authority().verify(&raw).unwrap().check_username("alice").is_ok());
        assert!(matches!(authority().verify(&raw).unwrap().check_username("bob"), Err(Error::UsernameMismatch)));
    }

    #[tokio::test]
    async fn test_redeem_pins_then_matches() {
        let store = MemoryStore::new();
        let vault = EndpointVault::new(&store);
        let password = Password::new("user-pass");
        let raw = invitation("https://a.example/ep", "alice");

        let first = authority().redeem(&raw, "alice", &vault, &password).await.unwrap();
        assert_eq!(first, Redeemed { url: "https://a.example/ep".into(), pinned: Pinned::Stored });

        let second = authority().redeem(&raw, "alice", &vault, &password).await.unwrap();
        assert_eq!(second.pinned, Pinned::Matched);
    }

    #[tokio::test]
    async fn test_redeem_endpoint_mismatch() {
        let store = MemoryStore::new();
        let vault = EndpointVault::new(&store);
        let password = Password::new("user-pass");
        vault.store("https://a.example/ep", &password).await.unwrap();

        let raw = invitation("https://b.example/ep", "alice");
        assert!(matches!(authority().redeem(&raw, "alice", &vault, &password).await, Err(Error::EndpointMismatch)));
    }

    #[tokio::test]
    async fn test_redeem_username_mismatch_leaves_vault_untouched() {
        let store = MemoryStore::new();
        let vault = EndpointVault::new(&store);
        let raw = invitation("https://a.example/ep", "alice");

        assert!(matches!(authority().redeem(&raw, "bob", &vault, &Password::new("pw")).await, Err(Error::UsernameMismatch)));
        assert!(!vault.is_provisioned().await.unwrap());
    }
}
