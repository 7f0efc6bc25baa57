//! Fixtures produced by an independent implementation of the stored formats.

use memovault::Error;
use memovault::config::SYSTEM_PASSPHRASE;
use memovault::envelope;
use memovault::invitation::InvitationAuthority;
use memovault::multiblock;
use memovault::secret::Password;
use memovault::store::{EndpointVault, MemoryStore, Pinned, Store};

const ENVELOPE: &str = include_str!("fixtures/envelope.txt");
const DUAL_BLOCK: &str = include_str!("fixtures/dual_block.txt");
const INVITATION: &str = include_str!("fixtures/invitation_alice.json");
const ISSUER_JWK: &str = include_str!("fixtures/rsa_test_key.jwk.json");

fn issuer() -> InvitationAuthority {
    InvitationAuthority::new(Password::new(SYSTEM_PASSPHRASE), ISSUER_JWK).unwrap()
}

#[test]
fn test_envelope_fixture_opens() {
    let text = envelope::open(ENVELOPE.trim(), &Password::new("correct horse")).unwrap();
    assert_eq!(text, "https://a.example/ep");
}

#[test]
fn test_envelope_fixture_wrong_password() {
    assert!(matches!(envelope::open(ENVELOPE.trim(), &Password::new("battery staple")), Err(Error::DecryptionFailed)));
}

#[test]
fn test_dual_block_fixture_opens_with_either_password() {
    let admin = multiblock::decrypt(&Password::new("admin-pass"), DUAL_BLOCK).unwrap();
    let user = multiblock::decrypt(&Password::new("user-pass"), DUAL_BLOCK).unwrap();

    assert_eq!(admin.as_deref(), Some(&b"hello from both sides"[..]));
    assert_eq!(user.as_deref(), Some(&b"hello from both sides"[..]));
}

#[test]
fn test_dual_block_fixture_rejects_other_password() {
    assert_eq!(multiblock::decrypt(&Password::new("guest-pass"), DUAL_BLOCK).unwrap(), None);
}

#[test]
fn test_invitation_fixture_verifies() {
    let verified = issuer().verify(INVITATION).unwrap();
    assert_eq!(verified.url(), "https://a.example/ep");

    let bound = verified.check_username("alice").unwrap();
    assert_eq!(bound.url(), "https://a.example/ep");
}

#[test]
fn test_invitation_fixture_bound_to_alice() {
    assert!(matches!(issuer().verify(INVITATION).unwrap().check_username("bob"), Err(Error::UsernameMismatch)));
}

#[test]
fn test_invitation_fixture_rejected_by_built_in_key() {
    let system = InvitationAuthority::system().unwrap();
    assert!(matches!(system.verify(INVITATION), Err(Error::InvalidSignature)));
}

#[tokio::test]
async fn test_invitation_fixture_redeems_against_fixture_envelope() {
    let store = MemoryStore::new();
    store.set(memovault::config::STORE_SERVICE_PATH, ENVELOPE.trim()).await.unwrap();
    let vault = EndpointVault::new(&store);

    let redeemed = issuer().redeem(INVITATION, "alice", &vault, &Password::new("correct horse")).await.unwrap();
    assert_eq!(redeemed.pinned, Pinned::Matched);
}
