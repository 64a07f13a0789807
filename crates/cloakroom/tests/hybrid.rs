//! End-to-end properties of the hybrid cipher with real derived keys.

use cloakroom::core::{derive_key, EncryptionKey, SessionId, SpaceId};
use cloakroom::session::Roster;
use cloakroom::{CipherError, DecryptPath, EncryptedEnvelope, HybridCipher};
use proptest::prelude::*;

fn space(id: &str) -> SpaceId {
    SpaceId::new(id).unwrap()
}

fn roster(ids: &[&str]) -> Roster {
    ids.iter().map(|id| SessionId::new(*id).unwrap()).collect()
}

#[test]
fn single_session_round_trip() -> anyhow::Result<()> {
    let abc = space("abc");
    let key = derive_key(&abc, "friends-42")?;
    let cipher = HybridCipher::default();

    let envelope = cipher.seal(b"hi", &abc, &key, &roster(&["s1"]))?;
    assert!(matches!(envelope, EncryptedEnvelope::Deterministic(_)));

    // A second device derives the key from scratch.
    let other_device = derive_key(&abc, "friends-42")?;
    let opened = cipher.open(&envelope, &abc, &other_device, &Roster::new())?;
    assert_eq!(opened.text()?, "hi");
    assert_eq!(opened.path, DecryptPath::Deterministic);
    Ok(())
}

#[test]
fn multi_session_round_trip_uses_session_key() -> anyhow::Result<()> {
    let abc = space("abc");
    let key = derive_key(&abc, "friends-42")?;
    let cipher = HybridCipher::default();
    let members = roster(&["s1", "s2"]);

    let envelope = cipher.seal(b"hi", &abc, &key, &members)?;
    let json = envelope.to_json()?;
    let received = EncryptedEnvelope::from_json(&json)?;

    let opened = cipher.open(&received, &abc, &key, &members)?;
    assert_eq!(opened.path, DecryptPath::SessionKey);
    assert_eq!(opened.plaintext, b"hi");
    Ok(())
}

#[test]
fn roster_shrink_falls_back() -> anyhow::Result<()> {
    let abc = space("abc");
    let key = derive_key(&abc, "friends-42")?;
    let cipher = HybridCipher::default();

    let envelope = cipher.seal(b"hi", &abc, &key, &roster(&["s1", "s2"]))?;
    let opened = cipher.open(&envelope, &abc, &key, &roster(&["s1"]))?;

    assert_eq!(opened.path, DecryptPath::Fallback);
    assert_eq!(opened.plaintext, b"hi");
    Ok(())
}

#[test]
fn roster_growth_changes_envelope_kind() -> anyhow::Result<()> {
    let abc = space("abc");
    let key = derive_key(&abc, "friends-42")?;
    let cipher = HybridCipher::default();

    let solo = cipher.seal(b"a", &abc, &key, &roster(&["s1"]))?;
    let pair = cipher.seal(b"b", &abc, &key, &roster(&["s1", "s2"]))?;
    let trio = cipher.seal(b"c", &abc, &key, &roster(&["s1", "s2", "s3"]))?;

    assert!(matches!(solo, EncryptedEnvelope::Deterministic(_)));
    assert_eq!(pair.participants().map(<[_]>::len), Some(2));
    assert_eq!(trio.participants().map(<[_]>::len), Some(3));

    // Every one of them stays readable by a late joiner with no roster.
    for envelope in [&solo, &pair, &trio] {
        assert!(cipher.open(envelope, &abc, &key, &Roster::new()).is_ok());
    }
    Ok(())
}

#[test]
fn wrong_passphrase_fails() -> anyhow::Result<()> {
    let abc = space("abc");
    let right = derive_key(&abc, "friends-42")?;
    let wrong = derive_key(&abc, "friends-43")?;
    let cipher = HybridCipher::default();

    for members in [roster(&["s1"]), roster(&["s1", "s2"])] {
        let envelope = cipher.seal(b"hi", &abc, &right, &members)?;
        assert_eq!(
            cipher.open(&envelope, &abc, &wrong, &members),
            Err(CipherError::DecryptionFailed)
        );
    }
    Ok(())
}

#[test]
fn fallback_iv_tamper_fails() -> anyhow::Result<()> {
    let abc = space("abc");
    let key = derive_key(&abc, "friends-42")?;
    let cipher = HybridCipher::default();
    let members = roster(&["s1", "s2"]);

    let mut envelope = cipher.seal(b"hi", &abc, &key, &members)?;
    if let EncryptedEnvelope::Hybrid(hybrid) = &mut envelope {
        hybrid.fallback.iv.0[0] ^= 0x80;
    }

    // The inner layer is opened with the fallback IV on both paths.
    assert_eq!(
        cipher.open(&envelope, &abc, &key, &members),
        Err(CipherError::DecryptionFailed)
    );
    Ok(())
}

#[test]
fn malformed_wire_input_is_rejected() {
    let json = r#"{"type":"hybrid","algorithm":"ChaCha20-Poly1305",
        "ciphertext":"AAAAAAAAAAAAAAAAAAAAAA==","iv":"AQEBAQEBAQEBAQEB",
        "sessionParticipants":["s1","s2"]}"#;
    assert!(EncryptedEnvelope::from_json(json).is_err());

    let cipher = HybridCipher::default();
    let key = EncryptionKey::generate();
    let error = EncryptedEnvelope::from_json(r#"{"type":"error"}"#).unwrap();
    assert!(matches!(
        cipher.open(&error, &space("abc"), &key, &Roster::new()),
        Err(CipherError::MalformedEnvelope(_))
    ));
}

fn roster_strategy() -> impl Strategy<Value = Roster> {
    prop::collection::btree_set("[a-f0-9]{8}", 0..6).prop_map(|ids| {
        ids.into_iter()
            .map(|id| SessionId::new(id).unwrap())
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_roster_round_trips(
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
        members in roster_strategy(),
        key_bytes in any::<[u8; 32]>(),
    ) {
        let abc = space("abc");
        let key = EncryptionKey::from_bytes(key_bytes);
        let cipher = HybridCipher::default();

        let envelope = cipher.seal(&plaintext, &abc, &key, &members).unwrap();
        let opened = cipher.open(&envelope, &abc, &key, &members).unwrap();

        prop_assert_eq!(&opened.plaintext, &plaintext);
        let expected = if members.len() > 1 {
            DecryptPath::SessionKey
        } else {
            DecryptPath::Deterministic
        };
        prop_assert_eq!(opened.path, expected);
    }

    #[test]
    fn fallback_survives_any_roster_change(
        plaintext in prop::collection::vec(any::<u8>(), 1..128),
        sent_with in roster_strategy(),
        read_with in roster_strategy(),
    ) {
        let abc = space("abc");
        let key = EncryptionKey::from_bytes([0x42; 32]);
        let cipher = HybridCipher::default();

        let envelope = cipher.seal(&plaintext, &abc, &key, &sent_with).unwrap();
        let opened = cipher.open(&envelope, &abc, &key, &read_with).unwrap();
        prop_assert_eq!(opened.plaintext, plaintext);
    }

    #[test]
    fn bit_flips_never_yield_wrong_plaintext(
        plaintext in prop::collection::vec(any::<u8>(), 1..64),
        flip in any::<prop::sample::Index>(),
    ) {
        let abc = space("abc");
        let key = EncryptionKey::from_bytes([0x07; 32]);
        let cipher = HybridCipher::default();
        let members = roster(&["s1", "s2"]);

        let mut envelope = cipher.seal(&plaintext, &abc, &key, &members).unwrap();
        if let EncryptedEnvelope::Hybrid(hybrid) = &mut envelope {
            let i = flip.index(hybrid.fallback.ciphertext.len());
            hybrid.fallback.ciphertext[i] ^= 0x01;
        }

        // The session layer still carries the original inner ciphertext, but
        // the fallback alone must never decrypt to something else.
        match cipher.open(&envelope, &abc, &key, &roster(&["s1"])) {
            Ok(opened) => prop_assert_eq!(opened.plaintext, plaintext),
            Err(err) => prop_assert_eq!(err, CipherError::DecryptionFailed),
        }
    }
}
