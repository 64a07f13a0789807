//! Several clients talking through the in-memory relay.

use std::sync::Arc;

use cloakroom::sync::MemoryNetwork;
use cloakroom::{CipherError, ClientEvent, DecryptPath, EncryptedEnvelope, EncryptionLevel};
use cloakroom_testkit::{
    client, drain, init_tracing, messages, passphrase, settle, space, TestClient,
};

async fn clients(network: &Arc<MemoryNetwork>, count: usize) -> anyhow::Result<Vec<TestClient>> {
    let mut all = Vec::with_capacity(count);
    for _ in 0..count {
        all.push(client(network).await?);
    }
    Ok(all)
}

#[tokio::test]
async fn lone_client_sends_deterministic() -> anyhow::Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let mut alice = client(&network).await?;
    let abc = space("abc");

    alice.enter_space(&abc, passphrase("friends-42")).await?;
    let status = alice.status(&abc);
    assert_eq!(status.active_sessions, 1);
    assert_eq!(status.level, EncryptionLevel::Deterministic);

    let envelope = alice.send(&abc, "hi").await?;
    assert!(matches!(envelope, EncryptedEnvelope::Deterministic(_)));

    let decrypted = alice.decrypt(&abc, &envelope).await?;
    assert_eq!(decrypted.text()?, "hi");
    Ok(())
}

#[tokio::test]
async fn two_clients_upgrade_to_hybrid() -> anyhow::Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let mut pair = clients(&network, 2).await?;
    let abc = space("abc");

    let a = pair[0].enter_space(&abc, passphrase("friends-42")).await?;
    let b = pair[1].enter_space(&abc, passphrase("friends-42")).await?;

    let events = settle(&mut pair).await?;
    assert!(events[0].contains(&ClientEvent::PeerJoined {
        space_id: abc.clone(),
        session_id: b.clone(),
    }));
    assert!(events[1].contains(&ClientEvent::PeerJoined {
        space_id: abc.clone(),
        session_id: a.clone(),
    }));

    assert_eq!(pair[0].status(&abc).level, EncryptionLevel::Hybrid);
    assert_eq!(pair[1].status(&abc).active_sessions, 2);

    let envelope = pair[0].send(&abc, "hello bob").await?;
    let mut sorted = vec![a.clone(), b.clone()];
    sorted.sort();
    assert_eq!(envelope.participants(), Some(sorted.as_slice()));

    let received = drain(&mut pair[1]).await?;
    assert_eq!(
        messages(&received),
        vec![("hello bob".to_string(), DecryptPath::SessionKey)]
    );
    Ok(())
}

#[tokio::test]
async fn key_exchange_populates_peer_secrets() -> anyhow::Result<()> {
    let network = MemoryNetwork::new();
    let mut pair = clients(&network, 2).await?;
    let abc = space("abc");

    let a = pair[0].enter_space(&abc, passphrase("friends-42")).await?;
    let b = pair[1].enter_space(&abc, passphrase("friends-42")).await?;
    settle(&mut pair).await?;

    let alice = pair[0].key_material(&abc).unwrap();
    let bob = pair[1].key_material(&abc).unwrap();

    assert_eq!(alice.peer_public_key(&b), Some(&bob.public_key()));
    assert_eq!(
        alice.peer_secret(&b).unwrap().as_bytes(),
        bob.peer_secret(&a).unwrap().as_bytes()
    );
    Ok(())
}

#[tokio::test]
async fn departure_downgrades_and_history_stays_readable() -> anyhow::Result<()> {
    let network = MemoryNetwork::new();
    let mut pair = clients(&network, 2).await?;
    let abc = space("abc");

    pair[0].enter_space(&abc, passphrase("friends-42")).await?;
    let b = pair[1].enter_space(&abc, passphrase("friends-42")).await?;
    settle(&mut pair).await?;

    let hybrid = pair[0].encrypt(&abc, b"sent while together").await?;
    assert!(matches!(hybrid, EncryptedEnvelope::Hybrid(_)));

    pair[1].leave_space(&abc).await?;
    let events = drain(&mut pair[0]).await?;
    assert!(events.contains(&ClientEvent::PeerLeft {
        space_id: abc.clone(),
        session_id: b.clone(),
    }));

    let alice = &mut pair[0];
    let status = alice.status(&abc);
    assert_eq!(status.active_sessions, 1);
    assert_eq!(status.level, EncryptionLevel::Deterministic);
    assert!(alice.key_material(&abc).unwrap().peer_secret(&b).is_none());

    let solo = alice.encrypt(&abc, b"alone now").await?;
    assert!(matches!(solo, EncryptedEnvelope::Deterministic(_)));

    // The earlier hybrid message now opens through the fallback.
    let old = alice.decrypt(&abc, &hybrid).await?;
    assert_eq!(old.path, DecryptPath::Fallback);
    assert_eq!(old.plaintext, b"sent while together");
    Ok(())
}

#[tokio::test]
async fn wrong_passphrase_reports_undecryptable() -> anyhow::Result<()> {
    let network = MemoryNetwork::new();
    let mut pair = clients(&network, 2).await?;
    let abc = space("abc");

    let a = pair[0].enter_space(&abc, passphrase("friends-42")).await?;
    pair[1].enter_space(&abc, passphrase("friends-43")).await?;
    settle(&mut pair).await?;

    pair[0].send(&abc, "secret").await?;
    let events = drain(&mut pair[1]).await?;

    assert_eq!(
        events,
        vec![ClientEvent::Undecryptable {
            space_id: abc.clone(),
            from: a,
            error: CipherError::DecryptionFailed,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn three_party_session_key_and_late_reader() -> anyhow::Result<()> {
    let network = MemoryNetwork::new();
    let mut trio = clients(&network, 3).await?;
    let abc = space("abc");

    for c in trio.iter_mut() {
        c.enter_space(&abc, passphrase("friends-42")).await?;
    }
    settle(&mut trio).await?;

    for c in trio.iter_mut() {
        assert_eq!(c.status(&abc).active_sessions, 3);
    }

    let envelope = trio[2].send(&abc, "hi all").await?;
    let events = settle(&mut trio).await?;
    for received in &events[..2] {
        assert_eq!(
            messages(received),
            vec![("hi all".to_string(), DecryptPath::SessionKey)]
        );
    }

    // A new device with only the passphrase reads it through the fallback.
    let mut dave = client(&network).await?;
    dave.enter_space(&abc, passphrase("friends-42")).await?;
    let decrypted = dave.decrypt(&abc, &envelope).await?;
    assert_eq!(decrypted.text()?, "hi all");
    assert_eq!(decrypted.path, DecryptPath::Fallback);
    Ok(())
}

#[tokio::test]
async fn spaces_do_not_leak_into_each_other() -> anyhow::Result<()> {
    let network = MemoryNetwork::new();
    let mut pair = clients(&network, 2).await?;

    pair[0].enter_space(&space("abc"), passphrase("friends-42")).await?;
    pair[1].enter_space(&space("xyz"), passphrase("friends-42")).await?;
    let events = settle(&mut pair).await?;

    assert!(events.iter().all(Vec::is_empty));
    assert_eq!(pair[0].status(&space("abc")).active_sessions, 1);
    assert_eq!(pair[1].status(&space("xyz")).active_sessions, 1);
    Ok(())
}
