//! Multi-client scenarios built from the testkit fixtures.

use cloakroom::core::Zeroizing;
use cloakroom::{ClientEvent, DecryptPath, EncryptionLevel};
use cloakroom_testkit::{
    clients_in_space, drain, init_tracing, messages, settle, TestFixture, TEST_PASSPHRASE,
};

#[tokio::test]
async fn rejoin_gets_a_fresh_session() -> anyhow::Result<()> {
    init_tracing();
    let fixture = TestFixture::new();
    let space = &fixture.space_id;
    let (_network, mut clients) = clients_in_space(2, space, TEST_PASSPHRASE).await?;

    let old = clients[1].session_id(space).cloned().unwrap();
    clients[1].leave_space(space).await?;
    let new = clients[1]
        .enter_space(space, Zeroizing::new(TEST_PASSPHRASE.to_string()))
        .await?;
    assert_ne!(old, new);

    let events = settle(&mut clients).await?;
    assert!(events[0].contains(&ClientEvent::PeerLeft {
        space_id: space.clone(),
        session_id: old.clone(),
    }));
    assert!(events[0].contains(&ClientEvent::PeerJoined {
        space_id: space.clone(),
        session_id: new.clone(),
    }));

    let envelope = clients[0].send(space, "welcome back").await?;
    let participants = envelope.participants().unwrap();
    assert!(participants.contains(&new));
    assert!(!participants.contains(&old));

    let received = drain(&mut clients[1]).await?;
    assert_eq!(
        messages(&received),
        vec![("welcome back".to_string(), DecryptPath::SessionKey)]
    );
    Ok(())
}

#[tokio::test]
async fn history_sealed_by_the_fixture_opens_in_a_client() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    let space = &fixture.space_id;
    let (_network, mut clients) = clients_in_space(1, space, TEST_PASSPHRASE).await?;

    // Sealed for a roster the client never saw.
    let envelope = fixture.seal(b"from before", 3)?;
    let decrypted = clients[0].decrypt(space, &envelope).await?;

    assert_eq!(decrypted.text()?, "from before");
    assert_eq!(clients[0].status(space).level, EncryptionLevel::Deterministic);
    Ok(())
}

#[tokio::test]
async fn everyone_reads_everyone() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    let space = &fixture.space_id;
    let (_network, mut clients) = clients_in_space(4, space, TEST_PASSPHRASE).await?;

    for (i, client) in clients.iter_mut().enumerate() {
        client.send(space, &format!("from {i}")).await?;
    }
    let events = settle(&mut clients).await?;

    for (i, received) in events.iter().enumerate() {
        let mut texts: Vec<String> = messages(received).into_iter().map(|(t, _)| t).collect();
        texts.sort();
        let expected: Vec<String> = (0..4)
            .filter(|j| *j != i)
            .map(|j| format!("from {j}"))
            .collect();
        assert_eq!(texts, expected);
    }
    Ok(())
}
