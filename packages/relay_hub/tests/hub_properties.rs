use relay_hub::envelope::{encode_chat, encode_user_list};
use relay_hub::{ChatMessage, Frame, Hub, HubConfig, HubHandle, SessionId};
use tokio::sync::mpsc;

struct TestClient {
    id: SessionId,
    outbox: mpsc::Receiver<Frame>,
}

impl TestClient {
    fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbox.try_recv() {
            frames.push(frame.to_string());
        }
        frames
    }
}

async fn connect(hub: &HubHandle, name: &str) -> TestClient {
    let id = hub.next_session_id();
    let (mailbox, outbox) = mpsc::channel(64);
    hub.join(id, mailbox).await.unwrap();
    if !name.is_empty() {
        hub.set_name(id, name).await.unwrap();
    }
    TestClient { id, outbox }
}

/// Wait until every command sent so far has been processed.
async fn settle(hub: &HubHandle) {
    hub.members().await.unwrap();
}

fn user_list(names: &[&str]) -> String {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    encode_user_list(&names).unwrap().to_string()
}

fn chat(message: &ChatMessage) -> String {
    encode_chat(message).unwrap().to_string()
}

#[tokio::test]
async fn join_broadcasts_final_membership_to_everyone() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    settle(&hub).await;

    let expected = user_list(&["alice", "bob"]);
    assert_eq!(alice.drain().last(), Some(&expected));
    assert_eq!(bob.drain().last(), Some(&expected));
}

#[tokio::test]
async fn leave_removes_closes_and_broadcasts() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    settle(&hub).await;
    alice.drain();
    bob.drain();

    hub.leave(alice.id).await.unwrap();
    settle(&hub).await;

    assert_eq!(bob.drain(), vec![user_list(&["bob"])]);
    // closed and empty
    assert!(alice.outbox.recv().await.is_none());
    assert_eq!(hub.members().await.unwrap(), vec!["bob".to_string()]);
}

#[tokio::test]
async fn broadcast_reaches_everyone_including_sender() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    settle(&hub).await;
    alice.drain();
    bob.drain();

    let message = ChatMessage::broadcast("alice", "hi");
    hub.route(message.clone()).await.unwrap();
    settle(&hub).await;

    assert_eq!(alice.drain(), vec![chat(&message)]);
    assert_eq!(bob.drain(), vec![chat(&message)]);
}

#[tokio::test]
async fn directed_message_reaches_only_recipient() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    let mut carol = connect(&hub, "carol").await;
    settle(&hub).await;
    alice.drain();
    bob.drain();
    carol.drain();

    let message = ChatMessage::directed("alice", "bob", "hey");
    hub.route(message.clone()).await.unwrap();
    settle(&hub).await;

    assert_eq!(bob.drain(), vec![chat(&message)]);
    assert!(alice.drain().is_empty());
    assert!(carol.drain().is_empty());
}

#[tokio::test]
async fn directed_miss_is_silent() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    settle(&hub).await;
    alice.drain();
    bob.drain();

    let result = hub.route(ChatMessage::directed("alice", "dave", "x")).await;
    settle(&hub).await;

    assert!(result.is_ok());
    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());

    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.unrouted, 1);
}

#[tokio::test]
async fn double_leave_is_safe() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    settle(&hub).await;
    bob.drain();

    hub.leave(alice.id).await.unwrap();
    hub.leave(alice.id).await.unwrap();
    settle(&hub).await;

    // one membership update for the single effective leave
    assert_eq!(bob.drain(), vec![user_list(&["bob"])]);
    alice.drain();
    assert!(alice.outbox.recv().await.is_none());
}

#[tokio::test]
async fn repeated_rename_broadcasts_each_time() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    settle(&hub).await;
    alice.drain();

    hub.set_name(alice.id, "alice2").await.unwrap();
    hub.set_name(alice.id, "alice2").await.unwrap();
    settle(&hub).await;

    assert_eq!(
        alice.drain(),
        vec![user_list(&["alice2"]), user_list(&["alice2"])]
    );
    assert_eq!(hub.members().await.unwrap(), vec!["alice2".to_string()]);
}

#[tokio::test]
async fn per_destination_order_matches_processing_order() {
    let hub = Hub::spawn(HubConfig::default());
    let mut alice = connect(&hub, "alice").await;
    let mut bob = connect(&hub, "bob").await;
    settle(&hub).await;
    alice.drain();
    bob.drain();

    let messages: Vec<ChatMessage> = (0..20)
        .map(|i| ChatMessage::broadcast("alice", format!("m{i}")))
        .collect();
    for message in &messages {
        hub.route(message.clone()).await.unwrap();
    }
    settle(&hub).await;

    let expected: Vec<String> = messages.iter().map(chat).collect();
    assert_eq!(alice.drain(), expected);
    assert_eq!(bob.drain(), expected);
}

#[tokio::test]
async fn concurrent_producers_never_lose_membership_state() {
    let hub = Hub::spawn(HubConfig::default());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            let client = connect(&hub, &format!("user{i}")).await;
            hub.route(ChatMessage::broadcast(format!("user{i}"), "hello"))
                .await
                .unwrap();
            if i % 2 == 0 {
                hub.leave(client.id).await.unwrap();
            }
            client
        }));
    }

    let mut clients = Vec::new();
    for task in tasks {
        clients.push(task.await.unwrap());
    }
    settle(&hub).await;

    let members = hub.members().await.unwrap();
    assert_eq!(members.len(), 8);
    for i in (1..16).step_by(2) {
        assert!(members.contains(&format!("user{i}")));
    }
    // every client that left has a closed mailbox
    for (i, client) in clients.iter_mut().enumerate() {
        if i % 2 == 0 {
            client.drain();
            assert!(client.outbox.recv().await.is_none());
        }
    }
}
