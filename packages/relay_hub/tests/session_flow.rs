use relay_hub::memory::{self, MemoryClient};
use relay_hub::{
    Hub, HubConfig, HubHandle, SessionConfig, SessionEnd, SessionSummary, serve_connection,
};
use serde_json::Value;
use tokio::task::JoinHandle;

fn open(hub: &HubHandle) -> (JoinHandle<SessionSummary>, MemoryClient) {
    let (connection, client) = memory::pair();
    let (reader, writer) = connection.split();
    let hub = hub.clone();
    let task = tokio::spawn(async move {
        serve_connection(&hub, reader, writer, &SessionConfig::default()).await
    });
    (task, client)
}

async fn next_json(client: &mut MemoryClient) -> Value {
    let frame = client.recv().await.expect("connection closed");
    serde_json::from_str(&frame).unwrap()
}

/// Read until a userlist with exactly `names` arrives.
async fn wait_for_users(client: &mut MemoryClient, names: &[&str]) {
    loop {
        let msg = next_json(client).await;
        if msg["type"] == "userlist" && msg["nicknames"] == serde_json::json!(names) {
            return;
        }
    }
}

#[tokio::test]
async fn two_clients_chat_and_whisper() {
    let hub = Hub::spawn(HubConfig::default());

    let (alice_task, mut alice) = open(&hub);
    alice.send(r#"{"type":"setname","nickname":"alice"}"#);
    wait_for_users(&mut alice, &["alice"]).await;

    let (bob_task, mut bob) = open(&hub);
    bob.send(r#"{"type":"setname","nickname":"bob"}"#);
    wait_for_users(&mut alice, &["alice", "bob"]).await;
    wait_for_users(&mut bob, &["alice", "bob"]).await;

    bob.send(r#"{"type":"chat","from":"bob","content":"hello all","isPrivate":false}"#);
    let seen_by_alice = next_json(&mut alice).await;
    let seen_by_bob = next_json(&mut bob).await;
    assert_eq!(seen_by_alice, seen_by_bob);
    assert_eq!(seen_by_alice["content"], "hello all");
    assert_eq!(seen_by_alice["isPrivate"], false);

    alice.send(r#"{"type":"chat","from":"alice","to":"bob","content":"psst","isPrivate":true}"#);
    let whisper = next_json(&mut bob).await;
    assert_eq!(whisper["to"], "bob");
    assert_eq!(whisper["isPrivate"], true);
    assert_eq!(whisper["content"], "psst");

    // alice got nothing for the whisper
    hub.members().await.unwrap();
    assert!(alice.try_recv().is_none());

    alice.close();
    let summary = alice_task.await.unwrap();
    assert_eq!(summary.end, SessionEnd::Closed);
    wait_for_users(&mut bob, &["bob"]).await;

    bob.close();
    bob_task.await.unwrap();
    assert!(hub.members().await.unwrap().is_empty());
}

#[tokio::test]
async fn whisper_to_unknown_user_is_dropped() {
    let hub = Hub::spawn(HubConfig::default());

    let (task, mut alice) = open(&hub);
    alice.send(r#"{"type":"setname","nickname":"alice"}"#);
    wait_for_users(&mut alice, &["alice"]).await;

    alice.send(r#"{"type":"chat","from":"alice","to":"nobody","content":"x","isPrivate":true}"#);
    alice.send(r#"{"type":"chat","from":"alice","content":"still here"}"#);

    // the next frame is the broadcast; the whisper vanished
    let next = next_json(&mut alice).await;
    assert_eq!(next["content"], "still here");

    alice.close();
    task.await.unwrap();
}

#[tokio::test]
async fn vanished_peer_is_pruned_for_others() {
    let hub = Hub::spawn(HubConfig::default());

    let (_alice_task, mut alice) = open(&hub);
    alice.send(r#"{"type":"setname","nickname":"alice"}"#);
    wait_for_users(&mut alice, &["alice"]).await;

    let (bob_task, mut bob) = open(&hub);
    bob.send(r#"{"type":"setname","nickname":"bob"}"#);
    wait_for_users(&mut alice, &["alice", "bob"]).await;

    // bob disappears without a close handshake
    drop(bob);
    bob_task.await.unwrap();

    wait_for_users(&mut alice, &["alice"]).await;
    assert_eq!(hub.members().await.unwrap(), vec!["alice".to_string()]);
}
