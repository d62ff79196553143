/// Integration tests for game flow scenarios
///
/// These tests drive the hub, sessions and dispatcher the way a transport
/// would: each participant has an outbound channel and sends raw JSON frames.
use std::{sync::Arc, time::Duration};

use enclose::{
    Hub, HubConfig, Participant, SessionConfig,
    net::{disconnect, handle_frame},
};
use serde_json::Value;
use tokio::sync::mpsc;

struct Client {
    participant: Arc<Participant>,
    inbox: mpsc::Receiver<String>,
}

impl Client {
    async fn join(hub: &Hub) -> Self {
        let (tx, inbox) = mpsc::channel(64);
        let (_, participant) = hub.admit(tx).await.unwrap();
        Self { participant, inbox }
    }

    async fn send(&self, hub: &Hub, frame: &str) {
        handle_frame(hub, &self.participant, frame).await;
    }

    fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.inbox.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    fn last_state(&mut self) -> Value {
        self.drain()
            .into_iter()
            .filter(|frame| frame["type"] == "gameState")
            .last()
            .map(|frame| frame["state"].clone())
            .unwrap()
    }
}

fn hub_with(grid_size: usize, max_sessions: usize) -> Hub {
    Hub::new(HubConfig {
        max_sessions,
        session: SessionConfig {
            grid_size,
            ..SessionConfig::default()
        },
        ..HubConfig::default()
    })
}

async fn started_game(hub: &Hub) -> (Client, Client) {
    let mut p1 = Client::join(hub).await;
    let mut p2 = Client::join(hub).await;
    p1.send(hub, r#"{"type":"ready"}"#).await;
    p2.send(hub, r#"{"type":"ready"}"#).await;
    p1.drain();
    p2.drain();
    (p1, p2)
}

#[tokio::test]
async fn test_happy_path_admission() {
    let hub = Hub::default();
    let mut p1 = Client::join(&hub).await;
    let mut p2 = Client::join(&hub).await;

    let welcome1 = p1.drain().remove(0);
    let welcome2 = p2.drain().remove(0);
    assert_eq!(welcome1["type"], "connection");
    assert_eq!(welcome1["playerNumber"], 1);
    assert_eq!(welcome2["playerNumber"], 2);
    assert_eq!(welcome1["gameId"], welcome2["gameId"]);
    assert_ne!(welcome1["playerId"], welcome2["playerId"]);

    p1.send(&hub, r#"{"type":"ready"}"#).await;
    p2.send(&hub, r#"{"type":"ready"}"#).await;

    for client in [&mut p1, &mut p2] {
        let state = client.last_state();
        assert_eq!(state["message"], "Game started!");
        assert_eq!(state["currentTurn"], 1);
        assert_eq!(state["gameOver"], false);
        assert_eq!(state["grid"].as_array().unwrap().len(), 64);
    }
}

#[tokio::test]
async fn test_first_move_without_capture() {
    let hub = Hub::default();
    let (mut p1, mut p2) = started_game(&hub).await;

    p1.send(&hub, r#"{"type":"move","x":0,"y":0}"#).await;

    let state = p2.last_state();
    assert_eq!(state["grid"][0][0]["owner"], 1);
    assert_eq!(state["scores"], serde_json::json!([0, 0]));
    assert_eq!(state["currentTurn"], 2);
    let sealed = state["grid"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .filter(|cell| cell["sealed"] == true)
        .count();
    assert_eq!(sealed, 0);
    assert_eq!(p1.last_state(), state);
}

#[tokio::test]
async fn test_enclosure_capture_keeps_turn() {
    let hub = hub_with(4, 10);
    let (mut p1, mut p2) = started_game(&hub).await;

    for (client, x, y) in [
        (&p1, 0, 1),
        (&p2, 1, 1),
        (&p1, 1, 0),
        (&p2, 3, 3),
        (&p1, 2, 1),
        (&p2, 3, 2),
        (&p1, 1, 2),
    ] {
        client
            .send(&hub, &format!(r#"{{"type":"move","x":{x},"y":{y}}}"#))
            .await;
    }

    let state = p1.last_state();
    assert_eq!(state["grid"][1][1]["owner"], 2);
    assert_eq!(state["grid"][1][1]["sealed"], true);
    assert_eq!(state["scores"][0], 1);
    assert_eq!(state["currentTurn"], 1);
    p2.drain();

    // Player 2 is still waiting; the move is dropped without a broadcast.
    p2.send(&hub, r#"{"type":"move","x":0,"y":0}"#).await;
    assert!(p1.drain().is_empty());

    p1.send(&hub, r#"{"type":"move","x":0,"y":0}"#).await;
    let state = p2.last_state();
    assert_eq!(state["grid"][0][0]["owner"], 1);
    assert_eq!(state["currentTurn"], 2);
}

#[tokio::test]
async fn test_last_cell_ends_game() {
    let hub = hub_with(2, 10);
    let (mut p1, p2) = started_game(&hub).await;

    p1.send(&hub, r#"{"type":"move","x":0,"y":0}"#).await;
    p2.send(&hub, r#"{"type":"move","x":1,"y":0}"#).await;
    p1.send(&hub, r#"{"type":"move","x":0,"y":1}"#).await;
    p1.drain();
    p2.send(&hub, r#"{"type":"move","x":1,"y":1}"#).await;

    let state = p1.last_state();
    assert_eq!(state["gameOver"], true);
    assert_eq!(state["message"], "It's a Tie!");

    // No move is accepted once the game is over.
    p1.send(&hub, r#"{"type":"move","x":0,"y":0}"#).await;
    assert!(p1.drain().is_empty());

    // A reset starts over with both seats kept.
    p1.send(&hub, r#"{"type":"reset"}"#).await;
    let state = p1.last_state();
    assert_eq!(state["gameOver"], false);
    assert_eq!(state["playersReady"], serde_json::json!([false, false]));
    assert_eq!(state["grid"][1][1]["owner"], 0);
}

#[tokio::test]
async fn test_disconnect_with_survivor() {
    let hub = Hub::default();
    let (p1, mut p2) = started_game(&hub).await;
    let session_id = p1.participant.session_id().to_string();

    disconnect(&hub, &p1.participant).await;

    let state = p2.last_state();
    assert_eq!(state["message"], "Player 1 disconnected");
    let session = hub.get(&session_id).await.unwrap();
    assert_eq!(session.participant_count(), 1);

    // The freed seat goes to the next arrival; player 2 keeps its number.
    let mut p3 = Client::join(&hub).await;
    let welcome = p3.drain().remove(0);
    assert_eq!(welcome["gameId"], session_id.as_str());
    assert_eq!(welcome["playerNumber"], 1);
}

#[tokio::test]
async fn test_hub_saturation() {
    let hub = hub_with(4, 1);
    let _p1 = Client::join(&hub).await;
    let _p2 = Client::join(&hub).await;

    let (tx, _rx) = mpsc::channel(1);
    let refused = hub.admit(tx).await.unwrap_err();
    assert_eq!(refused.client_message(), "Game is full");
    assert_eq!(hub.session_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_participant_evicted() {
    let hub = hub_with(4, 10);
    let (p1, mut p2) = started_game(&hub).await;
    let session = hub.get(p1.participant.session_id()).await.unwrap();

    // Player 2 keeps talking; player 1 goes silent.
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(4)).await;
        p2.send(&hub, r#"{"type":"ping"}"#).await;
    }
    // Let the liveness tick due at t=20s run.
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(!session.contains(p1.participant.id()).await);
    assert!(session.contains(p2.participant.id()).await);
    assert!(p2.drain().is_empty());

    // An abandoned session is swept once the survivor is gone too.
    tokio::time::sleep(Duration::from_secs(21)).await;
    assert!(session.is_empty());
    assert_eq!(hub.sweep().await, 1);
}
