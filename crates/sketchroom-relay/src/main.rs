//! Sketchroom WebSocket Relay Server
//!
//! A room-scoped shared-state store for peers on different machines.
//! Values written with `put` overwrite, records written with `set` accumulate,
//! and every subscriber of a path (the writer included) receives each change.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "creative-space-abc" }
//! { "type": "subscribe", "path": "canvas/state" }
//! { "type": "put", "path": "canvas/state", "value": { ... } }
//! { "type": "set", "path": "canvas/strokes", "key": "9f0c...", "value": { ... } }
//! ```

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::Value;
use sketchroom_core::store::protocol::{ClientMessage, ServerMessage};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    sync::Arc,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Relay server options.
#[derive(Debug, Parser)]
#[command(name = "sketchroom-relay", version, about = "WebSocket relay for shared sketchroom canvases")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "SKETCHROOM_BIND", default_value = "0.0.0.0:3030")]
    bind: SocketAddr,

    /// Per-room broadcast buffer. Slow peers lagging further than this miss changes.
    #[arg(long, env = "SKETCHROOM_CHANNEL_CAPACITY", default_value_t = 256)]
    channel_capacity: usize,

    /// Records kept per set path; the oldest are dropped beyond this.
    #[arg(long, env = "SKETCHROOM_MAX_SET_LEN", default_value_t = 10_000)]
    max_set_len: usize,
}

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<ServerMessage>,
    /// Connected peer IDs
    peers: HashSet<String>,
    /// Latest value per `put` path
    values: HashMap<String, Value>,
    /// Records per `set` path, oldest first
    sets: HashMap<String, VecDeque<(String, Value)>>,
}

impl Room {
    fn new(channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            tx,
            peers: HashSet::new(),
            values: HashMap::new(),
            sets: HashMap::new(),
        }
    }

    fn broadcast(&self, path: &str, key: Option<String>, value: Value) {
        // No receivers is fine.
        let _ = self.tx.send(ServerMessage::Change {
            path: path.to_string(),
            key,
            value,
        });
    }
}

/// Shared application state
struct AppState {
    /// Active rooms
    rooms: DashMap<String, Room>,
    channel_capacity: usize,
    max_set_len: usize,
}

impl AppState {
    fn new(channel_capacity: usize, max_set_len: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            channel_capacity,
            max_set_len: max_set_len.max(1),
        }
    }

    /// Add peer to room
    fn join_room(&self, room_id: &str, peer_id: &str) -> (broadcast::Receiver<ServerMessage>, usize) {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(self.channel_capacity));
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove peer from room
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        self.rooms.remove_if_mut(room_id, |_, room| {
            room.peers.remove(peer_id);
            // Clean up empty rooms
            room.peers.is_empty()
        });
    }

    fn put(&self, room_id: &str, path: String, value: Value) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.values.insert(path.clone(), value.clone());
            room.broadcast(&path, None, value);
        }
    }

    fn set(&self, room_id: &str, path: String, key: String, value: Value) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            let entries = room.sets.entry(path.clone()).or_default();
            entries.push_back((key.clone(), value.clone()));
            while entries.len() > self.max_set_len {
                entries.pop_front();
            }
            room.broadcast(&path, Some(key), value);
        }
    }

    /// Current values at `path`: set records first, then the put value.
    fn current(&self, room_id: &str, path: &str) -> Vec<ServerMessage> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        let mut out: Vec<ServerMessage> = room
            .sets
            .get(path)
            .into_iter()
            .flatten()
            .map(|(key, value)| ServerMessage::Change {
                path: path.to_string(),
                key: Some(key.clone()),
                value: value.clone(),
            })
            .collect();
        if let Some(value) = room.values.get(path) {
            out.push(ServerMessage::Change {
                path: path.to_string(),
                key: None,
                value: value.clone(),
            });
        }
        out
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchroom_relay=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let state = Arc::new(AppState::new(args.channel_capacity, args.max_set_len));

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("Sketchroom relay listening on {}", listener.local_addr()?);
    info!("WebSocket endpoint: ws://{}/ws", args.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "Sketchroom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one message. Returns false once the peer is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<ServerMessage>> = None;
    let mut subscriptions: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                };

                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => client_msg,
                    Err(e) => {
                        warn!("Invalid message from {}: {}", peer_id, e);
                        let err = ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        };
                        if !send_message(&mut sender, &err).await {
                            break;
                        }
                        continue;
                    }
                };

                let client_msg = match client_msg {
                    ClientMessage::Join { room } => {
                        if let Some(old_room) = current_room.take() {
                            state.leave_room(&old_room, &peer_id);
                        }
                        subscriptions.clear();

                        let (rx, peer_count) = state.join_room(&room, &peer_id);
                        room_rx = Some(rx);
                        current_room = Some(room.clone());
                        info!("Peer {} joined room {} ({} peers)", peer_id, room, peer_count);

                        if !send_message(&mut sender, &ServerMessage::Joined { room, peer_count }).await {
                            break;
                        }
                        continue;
                    }
                    other => other,
                };

                let Some(room) = current_room.clone() else {
                    let err = ServerMessage::Error {
                        message: "Join a room first".to_string(),
                    };
                    if !send_message(&mut sender, &err).await {
                        break;
                    }
                    continue;
                };

                match client_msg {
                    ClientMessage::Put { path, value } => state.put(&room, path, value),
                    ClientMessage::Set { path, key, value } => state.set(&room, path, key, value),
                    ClientMessage::Subscribe { path } => {
                        debug!("Peer {} subscribed to {}/{}", peer_id, room, path);
                        let current = state.current(&room, &path);
                        subscriptions.insert(path);
                        let mut open = true;
                        for change in &current {
                            if !send_message(&mut sender, change).await {
                                open = false;
                                break;
                            }
                        }
                        if !open {
                            break;
                        }
                    }
                    ClientMessage::Join { .. } => {}
                }
            }

            // Handle broadcast messages from room
            msg = async {
                match &mut room_rx {
                    Some(rx) => match rx.recv().await {
                        Ok(msg) => Some(msg),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Peer {} lagged, {} changes skipped", peer_id, skipped);
                            None
                        }
                        Err(RecvError::Closed) => std::future::pending().await,
                    },
                    None => {
                        // No room joined, just wait forever
                        std::future::pending::<Option<ServerMessage>>().await
                    }
                }
            } => {
                let Some(server_msg) = msg else { continue };
                let subscribed = match &server_msg {
                    ServerMessage::Change { path, .. } => subscriptions.contains(path),
                    _ => true,
                };
                // Writers receive their own changes too.
                if subscribed && !send_message(&mut sender, &server_msg).await {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(ref room) = current_room {
        state.leave_room(room, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sketchroom_core::store::{RelayStore, RoomId, SharedStore, StoreChange, StoreError};
    use std::time::Duration;

    fn change(msg: &ServerMessage) -> (&str, Option<&str>, &Value) {
        match msg {
            ServerMessage::Change { path, key, value } => (path, key.as_deref(), value),
            other => panic!("Wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_join_and_leave() {
        let state = AppState::new(16, 100);
        let (_rx1, count) = state.join_room("r", "p1");
        assert_eq!(count, 1);
        let (_rx2, count) = state.join_room("r", "p2");
        assert_eq!(count, 2);

        state.leave_room("r", "p1");
        assert!(state.rooms.contains_key("r"));
        state.leave_room("r", "p2");
        assert!(!state.rooms.contains_key("r"));
    }

    #[test]
    fn test_put_broadcasts_to_all_peers() {
        let state = AppState::new(16, 100);
        let (mut rx1, _) = state.join_room("r", "p1");
        let (mut rx2, _) = state.join_room("r", "p2");

        state.put("r", "canvas/state".to_string(), json!(1));
        for rx in [&mut rx1, &mut rx2] {
            let msg = rx.try_recv().unwrap();
            assert_eq!(change(&msg), ("canvas/state", None, &json!(1)));
        }
    }

    #[test]
    fn test_current_values() {
        let state = AppState::new(16, 100);
        let (_rx, _) = state.join_room("r", "p1");
        state.put("r", "canvas/state".to_string(), json!("old"));
        state.put("r", "canvas/state".to_string(), json!("new"));
        state.set("r", "canvas/strokes".to_string(), "k1".to_string(), json!(1));
        state.set("r", "canvas/strokes".to_string(), "k2".to_string(), json!(2));

        let state_values = state.current("r", "canvas/state");
        assert_eq!(state_values.len(), 1);
        assert_eq!(change(&state_values[0]), ("canvas/state", None, &json!("new")));

        let strokes = state.current("r", "canvas/strokes");
        let keys: Vec<_> = strokes.iter().map(|m| change(m).1).collect();
        assert_eq!(keys, vec![Some("k1"), Some("k2")]);

        assert!(state.current("r", "canvas/clear").is_empty());
        assert!(state.current("missing", "canvas/state").is_empty());
    }

    #[test]
    fn test_sets_are_bounded() {
        let state = AppState::new(16, 3);
        let (_rx, _) = state.join_room("r", "p1");
        for i in 0..5 {
            state.set("r", "canvas/strokes".to_string(), format!("k{i}"), json!(i));
        }
        let keys: Vec<_> = state
            .current("r", "canvas/strokes")
            .iter()
            .map(|m| change(m).1.map(str::to_string))
            .collect();
        assert_eq!(keys, vec![Some("k2".into()), Some("k3".into()), Some("k4".into())]);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let state = AppState::new(16, 100);
        let (mut rx_a, _) = state.join_room("a", "p1");
        let (_rx_b, _) = state.join_room("b", "p2");
        state.put("b", "canvas/state".to_string(), json!(1));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_writes_without_room_are_ignored() {
        let state = AppState::new(16, 100);
        state.put("nowhere", "canvas/state".to_string(), json!(1));
        assert!(state.rooms.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_relay_store_round_trip() {
        let state = Arc::new(AppState::new(64, 100));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await });

        let url = format!("ws://{addr}/ws");
        let received = tokio::task::spawn_blocking(move || -> Result<Vec<StoreChange>, StoreError> {
            let room = RoomId::new("e2e");
            let mut writer = RelayStore::connect(&url, room.clone())?;
            let mut reader = RelayStore::connect(&url, room)?;
            writer.subscribe("canvas/state")?;
            reader.subscribe("canvas/state")?;
            writer.put("canvas/state", json!({"n": 1}))?;

            let mut changes = Vec::new();
            for _ in 0..250 {
                changes.extend(reader.poll()?);
                if !changes.is_empty() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(changes)
        })
        .await
        .unwrap()
        .unwrap();

        assert!(!received.is_empty());
        assert_eq!(received[0].path, "canvas/state");
        assert_eq!(received[0].value, json!({"n": 1}));
    }
}
