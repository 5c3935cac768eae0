//! WebSocket client for the relay server.
//!
//! The socket lives on a background thread; commands and received changes
//! cross over via channels so `poll` never blocks.

use super::protocol::{ClientMessage, ServerMessage};
use super::{RoomId, SharedStore, StoreChange, StoreError};
use serde_json::Value;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;
use uuid::Uuid;

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Events from the WebSocket thread.
enum WsEvent {
    Message(ServerMessage),
    Disconnected,
    Failed(String),
}

/// [`SharedStore`] backed by a `sketchroom-relay` server.
pub struct RelayStore {
    room: RoomId,
    cmd_tx: Sender<WsCommand>,
    event_rx: Receiver<WsEvent>,
    closed: bool,
    _thread: JoinHandle<()>,
}

impl RelayStore {
    /// Connect to `url` (`ws://` or `wss://`) and join `room`.
    ///
    /// Connection happens in the background; commands issued before it is
    /// established are queued.
    pub fn connect(url: &str, room: RoomId) -> Result<Self, StoreError> {
        let parsed = Url::parse(url).map_err(|e| StoreError::Connection(format!("Invalid URL: {e}")))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(StoreError::Connection(format!(
                "Invalid WebSocket URL scheme: {}",
                parsed.scheme()
            )));
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<WsEvent>();
        let url = url.to_string();
        let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

        let store = Self {
            room,
            cmd_tx,
            event_rx,
            closed: false,
            _thread: handle,
        };
        store.send(&ClientMessage::Join {
            room: store.room.namespace(),
        })?;
        Ok(store)
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    fn send(&self, msg: &ClientMessage) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let json = serde_json::to_string(msg)?;
        self.cmd_tx.send(WsCommand::Send(json)).map_err(|_| StoreError::Closed)
    }

    /// Close the connection.
    pub fn disconnect(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
        self.closed = true;
    }
}

impl SharedStore for RelayStore {
    fn put(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        self.send(&ClientMessage::Put {
            path: path.to_string(),
            value,
        })
    }

    fn set(&mut self, path: &str, record: Value) -> Result<String, StoreError> {
        let key = Uuid::new_v4().simple().to_string();
        self.send(&ClientMessage::Set {
            path: path.to_string(),
            key: key.clone(),
            value: record,
        })?;
        Ok(key)
    }

    fn subscribe(&mut self, path: &str) -> Result<(), StoreError> {
        self.send(&ClientMessage::Subscribe {
            path: path.to_string(),
        })
    }

    fn poll(&mut self) -> Result<Vec<StoreChange>, StoreError> {
        let mut changes = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(WsEvent::Message(ServerMessage::Change { path, key, value })) => {
                    changes.push(StoreChange { path, key, value });
                }
                Ok(WsEvent::Message(ServerMessage::Joined { room, peer_count })) => {
                    log::info!("joined room {room} ({peer_count} peers)");
                }
                Ok(WsEvent::Message(ServerMessage::Error { message })) => {
                    log::warn!("relay error: {message}");
                }
                Ok(WsEvent::Failed(message)) => {
                    self.closed = true;
                    return Err(StoreError::Connection(message));
                }
                Ok(WsEvent::Disconnected) | Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        if changes.is_empty() && self.closed {
            return Err(StoreError::Closed);
        }
        Ok(changes)
    }
}

impl Drop for RelayStore {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<WsEvent>) {
    log::info!("relay: connecting to {url}");
    let (mut socket, response) = match connect(url) {
        Ok(ok) => ok,
        Err(e) => {
            log::error!("relay connection failed: {e}");
            let _ = event_tx.send(WsEvent::Failed(format!("Connection failed: {e}")));
            return;
        }
    };
    log::info!("relay connected, status: {}", response.status());

    // Short read timeout so the loop can interleave sends and reads.
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("relay: non-plain stream, default timeouts"),
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("relay send error: {e}");
                    break;
                }
                continue;
            }
            Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => match serde_json::from_str::<ServerMessage>(&txt) {
                Ok(msg) => {
                    if event_tx.send(WsEvent::Message(msg)).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("unparseable relay message: {e}"),
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("relay closed the connection");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("relay read error: {e}");
                break;
            }
        }
    }

    let _ = event_tx.send(WsEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_websocket_urls() {
        assert!(matches!(
            RelayStore::connect("http://localhost:3030/ws", RoomId::new("r")),
            Err(StoreError::Connection(_))
        ));
        assert!(matches!(
            RelayStore::connect("not a url", RoomId::new("r")),
            Err(StoreError::Connection(_))
        ));
    }

    #[test]
    fn test_unreachable_relay_reports_failure() {
        // Port 9 (discard) is never a WebSocket server.
        let mut store = RelayStore::connect("ws://127.0.0.1:9/ws", RoomId::new("r")).unwrap();
        let mut result = store.poll();
        for _ in 0..100 {
            if result.is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
            result = store.poll();
        }
        assert!(result.is_err());
    }
}
