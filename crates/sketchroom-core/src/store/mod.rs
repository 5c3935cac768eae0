//! Shared-state store contract.
//!
//! A store partitions state by room and offers three operations on paths
//! inside the room: `put` (last write wins), `set` (append an independently
//! keyed record) and `subscribe`. Subscribers receive every current and
//! future value at the path, including their own writes.

mod memory;
pub mod protocol;
#[cfg(not(target_arch = "wasm32"))]
mod relay;

pub use memory::{DEFAULT_MAX_SET_LEN, MemoryHub, MemoryStore};
#[cfg(not(target_arch = "wasm32"))]
pub use relay::RelayStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Store connection closed")]
    Closed,
    #[error("Lock error: {0}")]
    Lock(String),
}

/// One value delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreChange {
    pub path: String,
    /// Set entry key, `None` for values written with `put`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: Value,
}

/// Room-scoped key/value store with subscriptions.
pub trait SharedStore {
    /// Overwrite the value at `path`.
    fn put(&mut self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Append `record` to the set at `path`. Returns the record's key.
    fn set(&mut self, path: &str, record: Value) -> Result<String, StoreError>;

    /// Start receiving changes at `path`. Current values are delivered too.
    fn subscribe(&mut self, path: &str) -> Result<(), StoreError>;

    /// Drain changes delivered since the last poll.
    fn poll(&mut self) -> Result<Vec<StoreChange>, StoreError>;
}

/// Opaque identifier partitioning shared state. Peers sync only within a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    const NAMESPACE_PREFIX: &'static str = "creative-space-";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A short random room id.
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(9);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which all of the room's state lives.
    pub fn namespace(&self) -> String {
        format!("{}{}", Self::NAMESPACE_PREFIX, self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
