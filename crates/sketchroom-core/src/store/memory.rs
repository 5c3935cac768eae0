//! In-process store for tests and single-machine sessions.

use super::{RoomId, SharedStore, StoreChange, StoreError};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Records kept per set path by default; matches the relay's default.
pub const DEFAULT_MAX_SET_LEN: usize = 10_000;

#[derive(Debug, Default)]
struct Subscriber {
    paths: HashSet<String>,
    inbox: VecDeque<StoreChange>,
}

#[derive(Debug, Default)]
struct Room {
    values: HashMap<String, Value>,
    /// Set entries per path, oldest first.
    sets: HashMap<String, VecDeque<(String, Value)>>,
    subscribers: HashMap<Uuid, Subscriber>,
}

impl Room {
    fn deliver(&mut self, change: StoreChange) {
        for sub in self.subscribers.values_mut() {
            if sub.paths.contains(&change.path) {
                sub.inbox.push_back(change.clone());
            }
        }
    }
}

/// Shared backing state for [`MemoryStore`] handles.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    max_set_len: usize,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::with_max_set_len(DEFAULT_MAX_SET_LEN)
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_set_len` records per set path, dropping the oldest.
    pub fn with_max_set_len(max_set_len: usize) -> Self {
        Self {
            rooms: Arc::default(),
            max_set_len: max_set_len.max(1),
        }
    }

    /// Open a store handle for one peer in `room`.
    pub fn join(&self, room: &RoomId) -> MemoryStore {
        log::info!("joined room {}", room.namespace());
        MemoryStore {
            hub: self.clone(),
            namespace: room.namespace(),
            id: Uuid::new_v4(),
        }
    }

    /// Number of rooms holding state or subscribers.
    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }
}

/// One peer's view of a room in a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryStore {
    hub: MemoryHub,
    namespace: String,
    id: Uuid,
}

impl MemoryStore {
    fn with_room<R>(&self, f: impl FnOnce(&mut Room, Uuid) -> R) -> Result<R, StoreError> {
        let mut rooms = self
            .hub
            .rooms
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let room = rooms.entry(self.namespace.clone()).or_default();
        Ok(f(room, self.id))
    }
}

impl SharedStore for MemoryStore {
    fn put(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        self.with_room(|room, _| {
            room.values.insert(path.to_string(), value.clone());
            room.deliver(StoreChange {
                path: path.to_string(),
                key: None,
                value,
            });
        })
    }

    fn set(&mut self, path: &str, record: Value) -> Result<String, StoreError> {
        let key = Uuid::new_v4().simple().to_string();
        let max_set_len = self.hub.max_set_len;
        self.with_room(|room, _| {
            let entries = room.sets.entry(path.to_string()).or_default();
            entries.push_back((key.clone(), record.clone()));
            while entries.len() > max_set_len {
                entries.pop_front();
            }
            room.deliver(StoreChange {
                path: path.to_string(),
                key: Some(key.clone()),
                value: record,
            });
        })?;
        Ok(key)
    }

    fn subscribe(&mut self, path: &str) -> Result<(), StoreError> {
        self.with_room(|room, id| {
            let mut current = Vec::new();
            if let Some(entries) = room.sets.get(path) {
                current.extend(entries.iter().map(|(key, value)| StoreChange {
                    path: path.to_string(),
                    key: Some(key.clone()),
                    value: value.clone(),
                }));
            }
            if let Some(value) = room.values.get(path) {
                current.push(StoreChange {
                    path: path.to_string(),
                    key: None,
                    value: value.clone(),
                });
            }

            let sub = room.subscribers.entry(id).or_default();
            if sub.paths.insert(path.to_string()) {
                sub.inbox.extend(current);
            }
        })
    }

    fn poll(&mut self) -> Result<Vec<StoreChange>, StoreError> {
        self.with_room(|room, id| {
            room.subscribers
                .get_mut(&id)
                .map(|sub| sub.inbox.drain(..).collect())
                .unwrap_or_default()
        })
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Ok(mut rooms) = self.hub.rooms.write() {
            if let Some(room) = rooms.get_mut(&self.namespace) {
                room.subscribers.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_reaches_all_subscribers_including_self() {
        let hub = MemoryHub::new();
        let room = RoomId::new("r1");
        let mut a = hub.join(&room);
        let mut b = hub.join(&room);
        a.subscribe("canvas/state").unwrap();
        b.subscribe("canvas/state").unwrap();

        a.put("canvas/state", json!({"n": 1})).unwrap();
        for store in [&mut a, &mut b] {
            let changes = store.poll().unwrap();
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].key, None);
            assert_eq!(changes[0].value, json!({"n": 1}));
        }
        assert!(a.poll().unwrap().is_empty());
    }

    #[test]
    fn test_subscribe_delivers_current_values() {
        let hub = MemoryHub::new();
        let room = RoomId::new("r1");
        let mut writer = hub.join(&room);
        writer.put("canvas/state", json!(1)).unwrap();
        writer.put("canvas/state", json!(2)).unwrap();
        let k1 = writer.set("canvas/strokes", json!("a")).unwrap();
        let k2 = writer.set("canvas/strokes", json!("b")).unwrap();
        assert_ne!(k1, k2);

        let mut late = hub.join(&room);
        late.subscribe("canvas/strokes").unwrap();
        late.subscribe("canvas/state").unwrap();
        let changes = late.poll().unwrap();
        let values: Vec<_> = changes.iter().map(|c| c.value.clone()).collect();
        assert_eq!(values, vec![json!("a"), json!("b"), json!(2)]);
        assert_eq!(changes[0].key.as_deref(), Some(k1.as_str()));
    }

    #[test]
    fn test_sets_are_bounded() {
        let hub = MemoryHub::with_max_set_len(3);
        let room = RoomId::new("r1");
        let mut writer = hub.join(&room);
        for n in 0..10 {
            writer.set("canvas/strokes", json!(n)).unwrap();
        }

        let mut late = hub.join(&room);
        late.subscribe("canvas/strokes").unwrap();
        let values: Vec<_> = late.poll().unwrap().into_iter().map(|c| c.value).collect();
        assert_eq!(values, vec![json!(7), json!(8), json!(9)]);
    }

    #[test]
    fn test_unsubscribed_paths_are_silent() {
        let hub = MemoryHub::new();
        let room = RoomId::new("r1");
        let mut a = hub.join(&room);
        a.subscribe("canvas/clear").unwrap();
        a.put("canvas/state", json!(1)).unwrap();
        assert!(a.poll().unwrap().is_empty());
    }

    #[test]
    fn test_rooms_are_isolated() {
        let hub = MemoryHub::new();
        let mut a = hub.join(&RoomId::new("one"));
        let mut b = hub.join(&RoomId::new("two"));
        b.subscribe("canvas/state").unwrap();
        a.put("canvas/state", json!(1)).unwrap();
        assert!(b.poll().unwrap().is_empty());
        assert_eq!(hub.room_count(), 2);
    }

    #[test]
    fn test_double_subscribe_does_not_duplicate() {
        let hub = MemoryHub::new();
        let mut a = hub.join(&RoomId::new("r"));
        a.put("canvas/state", json!(1)).unwrap();
        a.subscribe("canvas/state").unwrap();
        a.subscribe("canvas/state").unwrap();
        assert_eq!(a.poll().unwrap().len(), 1);
    }
}
