//! Synchronization of the raster surface over a shared store.
//!
//! Outbound updates are shaped into four channels:
//!
//! | channel  | store path       | write | rate                    |
//! |----------|------------------|-------|-------------------------|
//! | stroke   | `canvas/strokes` | set   | one per stroke window   |
//! | snapshot | `canvas/state`   | put   | one per snapshot window |
//! | clear    | `canvas/clear`   | put   | immediate               |
//! | text     | `text`           | put   | immediate               |
//!
//! Inbound records are applied last-write-wins per channel by
//! [`SyncBridge::apply_inbound`], which never queues anything outbound.

mod bridge;
mod clock;
mod payload;
mod throttle;

pub use bridge::{InboundOutcome, SyncBridge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use payload::{PayloadError, StrokeSegment, SyncPayload};
pub use throttle::RateLimiter;

use serde::{Deserialize, Serialize};

/// The independently throttled categories of sync traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Stroke,
    Snapshot,
    Clear,
    Text,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Text, Channel::Stroke, Channel::Clear, Channel::Snapshot];

    /// Store path relative to the room namespace.
    pub fn path(self) -> &'static str {
        match self {
            Channel::Stroke => "canvas/strokes",
            Channel::Snapshot => "canvas/state",
            Channel::Clear => "canvas/clear",
            Channel::Text => "text",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.path() == path)
    }

    /// Whether records accumulate in a set rather than overwrite one value.
    pub fn is_set(self) -> bool {
        matches!(self, Channel::Stroke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_paths() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_path(channel.path()), Some(channel));
        }
        assert_eq!(Channel::from_path("canvas"), None);
        assert!(Channel::Stroke.is_set());
        assert!(!Channel::Snapshot.is_set());
        assert!(!Channel::Text.is_set());
    }
}
