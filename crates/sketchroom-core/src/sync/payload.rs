//! Wire records exchanged through the shared store.

use super::Channel;
use crate::color::Color;
use crate::raster::{RasterError, StrokeStyle};
use crate::tools::ToolKind;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors decoding an inbound record.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Payload for {found:?} arrived on the {expected:?} channel")]
    ChannelMismatch { expected: Channel, found: Channel },
    #[error("Unknown store path: {0}")]
    UnknownPath(String),
    #[error("Undecodable snapshot: {0}")]
    Snapshot(#[from] RasterError),
}

/// One incremental pointer movement of a freehand tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeSegment {
    pub from_x: f64,
    pub from_y: f64,
    pub to_x: f64,
    pub to_y: f64,
    pub color: Color,
    pub width: f64,
    pub tool: ToolKind,
    /// Sender wall-clock milliseconds, stamped when the segment is emitted.
    #[serde(default)]
    pub timestamp: u64,
}

impl StrokeSegment {
    pub fn new(from: Point, to: Point, style: StrokeStyle, tool: ToolKind) -> Self {
        Self {
            from_x: from.x,
            from_y: from.y,
            to_x: to.x,
            to_y: to.y,
            color: style.color,
            width: style.width,
            tool,
            timestamp: 0,
        }
    }

    pub fn from(&self) -> Point {
        Point::new(self.from_x, self.from_y)
    }

    pub fn to(&self) -> Point {
        Point::new(self.to_x, self.to_y)
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.color,
            width: self.width,
        }
    }
}

/// A record on one of the sync channels.
///
/// ```json
/// { "kind": "stroke", "origin": "…", "fromX": 10, "fromY": 10, "toX": 20, … }
/// { "kind": "snapshot", "origin": "…", "dataUrl": "data:image/jpeg;base64,…", "timestamp": 1700000000000 }
/// { "kind": "clear", "origin": "…", "timestamp": 1700000000000 }
/// { "kind": "text", "origin": "…", "content": "…", "timestamp": 1700000000000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SyncPayload {
    Stroke {
        origin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(flatten)]
        segment: StrokeSegment,
    },
    Snapshot {
        origin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        data_url: String,
        timestamp: u64,
    },
    Clear {
        origin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        timestamp: u64,
    },
    Text {
        origin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        content: String,
        timestamp: u64,
    },
}

impl SyncPayload {
    pub fn channel(&self) -> Channel {
        match self {
            SyncPayload::Stroke { .. } => Channel::Stroke,
            SyncPayload::Snapshot { .. } => Channel::Snapshot,
            SyncPayload::Clear { .. } => Channel::Clear,
            SyncPayload::Text { .. } => Channel::Text,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            SyncPayload::Stroke { segment, .. } => segment.timestamp,
            SyncPayload::Snapshot { timestamp, .. }
            | SyncPayload::Clear { timestamp, .. }
            | SyncPayload::Text { timestamp, .. } => *timestamp,
        }
    }

    /// Peer id of the sender.
    pub fn origin(&self) -> &str {
        match self {
            SyncPayload::Stroke { origin, .. }
            | SyncPayload::Snapshot { origin, .. }
            | SyncPayload::Clear { origin, .. }
            | SyncPayload::Text { origin, .. } => origin,
        }
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            SyncPayload::Stroke { author, .. }
            | SyncPayload::Snapshot { author, .. }
            | SyncPayload::Clear { author, .. }
            | SyncPayload::Text { author, .. } => author.as_deref(),
        }
    }

    pub fn to_value(&self) -> Result<Value, PayloadError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Decode a record delivered at `path`, checking it belongs to that channel.
    pub fn from_change(path: &str, value: Value) -> Result<Self, PayloadError> {
        let expected = Channel::from_path(path).ok_or_else(|| PayloadError::UnknownPath(path.to_string()))?;
        let payload = Self::from_value(value)?;
        let found = payload.channel();
        if found != expected {
            return Err(PayloadError::ChannelMismatch { expected, found });
        }
        Ok(payload)
    }
}
