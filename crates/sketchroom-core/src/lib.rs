//! Sketchroom Core Library
//!
//! Raster drawing, undo history and store synchronization for a shared,
//! multi-user drawing surface and its notes pad.

pub mod color;
pub mod config;
pub mod history;
pub mod input;
pub mod raster;
pub mod store;
pub mod sync;
pub mod text;
pub mod tools;
pub mod whiteboard;

pub use color::{Color, ColorError};
pub use config::{BoardConfig, ConfigError};
pub use history::{HistoryEntry, HistoryManager};
pub use input::{PointerButton, PointerEvent, TouchPhase};
pub use raster::{FillReport, RasterError, RasterSurface, ShapeKind, StrokeStyle};
pub use store::{MemoryHub, MemoryStore, RoomId, SharedStore, StoreChange, StoreError};
pub use sync::{Channel, Clock, InboundOutcome, ManualClock, StrokeSegment, SyncBridge, SyncPayload, SystemClock};
pub use text::TextPad;
pub use tools::{ToolKind, ToolOutcome, ToolState, ToolStateMachine};
pub use whiteboard::Whiteboard;
