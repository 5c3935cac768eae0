//! One participant's drawing session.

use crate::color::Color;
use crate::config::{BoardConfig, ConfigError};
use crate::history::HistoryManager;
use crate::input::PointerEvent;
use crate::raster::{RasterError, RasterSurface};
use crate::store::{SharedStore, StoreError};
use crate::sync::{Channel, Clock, InboundOutcome, SyncBridge, SystemClock};
use crate::text::TextPad;
use crate::tools::{ToolKind, ToolOutcome, ToolStateMachine};
use std::path::Path;
use uuid::Uuid;

/// Ties the surface, tools, history, text pad and sync bridge together.
///
/// Everything runs on the caller's loop: feed pointer events with
/// [`handle_pointer`](Self::handle_pointer) and call [`sync`](Self::sync)
/// periodically to exchange updates with the store.
pub struct Whiteboard {
    config: BoardConfig,
    surface: RasterSurface,
    tools: ToolStateMachine,
    history: HistoryManager,
    text: TextPad,
    bridge: SyncBridge,
    clock: Box<dyn Clock>,
}

impl Whiteboard {
    /// Create a session on the wall clock. A random peer id is used if none is given.
    pub fn new(config: BoardConfig, peer_id: Option<String>) -> Result<Self, ConfigError> {
        Self::with_clock(config, peer_id, SystemClock)
    }

    pub fn with_clock(
        config: BoardConfig,
        peer_id: Option<String>,
        clock: impl Clock + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let peer_id = peer_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let (width, height) = config.clamp_size(config.width, config.height);

        let surface = RasterSurface::new(width, height, config.background);
        let tools = ToolStateMachine::new(config.stroke_color, config.stroke_width, config.background);
        let mut history = HistoryManager::new(config.history_capacity, config.thumbnail_scale);
        history.commit(&surface);
        let bridge = SyncBridge::new(peer_id, &config);

        Ok(Self {
            config,
            surface,
            tools,
            history,
            text: TextPad::new(),
            bridge,
            clock: Box::new(clock),
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn peer_id(&self) -> &str {
        self.bridge.peer_id()
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    pub fn tools(&self) -> &ToolStateMachine {
        &self.tools
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn bridge(&self) -> &SyncBridge {
        &self.bridge
    }

    /// Current content of the shared text pad.
    pub fn text(&self) -> &str {
        self.text.content()
    }

    // --- Local input ---

    /// Handle one pointer event: draw, record history and queue sync traffic.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> ToolOutcome {
        let outcome = self.tools.handle(event, &mut self.surface);
        let now = self.clock.now_ms();
        match &outcome {
            ToolOutcome::None => {}
            ToolOutcome::Stroke(segment) => self.bridge.send_stroke(segment.clone(), now),
            ToolOutcome::Commit => {
                self.history.commit(&self.surface);
                self.bridge.request_snapshot(&self.surface, now);
            }
        }
        outcome
    }

    /// Switch tools, abandoning an in-progress shape.
    pub fn select_tool(&mut self, tool: ToolKind) {
        self.tools.select_tool(tool, &mut self.surface);
    }

    pub fn set_color(&mut self, color: Color) {
        self.tools.set_color(color);
    }

    /// Set the stroke width, clamped to 1..=100.
    pub fn set_stroke_width(&mut self, width: f64) {
        self.tools.set_width(width);
    }

    /// Replace the shared text pad. Peers receive it unless it is unchanged.
    pub fn set_text(&mut self, content: impl Into<String>) {
        let content = content.into();
        if self.text.replace(content.clone()) {
            self.bridge.send_text(content, self.clock.now_ms());
        }
    }

    /// Name attached to outgoing payloads.
    pub fn set_username(&mut self, name: impl Into<String>) {
        self.bridge.set_author(name);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Step back through local history. Peers receive the result as a snapshot.
    pub fn undo(&mut self) -> bool {
        self.tools.cancel(&mut self.surface);
        let moved = self.history.undo(&mut self.surface, self.config.background);
        if moved {
            self.bridge.request_snapshot(&self.surface, self.clock.now_ms());
        }
        moved
    }

    /// Step forward through local history. Peers receive the result as a snapshot.
    pub fn redo(&mut self) -> bool {
        self.tools.cancel(&mut self.surface);
        let moved = self.history.redo(&mut self.surface, self.config.background);
        if moved {
            self.bridge.request_snapshot(&self.surface, self.clock.now_ms());
        }
        moved
    }

    /// Paint the background everywhere and tell every peer immediately.
    pub fn clear(&mut self) {
        self.tools.cancel(&mut self.surface);
        self.surface.clear(self.config.background);
        self.history.commit(&self.surface);

        let now = self.clock.now_ms();
        self.bridge.send_clear(now);
        self.bridge.request_snapshot(&self.surface, now);
    }

    /// Resize the surface, keeping content anchored at the origin.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = self.config.clamp_size(width, height);
        self.tools.cancel(&mut self.surface);
        self.surface.resize(width, height, self.config.background);
    }

    pub fn export_png(&self) -> Result<Vec<u8>, RasterError> {
        self.surface.export_png()
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), RasterError> {
        self.surface.save_png(path)
    }

    // --- Sync ---

    /// Subscribe to every sync channel.
    ///
    /// Strokes are subscribed first and the snapshot last, so a late joiner's
    /// final baseline is the most recent full frame.
    pub fn join<S: SharedStore + ?Sized>(&mut self, store: &mut S) -> Result<(), StoreError> {
        for channel in Channel::ALL {
            store.subscribe(channel.path())?;
        }
        log::info!("peer {} subscribed to canvas channels", self.peer_id());
        Ok(())
    }

    /// Flush throttled emissions whose window has elapsed.
    pub fn tick(&mut self) {
        self.bridge.tick(&self.surface, self.clock.now_ms());
    }

    /// Write queued payloads to the store.
    pub fn publish<S: SharedStore + ?Sized>(&mut self, store: &mut S) -> Result<usize, StoreError> {
        self.bridge.publish(store)
    }

    /// Apply every change the store delivered. Never queues outbound traffic.
    pub fn receive<S: SharedStore + ?Sized>(&mut self, store: &mut S) -> Result<Vec<InboundOutcome>, StoreError> {
        let changes = store.poll()?;
        let mut outcomes = Vec::with_capacity(changes.len());
        let mut repaint = false;
        for change in changes {
            let outcome = self
                .bridge
                .apply_inbound(change, &mut self.surface, &mut self.history, &mut self.text);
            repaint |= matches!(outcome, InboundOutcome::Applied(channel) if channel != Channel::Text);
            outcomes.push(outcome);
        }
        if repaint {
            // Keep previewing the in-progress shape over the new pixels.
            self.tools.refresh_preview(&mut self.surface);
        }
        Ok(outcomes)
    }

    /// Receive, flush throttles, then publish.
    pub fn sync<S: SharedStore + ?Sized>(&mut self, store: &mut S) -> Result<Vec<InboundOutcome>, StoreError> {
        let outcomes = self.receive(store)?;
        self.tick();
        self.publish(store)?;
        Ok(outcomes)
    }
}

impl std::fmt::Debug for Whiteboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Whiteboard")
            .field("peer_id", &self.peer_id())
            .field("size", &(self.surface.width(), self.surface.height()))
            .field("tool", &self.tools.tool())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}
