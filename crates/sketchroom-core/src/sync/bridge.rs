use super::{Channel, PayloadError, RateLimiter, StrokeSegment, SyncPayload};
use crate::color::Color;
use crate::config::BoardConfig;
use crate::history::HistoryManager;
use crate::raster::RasterSurface;
use crate::store::{SharedStore, StoreChange, StoreError};
use crate::text::TextPad;
use std::collections::VecDeque;
use std::fmt;

/// Result of feeding one store change to [`SyncBridge::apply_inbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The surface was updated.
    Applied(Channel),
    /// Not newer than the last update applied on that channel.
    Stale(Channel),
    /// Our own write, echoed back by the store.
    OwnEcho,
    /// Malformed or undecodable; nothing changed.
    Dropped(String),
}

impl fmt::Display for InboundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundOutcome::Applied(c) => write!(f, "applied {c:?}"),
            InboundOutcome::Stale(c) => write!(f, "stale {c:?}"),
            InboundOutcome::OwnEcho => write!(f, "own echo"),
            InboundOutcome::Dropped(reason) => write!(f, "dropped: {reason}"),
        }
    }
}

/// Last timestamp applied per channel.
#[derive(Debug, Clone, Copy, Default)]
struct LastApplied {
    stroke: u64,
    snapshot: u64,
    clear: u64,
    text: u64,
}

impl LastApplied {
    fn get(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Stroke => self.stroke,
            Channel::Snapshot => self.snapshot,
            Channel::Clear => self.clear,
            Channel::Text => self.text,
        }
    }

    fn advance(&mut self, channel: Channel, timestamp: u64) {
        let slot = match channel {
            Channel::Stroke => &mut self.stroke,
            Channel::Snapshot => &mut self.snapshot,
            Channel::Clear => &mut self.clear,
            Channel::Text => &mut self.text,
        };
        *slot = (*slot).max(timestamp);
    }
}

/// Outbound throttling and inbound reconciliation for one peer.
///
/// The outbound side only ever fills the outbox from local actions
/// (`send_*`, `request_snapshot`, `tick`). The inbound side only ever
/// mutates the surface, history and text pad. Neither calls into the other.
///
/// The outbox stays bounded while the store is unreachable: put channels
/// keep only their newest payload, and at most `max_queued_strokes`
/// segments are kept, oldest dropped first.
#[derive(Debug)]
pub struct SyncBridge {
    peer_id: String,
    author: Option<String>,
    snapshot_quality: u8,
    background: Color,
    /// Largest inbound frame accepted.
    max_frame: (u32, u32),
    max_queued_strokes: usize,
    strokes: RateLimiter<StrokeSegment>,
    snapshots: RateLimiter<()>,
    outbox: VecDeque<SyncPayload>,
    dropped_strokes: u64,
    last_sent: u64,
    last_applied: LastApplied,
}

impl SyncBridge {
    pub fn new(peer_id: impl Into<String>, config: &BoardConfig) -> Self {
        Self {
            peer_id: peer_id.into(),
            author: None,
            snapshot_quality: config.snapshot_quality,
            background: config.background,
            max_frame: (config.max_width, config.max_height),
            max_queued_strokes: config.max_queued_strokes.max(1),
            strokes: RateLimiter::new(config.stroke_window()),
            snapshots: RateLimiter::new(config.snapshot_window()),
            outbox: VecDeque::new(),
            dropped_strokes: 0,
            last_sent: 0,
            last_applied: LastApplied::default(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Attribute subsequent payloads to `name`. Empty names clear attribution.
    pub fn set_author(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.author = (!name.trim().is_empty()).then_some(name);
    }

    /// Timestamp of the last update applied on `channel`.
    pub fn last_applied(&self, channel: Channel) -> u64 {
        self.last_applied.get(channel)
    }

    /// Strictly increasing per-sender timestamps.
    fn next_timestamp(&mut self, now_ms: u64) -> u64 {
        self.last_sent = now_ms.max(self.last_sent + 1);
        self.last_sent
    }

    // --- Outbound ---

    /// Offer a locally drawn segment to the stroke channel.
    pub fn send_stroke(&mut self, segment: StrokeSegment, now_ms: u64) {
        if let Some(segment) = self.strokes.offer(segment, now_ms) {
            self.emit_stroke(segment, now_ms);
        }
    }

    fn emit_stroke(&mut self, mut segment: StrokeSegment, now_ms: u64) {
        segment.timestamp = self.next_timestamp(now_ms);
        log::debug!("stroke out @{}", segment.timestamp);
        self.enqueue(SyncPayload::Stroke {
            origin: self.peer_id.clone(),
            author: self.author.clone(),
            segment,
        });
    }

    /// Ask for a full-frame snapshot. The frame is encoded when the
    /// snapshot window allows it, from the surface as it is at that time.
    pub fn request_snapshot(&mut self, surface: &RasterSurface, now_ms: u64) {
        if self.snapshots.offer((), now_ms).is_some() {
            self.emit_snapshot(surface, now_ms);
        }
    }

    fn emit_snapshot(&mut self, surface: &RasterSurface, now_ms: u64) {
        let data_url = match surface.export_snapshot(self.snapshot_quality) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("snapshot encode failed: {e}");
                return;
            }
        };
        let timestamp = self.next_timestamp(now_ms);
        // A delayed older snapshot from elsewhere must not replace this frame.
        self.last_applied.advance(Channel::Snapshot, timestamp);
        log::debug!("snapshot out @{timestamp}, {} bytes", data_url.len());
        self.enqueue(SyncPayload::Snapshot {
            origin: self.peer_id.clone(),
            author: self.author.clone(),
            data_url,
            timestamp,
        });
    }

    /// Queue a clear event. Never throttled.
    pub fn send_clear(&mut self, now_ms: u64) {
        // Strokes drawn before the clear are obsolete.
        self.strokes.reset();
        self.outbox.retain(|p| p.channel() != Channel::Stroke);
        let timestamp = self.next_timestamp(now_ms);
        self.last_applied.advance(Channel::Clear, timestamp);
        log::debug!("clear out @{timestamp}");
        self.enqueue(SyncPayload::Clear {
            origin: self.peer_id.clone(),
            author: self.author.clone(),
            timestamp,
        });
    }

    /// Queue the full text pad content. Never throttled.
    pub fn send_text(&mut self, content: impl Into<String>, now_ms: u64) {
        let content = content.into();
        let timestamp = self.next_timestamp(now_ms);
        self.last_applied.advance(Channel::Text, timestamp);
        log::debug!("text out @{timestamp}, {} bytes", content.len());
        self.enqueue(SyncPayload::Text {
            origin: self.peer_id.clone(),
            author: self.author.clone(),
            content,
            timestamp,
        });
    }

    fn enqueue(&mut self, payload: SyncPayload) {
        let channel = payload.channel();
        if channel.is_set() {
            let queued = self.outbox.iter().filter(|p| p.channel() == channel).count();
            if queued >= self.max_queued_strokes {
                if let Some(oldest) = self.outbox.iter().position(|p| p.channel() == channel) {
                    self.outbox.remove(oldest);
                    self.dropped_strokes += 1;
                    if self.dropped_strokes == 1 {
                        log::warn!("outbox holds {queued} strokes, dropping the oldest until the store accepts writes");
                    }
                }
            }
        } else {
            // Only the newest value of a put channel is worth sending.
            self.outbox.retain(|p| p.channel() != channel);
        }
        self.outbox.push_back(payload);
    }

    /// Flush trailing emissions whose window has elapsed.
    pub fn tick(&mut self, surface: &RasterSurface, now_ms: u64) {
        if let Some(segment) = self.strokes.poll(now_ms) {
            self.emit_stroke(segment, now_ms);
        }
        if self.snapshots.poll(now_ms).is_some() {
            self.emit_snapshot(surface, now_ms);
        }
    }

    /// Whether throttled items are still waiting for their window.
    pub fn has_pending(&self) -> bool {
        self.strokes.has_pending() || self.snapshots.has_pending()
    }

    /// Stroke segments discarded since the outbox last drained.
    pub fn dropped_strokes(&self) -> u64 {
        self.dropped_strokes
    }

    pub fn outbox(&self) -> impl Iterator<Item = &SyncPayload> {
        self.outbox.iter()
    }

    pub fn take_outbox(&mut self) -> Vec<SyncPayload> {
        self.outbox.drain(..).collect()
    }

    /// Write queued payloads to the store in order. On failure the unsent
    /// payloads stay queued.
    pub fn publish<S: SharedStore + ?Sized>(&mut self, store: &mut S) -> Result<usize, StoreError> {
        let mut sent = 0;
        while let Some(payload) = self.outbox.front() {
            let channel = payload.channel();
            let value = serde_json::to_value(payload)?;
            if channel.is_set() {
                store.set(channel.path(), value)?;
            } else {
                store.put(channel.path(), value)?;
            }
            self.outbox.pop_front();
            sent += 1;
        }
        if self.dropped_strokes > 0 {
            log::info!("outbox drained; {} strokes were dropped while offline", self.dropped_strokes);
            self.dropped_strokes = 0;
        }
        Ok(sent)
    }

    // --- Inbound ---

    /// Reconcile one store change into the surface or the text pad.
    ///
    /// Applied snapshots and clears are committed to `history` as a new
    /// baseline. Nothing is ever queued outbound from here.
    pub fn apply_inbound(
        &mut self,
        change: StoreChange,
        surface: &mut RasterSurface,
        history: &mut HistoryManager,
        text: &mut TextPad,
    ) -> InboundOutcome {
        let outcome = self.reconcile(change, surface, history, text);
        match &outcome {
            InboundOutcome::Applied(_) => log::debug!("inbound {outcome}"),
            InboundOutcome::Dropped(_) => log::warn!("inbound {outcome}"),
            InboundOutcome::Stale(_) | InboundOutcome::OwnEcho => log::trace!("inbound {outcome}"),
        }
        outcome
    }

    fn reconcile(
        &mut self,
        change: StoreChange,
        surface: &mut RasterSurface,
        history: &mut HistoryManager,
        text: &mut TextPad,
    ) -> InboundOutcome {
        let payload = match SyncPayload::from_change(&change.path, change.value) {
            Ok(payload) => payload,
            Err(e) => return InboundOutcome::Dropped(e.to_string()),
        };
        if payload.origin() == self.peer_id {
            return InboundOutcome::OwnEcho;
        }

        let channel = payload.channel();
        let timestamp = payload.timestamp();
        if timestamp <= self.last_applied.get(channel) {
            return InboundOutcome::Stale(channel);
        }

        match payload {
            SyncPayload::Stroke { segment, .. } => {
                surface.draw_segment(&segment);
            }
            SyncPayload::Snapshot { data_url, .. } => {
                // Decode fully before touching the surface.
                let (max_width, max_height) = self.max_frame;
                let decoded = match RasterSurface::decode_snapshot(&data_url, max_width, max_height) {
                    Ok(image) => image,
                    Err(e) => return InboundOutcome::Dropped(PayloadError::from(e).to_string()),
                };
                surface.apply_snapshot(decoded);
                history.commit(surface);
            }
            SyncPayload::Clear { .. } => {
                surface.clear(self.background);
                history.commit(surface);
            }
            SyncPayload::Text { content, .. } => {
                if !text.replace(content) {
                    log::trace!("text unchanged @{timestamp}");
                }
            }
        }

        self.last_applied.advance(channel, timestamp);
        InboundOutcome::Applied(channel)
    }
}
