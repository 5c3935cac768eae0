//! Max-rate sampling for outbound channels.

use std::time::Duration;

/// Leading-edge rate limiter that coalesces to the most recent item.
///
/// The first item of a window is emitted immediately. Items offered while the
/// window is open replace each other; the survivor is emitted by [`poll`]
/// once the window has elapsed, which opens the next window.
///
/// Time is passed in explicitly, so the limiter holds no timers.
///
/// [`poll`]: RateLimiter::poll
#[derive(Debug, Clone)]
pub struct RateLimiter<T> {
    window_ms: u64,
    window_start: Option<u64>,
    pending: Option<T>,
}

impl<T> RateLimiter<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
            window_start: None,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn window_open(&self, now_ms: u64) -> bool {
        self.window_start
            .is_some_and(|start| now_ms < start.saturating_add(self.window_ms))
    }

    /// Offer an item. Returns it back if it may be sent right now.
    pub fn offer(&mut self, item: T, now_ms: u64) -> Option<T> {
        if self.window_open(now_ms) {
            self.pending = Some(item);
            return None;
        }
        self.window_start = Some(now_ms);
        self.pending = None;
        Some(item)
    }

    /// Release the coalesced item if its window has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<T> {
        if self.pending.is_none() || self.window_open(now_ms) {
            return None;
        }
        self.window_start = Some(now_ms);
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget the open window and any pending item.
    pub fn reset(&mut self) {
        self.window_start = None;
        self.pending = None;
    }
}
