//! Bounded linear undo/redo history of raster thumbnails.

use crate::color::Color;
use crate::raster::RasterSurface;
use image::RgbaImage;
use std::collections::VecDeque;

/// Default number of history entries kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Default thumbnail scale relative to the surface.
pub const DEFAULT_THUMBNAIL_SCALE: f64 = 0.25;

/// An immutable, reduced-resolution copy of the primary buffer.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    thumbnail: RgbaImage,
    /// Surface dimensions at commit time.
    source: (u32, u32),
    inserted_at: u64,
}

impl HistoryEntry {
    pub fn thumbnail(&self) -> &RgbaImage {
        &self.thumbnail
    }

    /// Width and height of the surface the thumbnail was taken from.
    pub fn source_size(&self) -> (u32, u32) {
        self.source
    }

    /// Commit sequence number at which the entry was recorded.
    pub fn inserted_at(&self) -> u64 {
        self.inserted_at
    }
}

/// Linear history with a movable cursor.
///
/// Entries after the cursor are the redo branch; they are dropped on the next
/// commit. When capacity is exceeded the oldest entry is evicted and the
/// cursor shifts down with it.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    index: usize,
    capacity: usize,
    thumbnail_scale: f64,
    next_sequence: u64,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_THUMBNAIL_SCALE)
    }
}

impl HistoryManager {
    pub fn new(capacity: usize, thumbnail_scale: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            index: 0,
            capacity,
            thumbnail_scale,
            next_sequence: 0,
        }
    }

    /// Record the current primary buffer, discarding any redo branch.
    pub fn commit(&mut self, surface: &RasterSurface) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }

        self.entries.push_back(HistoryEntry {
            thumbnail: surface.thumbnail(self.thumbnail_scale),
            source: (surface.width(), surface.height()),
            inserted_at: self.next_sequence,
        });
        self.next_sequence += 1;

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;

        log::debug!(
            "history commit: {}/{} entries, {} bytes",
            self.index + 1,
            self.entries.len(),
            self.memory_bytes()
        );
    }

    /// Step back one entry and repaint the surface from it. Area the entry
    /// does not cover (the surface grew since) is painted with `background`.
    /// Returns true if the cursor moved.
    pub fn undo(&mut self, surface: &mut RasterSurface, background: Color) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.index -= 1;
        self.restore(surface, background);
        true
    }

    /// Step forward one entry and repaint the surface from it.
    /// Returns true if the cursor moved.
    pub fn redo(&mut self, surface: &mut RasterSurface, background: Color) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        self.restore(surface, background);
        true
    }

    fn restore(&self, surface: &mut RasterSurface, background: Color) {
        if let Some(entry) = self.entries.get(self.index) {
            surface.restore_from(&entry.thumbnail, entry.source, background);
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.index < self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor position, `None` while empty.
    pub fn index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.index)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entry under the cursor.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.index)
    }

    /// Bytes held by all thumbnails.
    pub fn memory_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.thumbnail.as_raw().len()).sum()
    }

    /// Drop every entry.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn exact() -> HistoryManager {
        HistoryManager::new(DEFAULT_HISTORY_CAPACITY, 1.0)
    }

    #[test]
    fn test_empty_history() {
        let history = HistoryManager::default();
        assert!(history.is_empty());
        assert_eq!(history.index(), None);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_eviction() {
        let surface = RasterSurface::new(8, 8, Color::WHITE);
        let mut history = HistoryManager::default();
        for _ in 0..75 {
            history.commit(&surface);
            assert_eq!(history.index(), Some(history.len() - 1));
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.index(), Some(49));
        assert!(!history.can_redo());
        // Oldest 25 entries were evicted.
        assert_eq!(history.entries[0].inserted_at(), 25);
    }

    #[test]
    fn test_undo_redo_restores_state() {
        let mut surface = RasterSurface::new(16, 16, Color::WHITE);
        let mut history = exact();
        history.commit(&surface);

        surface.flood_fill(Point::new(1.0, 1.0), RED);
        history.commit(&surface);
        let red_state = surface.primary().clone();

        assert!(history.undo(&mut surface, Color::WHITE));
        assert_eq!(surface.pixel(3, 3), Some(Color::WHITE));
        assert!(history.can_redo());

        assert!(history.redo(&mut surface, Color::WHITE));
        assert_eq!(surface.primary(), &red_state);
        assert!(!history.redo(&mut surface, Color::WHITE));
    }

    #[test]
    fn test_undo_after_resize_keeps_geometry() {
        let mut surface = RasterSurface::new(20, 20, Color::WHITE);
        let mut history = exact();
        history.commit(&surface);
        surface.flood_fill(Point::ZERO, RED);
        history.commit(&surface);
        assert_eq!(history.current().unwrap().source_size(), (20, 20));

        surface.resize(40, 20, Color::WHITE);
        assert!(history.undo(&mut surface, Color::WHITE));
        assert_eq!(surface.primary().dimensions(), (40, 20));
        assert_eq!(surface.pixel(10, 10), Some(Color::WHITE));

        assert!(history.redo(&mut surface, Color::WHITE));
        assert_eq!(surface.primary().dimensions(), (40, 20));
        assert_eq!(surface.pixel(19, 10), Some(RED));
        assert_eq!(surface.pixel(20, 10), Some(Color::WHITE));
        assert_eq!(surface.pixel(39, 10), Some(Color::WHITE));
    }

    #[test]
    fn test_undo_at_start_is_noop() {
        let mut surface = RasterSurface::new(4, 4, Color::WHITE);
        let mut history = exact();
        history.commit(&surface);
        surface.flood_fill(Point::ZERO, RED);

        assert!(!history.undo(&mut surface, Color::WHITE));
        assert_eq!(surface.pixel(0, 0), Some(RED));
    }

    #[test]
    fn test_commit_truncates_redo() {
        let mut surface = RasterSurface::new(4, 4, Color::WHITE);
        let mut history = exact();
        history.commit(&surface);
        surface.flood_fill(Point::ZERO, RED);
        history.commit(&surface);
        surface.flood_fill(Point::ZERO, BLUE);
        history.commit(&surface);

        history.undo(&mut surface, Color::WHITE);
        history.undo(&mut surface, Color::WHITE);
        assert!(history.can_redo());

        surface.flood_fill(Point::ZERO, BLUE);
        history.commit(&surface);
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(history.index(), Some(1));
    }

    #[test]
    fn test_snapshots_are_independent_copies() {
        let mut surface = RasterSurface::new(4, 4, Color::WHITE);
        let mut history = exact();
        history.commit(&surface);
        surface.flood_fill(Point::ZERO, RED);

        let stored = history.current().unwrap().thumbnail();
        assert!(stored.pixels().all(|p| Color::from(*p) == Color::WHITE));
    }

    #[test]
    fn test_thumbnails_are_reduced() {
        let surface = RasterSurface::new(80, 40, Color::WHITE);
        let mut history = HistoryManager::default();
        history.commit(&surface);
        assert_eq!(history.current().unwrap().thumbnail().dimensions(), (20, 10));
        assert_eq!(history.memory_bytes(), 20 * 10 * 4);

        history.reset();
        assert!(history.is_empty());
    }

    #[test]
    fn test_undo_scales_thumbnail_up() {
        let mut surface = RasterSurface::new(40, 40, RED);
        let mut history = HistoryManager::default();
        history.commit(&surface);
        surface.clear(Color::WHITE);
        history.commit(&surface);

        history.undo(&mut surface, Color::WHITE);
        assert_eq!(surface.primary().dimensions(), (40, 40));
        let p = surface.pixel(20, 20).unwrap();
        assert!(p.r >= 250 && p.g <= 5 && p.b <= 5, "resampled red: {p:?}");
    }
}
