//! Pixel buffers and drawing primitives.
//!
//! [`RasterSurface`] owns two buffers of identical size:
//!
//! - the **primary** buffer, the authoritative picture every peer converges to;
//! - the **scratch** buffer, where in-progress shape previews are composited
//!   over a snapshot of the primary buffer taken when the drag started.
//!
//! Only the methods here mutate the buffers. Shape previews never touch the
//! primary buffer; they are repainted from the drag-start snapshot on every
//! pointer move, so high-frequency previews cannot accumulate.

mod codec;
mod draw;
mod fill;

pub use fill::FillReport;

use crate::color::Color;
use crate::sync::StrokeSegment;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Raster errors.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outline shapes drawn with a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
}

/// Color and width of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f64,
}

/// The primary and scratch pixel buffers.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    primary: RgbaImage,
    scratch: RgbaImage,
    /// Primary buffer as it was when the current shape drag started.
    preview_base: Option<RgbaImage>,
}

impl RasterSurface {
    /// Create a surface filled with `background`.
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            primary: RgbaImage::from_pixel(width, height, background.into()),
            scratch: RgbaImage::new(width, height),
            preview_base: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.primary.width()
    }

    pub fn height(&self) -> u32 {
        self.primary.height()
    }

    pub fn primary(&self) -> &RgbaImage {
        &self.primary
    }

    pub fn scratch(&self) -> &RgbaImage {
        &self.scratch
    }

    /// The buffer to present: the scratch buffer during a shape preview.
    pub fn frame(&self) -> &RgbaImage {
        if self.preview_base.is_some() {
            &self.scratch
        } else {
            &self.primary
        }
    }

    /// Primary-buffer pixel, or `None` out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.primary.get_pixel_checked(x, y).map(|p| Color::from(*p))
    }

    /// Whether a shape preview is in progress.
    pub fn is_previewing(&self) -> bool {
        self.preview_base.is_some()
    }

    /// Whether the scratch buffer is fully transparent.
    pub fn scratch_is_empty(&self) -> bool {
        self.scratch.pixels().all(|p| p[3] == 0)
    }

    // --- Strokes ---

    /// Draw a round-capped line into the primary buffer.
    pub fn draw_line(&mut self, from: Point, to: Point, style: StrokeStyle) {
        draw::stroke_line(&mut self.primary, from, to, style);
    }

    /// Draw one stroke segment. Re-applying a segment leaves the buffer unchanged.
    pub fn draw_segment(&mut self, segment: &StrokeSegment) {
        self.draw_line(segment.from(), segment.to(), segment.style());
    }

    // --- Shapes ---

    /// Capture the drag-start snapshot for subsequent previews.
    pub fn begin_preview(&mut self) {
        self.scratch.clone_from(&self.primary);
        self.preview_base = Some(self.primary.clone());
    }

    /// Render a shape preview into the scratch buffer.
    pub fn preview_shape(&mut self, kind: ShapeKind, start: Point, current: Point, style: StrokeStyle) {
        if self.preview_base.is_none() {
            self.begin_preview();
        }
        if let Some(base) = &self.preview_base {
            self.scratch.clone_from(base);
        }
        draw::stroke_shape(&mut self.scratch, kind, start, current, style);
    }

    /// Draw the final outline into the primary buffer and end the preview.
    pub fn commit_shape(&mut self, kind: ShapeKind, start: Point, end: Point, style: StrokeStyle) {
        draw::stroke_shape(&mut self.primary, kind, start, end, style);
        self.cancel_preview();
    }

    /// Drop the drag-start snapshot and empty the scratch buffer.
    pub fn cancel_preview(&mut self) {
        self.preview_base = None;
        self.scratch.pixels_mut().for_each(|p| p.0 = [0; 4]);
    }

    /// Copy the primary buffer into the scratch buffer.
    pub fn resync_scratch(&mut self) {
        self.preview_base = None;
        self.scratch.clone_from(&self.primary);
    }

    // --- Fill / clear ---

    /// Flood-fill the region under `point`, clamped into the buffer.
    pub fn flood_fill(&mut self, point: Point, color: Color) -> FillReport {
        let x = clamp_index(point.x, self.width());
        let y = clamp_index(point.y, self.height());
        fill::flood_fill(&mut self.primary, x, y, color.into())
    }

    /// Paint the whole primary buffer and empty the scratch buffer.
    pub fn clear(&mut self, background: Color) {
        let pixel = background.into();
        self.primary.pixels_mut().for_each(|p| *p = pixel);
        self.cancel_preview();
    }

    /// Resize both buffers, keeping prior content anchored at the origin.
    pub fn resize(&mut self, width: u32, height: u32, background: Color) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == self.primary.dimensions() {
            return;
        }
        let mut resized = RgbaImage::from_pixel(width, height, background.into());
        imageops::replace(&mut resized, &self.primary, 0, 0);
        self.primary = resized;
        self.scratch = RgbaImage::new(width, height);
        self.preview_base = None;
    }

    // --- Snapshots ---

    /// Lossy `data:` URL of the primary buffer for network reconciliation.
    pub fn export_snapshot(&self, quality: u8) -> Result<String, RasterError> {
        codec::encode_jpeg_data_url(&self.primary, quality)
    }

    /// Decode a snapshot without touching any surface. Frames larger than
    /// `max_width` x `max_height` are rejected.
    pub fn decode_snapshot(encoded: &str, max_width: u32, max_height: u32) -> Result<RgbaImage, RasterError> {
        codec::decode_data_url(encoded, max_width, max_height)
    }

    /// Decode and replace the primary buffer. On error nothing changes.
    pub fn import_snapshot(&mut self, encoded: &str, max_width: u32, max_height: u32) -> Result<(), RasterError> {
        let decoded = Self::decode_snapshot(encoded, max_width, max_height)?;
        self.apply_snapshot(decoded);
        Ok(())
    }

    /// Replace the primary buffer with an already decoded image, scaled to fit.
    pub fn apply_snapshot(&mut self, image: RgbaImage) {
        let (w, h) = self.primary.dimensions();
        self.primary = if image.dimensions() == (w, h) {
            image
        } else {
            imageops::resize(&image, w, h, FilterType::Triangle)
        };
    }

    /// Repaint the primary buffer from a thumbnail of a `source`-sized frame.
    ///
    /// The thumbnail is scaled back to its source size and placed at the
    /// origin, like [`resize`](Self::resize) does; area it does not cover is
    /// painted with `background`.
    pub fn restore_from(&mut self, image: &RgbaImage, source: (u32, u32), background: Color) {
        let (w, h) = self.primary.dimensions();
        let source = (source.0.max(1), source.1.max(1));
        let frame = if image.dimensions() == source {
            None
        } else {
            Some(imageops::resize(image, source.0, source.1, FilterType::Triangle))
        };
        let frame = frame.as_ref().unwrap_or(image);

        if source == (w, h) {
            self.primary.clone_from(frame);
        } else {
            let mut restored = RgbaImage::from_pixel(w, h, background.into());
            imageops::replace(&mut restored, frame, 0, 0);
            self.primary = restored;
        }
    }

    /// Scaled copy of the primary buffer. A scale of 1.0 copies exactly.
    pub fn thumbnail(&self, scale: f64) -> RgbaImage {
        if scale >= 1.0 {
            return self.primary.clone();
        }
        let w = ((self.width() as f64 * scale).round() as u32).max(1);
        let h = ((self.height() as f64 * scale).round() as u32).max(1);
        imageops::resize(&self.primary, w, h, FilterType::Triangle)
    }

    /// Full-resolution lossless PNG of the primary buffer.
    pub fn export_png(&self) -> Result<Vec<u8>, RasterError> {
        codec::encode_png(&self.primary)
    }

    /// Write [`export_png`](Self::export_png) to a file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), RasterError> {
        std::fs::write(path, self.export_png()?)?;
        Ok(())
    }
}

fn clamp_index(coord: f64, len: u32) -> u32 {
    if coord.is_nan() {
        return 0;
    }
    (coord.floor().max(0.0) as u32).min(len.saturating_sub(1))
}
