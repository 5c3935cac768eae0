//! Tool system: the pointer-driven drawing state machine.

use crate::color::Color;
use crate::input::{PointerButton, PointerEvent, clamp_to_surface};
use crate::raster::{RasterSurface, ShapeKind, StrokeStyle};
use crate::sync::StrokeSegment;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Narrowest selectable stroke.
pub const MIN_STROKE_WIDTH: f64 = 1.0;
/// Widest selectable stroke.
pub const MAX_STROKE_WIDTH: f64 = 100.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Pen,
    Eraser,
    Rectangle,
    Circle,
    Fill,
}

impl ToolKind {
    /// Shape drawn by a drag with this tool, if any.
    pub fn shape(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rectangle => Some(ShapeKind::Rectangle),
            ToolKind::Circle => Some(ShapeKind::Circle),
            ToolKind::Pen | ToolKind::Eraser | ToolKind::Fill => None,
        }
    }

    /// Whether dragging produces stroke segments.
    pub fn is_freehand(self) -> bool {
        matches!(self, ToolKind::Pen | ToolKind::Eraser)
    }
}

/// Phase of a pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ToolState {
    /// Waiting for a primary press.
    #[default]
    Idle,
    /// Pressed, no movement yet.
    Pressed { start: Point, last: Point },
    /// Pressed and moving.
    Dragging { start: Point, last: Point },
}

/// What the caller must do after an event was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Nothing beyond the pixels already drawn.
    None,
    /// A stroke segment was drawn and should be sent to peers.
    Stroke(StrokeSegment),
    /// A discrete edit finished; record history and offer a snapshot.
    Commit,
}

/// Tracks the active tool and the pointer phase, and dispatches pointer
/// events to the surface's drawing primitives.
#[derive(Debug, Clone)]
pub struct ToolStateMachine {
    current_tool: ToolKind,
    state: ToolState,
    color: Color,
    width: f64,
    /// Color painted by the eraser.
    background: Color,
}

impl Default for ToolStateMachine {
    fn default() -> Self {
        Self::new(Color::BLACK, 2.0, Color::WHITE)
    }
}

impl ToolStateMachine {
    pub fn new(color: Color, width: f64, background: Color) -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::Idle,
            color,
            width: width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH),
            background,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.current_tool
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Set the stroke width, clamped to the selectable range.
    pub fn set_width(&mut self, width: f64) {
        if width.is_finite() {
            self.width = width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
        }
    }

    /// Check if a pointer interaction is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ToolState::Idle)
    }

    /// Style applied by the current tool. The eraser ignores the selected color.
    pub fn stroke_style(&self) -> StrokeStyle {
        let color = match self.current_tool {
            ToolKind::Eraser => self.background,
            _ => self.color,
        };
        StrokeStyle {
            color,
            width: self.width,
        }
    }

    /// Switch tools. An in-progress shape is abandoned without committing.
    pub fn select_tool(&mut self, tool: ToolKind, surface: &mut RasterSurface) {
        if self.is_active() && self.current_tool.shape().is_some() {
            surface.cancel_preview();
        }
        self.current_tool = tool;
        self.state = ToolState::Idle;
    }

    /// Abandon any interaction in progress.
    pub fn cancel(&mut self, surface: &mut RasterSurface) {
        if self.is_active() && self.current_tool.shape().is_some() {
            surface.cancel_preview();
        }
        self.state = ToolState::Idle;
    }

    /// Repaint the in-progress shape preview over the current primary buffer,
    /// after something other than this machine changed it.
    pub fn refresh_preview(&self, surface: &mut RasterSurface) {
        let Some(kind) = self.current_tool.shape() else {
            return;
        };
        match self.state {
            ToolState::Idle => {}
            ToolState::Pressed { .. } => surface.begin_preview(),
            ToolState::Dragging { start, last } => {
                surface.begin_preview();
                surface.preview_shape(kind, start, last, self.stroke_style());
            }
        }
    }

    /// Feed one normalized pointer event.
    pub fn handle(&mut self, event: PointerEvent, surface: &mut RasterSurface) -> ToolOutcome {
        match event {
            PointerEvent::Down { position, button } => self.press(position, button, surface),
            PointerEvent::Move { position } => self.drag(position, surface),
            PointerEvent::Up { position, button } => {
                if button != PointerButton::Primary {
                    return ToolOutcome::None;
                }
                self.release(Some(position), surface)
            }
            PointerEvent::Leave => {
                let outcome = self.release(None, surface);
                surface.resync_scratch();
                outcome
            }
        }
    }

    fn press(&mut self, position: Point, button: PointerButton, surface: &mut RasterSurface) -> ToolOutcome {
        if button != PointerButton::Primary || self.is_active() {
            return ToolOutcome::None;
        }
        let point = clamp_to_surface(position, surface.width(), surface.height());

        if self.current_tool == ToolKind::Fill {
            let report = surface.flood_fill(point, self.color);
            log::debug!("flood fill at {point:?}: {} px, stack {}", report.filled, report.max_stack);
            return ToolOutcome::Commit;
        }

        if self.current_tool.shape().is_some() {
            surface.begin_preview();
        }
        self.state = ToolState::Pressed {
            start: point,
            last: point,
        };
        ToolOutcome::None
    }

    fn drag(&mut self, position: Point, surface: &mut RasterSurface) -> ToolOutcome {
        let (start, last) = match self.state {
            ToolState::Idle => return ToolOutcome::None,
            ToolState::Pressed { start, last } | ToolState::Dragging { start, last } => (start, last),
        };
        let point = clamp_to_surface(position, surface.width(), surface.height());
        self.state = ToolState::Dragging { start, last: point };

        let style = self.stroke_style();
        if let Some(kind) = self.current_tool.shape() {
            surface.preview_shape(kind, start, point, style);
            return ToolOutcome::None;
        }

        let segment = StrokeSegment::new(last, point, style, self.current_tool);
        surface.draw_segment(&segment);
        ToolOutcome::Stroke(segment)
    }

    /// End the interaction. Without a position the last known one is used.
    fn release(&mut self, position: Option<Point>, surface: &mut RasterSurface) -> ToolOutcome {
        let (start, last) = match self.state {
            ToolState::Idle => return ToolOutcome::None,
            ToolState::Pressed { start, last } | ToolState::Dragging { start, last } => (start, last),
        };
        self.state = ToolState::Idle;

        let Some(kind) = self.current_tool.shape() else {
            return ToolOutcome::None;
        };
        let end = position
            .map(|p| clamp_to_surface(p, surface.width(), surface.height()))
            .unwrap_or(last);
        surface.commit_shape(kind, start, end, self.stroke_style());
        ToolOutcome::Commit
    }
}
