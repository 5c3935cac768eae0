//! Unified pointer input for mouse and touch events.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pointer button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Touch event phases, as reported by touch-capable platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// Pointer event in surface coordinates, independent of the source device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: PointerButton,
    },
    Move {
        position: Point,
    },
    Up {
        position: Point,
        button: PointerButton,
    },
    /// The pointer left the drawing surface.
    Leave,
}

impl PointerEvent {
    /// Primary-button press.
    pub fn down(x: f64, y: f64) -> Self {
        Self::Down {
            position: Point::new(x, y),
            button: PointerButton::Primary,
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self::Move {
            position: Point::new(x, y),
        }
    }

    /// Primary-button release.
    pub fn up(x: f64, y: f64) -> Self {
        Self::Up {
            position: Point::new(x, y),
            button: PointerButton::Primary,
        }
    }

    /// Normalize a single-finger touch event.
    ///
    /// Touch end events carry no usable coordinates on some platforms, so the
    /// caller passes the last known touch position.
    pub fn from_touch(phase: TouchPhase, position: Point) -> Self {
        match phase {
            TouchPhase::Start => Self::Down {
                position,
                button: PointerButton::Primary,
            },
            TouchPhase::Move => Self::Move { position },
            TouchPhase::End => Self::Up {
                position,
                button: PointerButton::Primary,
            },
            TouchPhase::Cancel => Self::Leave,
        }
    }

    /// Position carried by the event, if any.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::Down { position, .. } | Self::Move { position } | Self::Up { position, .. } => {
                Some(*position)
            }
            Self::Leave => None,
        }
    }
}

/// Clamp a point into `[0, width] x [0, height]`.
pub fn clamp_to_surface(point: Point, width: u32, height: u32) -> Point {
    let x = if point.x.is_nan() { 0.0 } else { point.x };
    let y = if point.y.is_nan() { 0.0 } else { point.y };
    Point::new(x.clamp(0.0, width as f64), y.clamp(0.0, height as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_normalization() {
        let p = Point::new(12.0, 34.0);
        assert_eq!(
            PointerEvent::from_touch(TouchPhase::Start, p),
            PointerEvent::Down {
                position: p,
                button: PointerButton::Primary
            }
        );
        assert_eq!(
            PointerEvent::from_touch(TouchPhase::Move, p),
            PointerEvent::Move { position: p }
        );
        assert_eq!(
            PointerEvent::from_touch(TouchPhase::End, p),
            PointerEvent::up(12.0, 34.0)
        );
        assert_eq!(
            PointerEvent::from_touch(TouchPhase::Cancel, p),
            PointerEvent::Leave
        );
    }

    #[test]
    fn test_clamp_to_surface() {
        assert_eq!(
            clamp_to_surface(Point::new(-5.0, 700.0), 800, 600),
            Point::new(0.0, 600.0)
        );
        assert_eq!(
            clamp_to_surface(Point::new(f64::NAN, 10.0), 800, 600),
            Point::new(0.0, 10.0)
        );
    }

    #[test]
    fn test_position() {
        assert_eq!(PointerEvent::moved(1.0, 2.0).position(), Some(Point::new(1.0, 2.0)));
        assert_eq!(PointerEvent::Leave.position(), None);
    }
}
