//! Session configuration.

use crate::color::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for one drawing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Initial surface width in pixels.
    pub width: u32,
    /// Initial surface height in pixels.
    pub height: u32,
    /// Upper bound on the surface width, applied on creation and resize.
    pub max_width: u32,
    /// Upper bound on the surface height, applied on creation and resize.
    pub max_height: u32,
    /// Background color, also painted by the eraser and by clear.
    pub background: Color,
    /// Initially selected stroke color.
    pub stroke_color: Color,
    /// Initially selected stroke width.
    pub stroke_width: f64,
    /// Maximum number of history entries.
    pub history_capacity: usize,
    /// Scale factor of history thumbnails relative to the surface.
    pub thumbnail_scale: f64,
    /// Minimum interval between outbound stroke segments.
    pub stroke_window_ms: u64,
    /// Minimum interval between outbound full-frame snapshots.
    pub snapshot_window_ms: u64,
    /// JPEG quality (1-100) of outbound snapshots.
    pub snapshot_quality: u8,
    /// Stroke segments kept while the store is unreachable; the oldest are dropped beyond this.
    pub max_queued_strokes: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            max_width: 1920,
            max_height: 1080,
            background: Color::WHITE,
            stroke_color: Color::BLACK,
            stroke_width: 2.0,
            history_capacity: 50,
            thumbnail_scale: 0.25,
            stroke_window_ms: 50,
            snapshot_window_ms: 1000,
            snapshot_quality: 50,
            max_queued_strokes: 1000,
        }
    }
}

impl BoardConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn stroke_window(&self) -> Duration {
        Duration::from_millis(self.stroke_window_ms)
    }

    pub fn snapshot_window(&self) -> Duration {
        Duration::from_millis(self.snapshot_window_ms)
    }

    /// Clamp requested surface dimensions to `1..=max`.
    pub fn clamp_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.clamp(1, self.max_width.max(1)),
            height.clamp(1, self.max_height.max(1)),
        )
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid {
                field: "width/height",
                reason: "surface dimensions must be non-zero".to_string(),
            });
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::Invalid {
                field: "max_width/max_height",
                reason: "maximum dimensions must be non-zero".to_string(),
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "history_capacity",
                reason: "must hold at least one entry".to_string(),
            });
        }
        if !(self.thumbnail_scale > 0.0 && self.thumbnail_scale <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "thumbnail_scale",
                reason: format!("{} is outside (0, 1]", self.thumbnail_scale),
            });
        }
        if !(1..=100).contains(&self.snapshot_quality) {
            return Err(ConfigError::Invalid {
                field: "snapshot_quality",
                reason: format!("{} is outside 1..=100", self.snapshot_quality),
            });
        }
        if self.max_queued_strokes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_queued_strokes",
                reason: "must hold at least one segment".to_string(),
            });
        }
        if !(self.stroke_width.is_finite() && self.stroke_width > 0.0) {
            return Err(ConfigError::Invalid {
                field: "stroke_width",
                reason: format!("{} is not a positive width", self.stroke_width),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BoardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.stroke_window(), Duration::from_millis(50));
        assert_eq!(config.snapshot_window(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BoardConfig::from_json(r##"{"width": 320, "background": "#000000"}"##).unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 600);
        assert_eq!(config.background, Color::BLACK);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(BoardConfig::from_json(r#"{"history_capacity": 0}"#).is_err());
        assert!(BoardConfig::from_json(r#"{"thumbnail_scale": 1.5}"#).is_err());
        assert!(BoardConfig::from_json(r#"{"snapshot_quality": 0}"#).is_err());
        assert!(BoardConfig::from_json(r#"{"max_queued_strokes": 0}"#).is_err());
        assert!(BoardConfig::from_json(r#"{"background": "red"}"#).is_err());
    }

    #[test]
    fn test_clamp_size() {
        let config = BoardConfig::default();
        assert_eq!(config.clamp_size(4000, 0), (1920, 1));
        assert_eq!(config.clamp_size(640, 480), (640, 480));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, r#"{"snapshot_window_ms": 250}"#).unwrap();

        let config = BoardConfig::load(&path).unwrap();
        assert_eq!(config.snapshot_window(), Duration::from_millis(250));
    }
}
