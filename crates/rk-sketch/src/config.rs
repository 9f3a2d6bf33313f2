//! Sketch editor settings
//!
//! Settings are plain serializable structs injected into a [`Sketch`](crate::Sketch)
//! at construction. They can be persisted as RON next to the other editor
//! preferences.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Point snapping configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SnapSettings {
    /// Snap radius in screen pixels
    ///
    /// Converted to world units on every query. Without an interactive view
    /// the value is used directly as a world distance.
    pub distance_px: f32,
    /// World distance used when the radius cannot be derived from the view
    pub fallback_distance: f32,
    /// Fraction of the snap radius within which axis guides engage
    pub axis_ratio: f32,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            distance_px: 35.0,
            fallback_distance: 5.0,
            axis_ratio: 0.5,
        }
    }
}

/// Complete sketch configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SketchSettings {
    /// Snapping behaviour
    #[serde(default)]
    pub snap: SnapSettings,
    /// Maximum angle (degrees) covered by one segment when arcs are flattened
    #[serde(default = "default_arc_step_degrees")]
    pub arc_step_degrees: f32,
    /// Positional tolerance for face containment tests
    #[serde(default = "default_containment_tolerance")]
    pub containment_tolerance: f32,
    /// Divisor applied to edge lengths shown as dimensions
    #[serde(default = "default_dimension_scale")]
    pub dimension_scale: f32,
}

fn default_arc_step_degrees() -> f32 {
    10.0
}

fn default_containment_tolerance() -> f32 {
    1e-3
}

fn default_dimension_scale() -> f32 {
    1.0
}

impl Default for SketchSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SketchSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self {
            snap: SnapSettings::default(),
            arc_step_degrees: default_arc_step_degrees(),
            containment_tolerance: default_containment_tolerance(),
            dimension_scale: default_dimension_scale(),
        }
    }

    /// Set the snap radius in pixels
    pub fn with_snap_distance(mut self, distance_px: f32) -> Self {
        self.snap.distance_px = distance_px.max(0.0);
        self
    }

    /// Set the arc flattening step in degrees
    pub fn with_arc_step(mut self, degrees: f32) -> Self {
        self.arc_step_degrees = degrees.clamp(0.5, 90.0);
        self
    }

    /// Set the dimension scale
    pub fn with_dimension_scale(mut self, scale: f32) -> Self {
        if scale > 0.0 {
            self.dimension_scale = scale;
        }
        self
    }

    /// Parse settings from RON text
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Serialize settings to pretty RON text
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load settings from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = self.to_ron_string()?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}
