//! Engine configuration.

use std::collections::HashSet;
use std::path::Path;

use kurbo::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{GridConfig, GridSnapConfig};
use crate::layers::LayerSpec;
use crate::viewport::ViewportConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Initial pixel size of a canvas surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl SurfaceConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Everything needed to build a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: ViewportConfig,
    pub grid: GridConfig,
    pub snap: GridSnapConfig,
    pub layers: Vec<LayerSpec>,
    pub surface: SurfaceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            grid: GridConfig::default(),
            snap: GridSnapConfig::default(),
            layers: LayerSpec::defaults(),
            surface: SurfaceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        log::debug!("loaded engine config from {}", path.display());
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let viewport = &self.viewport;
        if !viewport.min_zoom.is_finite() || viewport.min_zoom <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_zoom must be positive, got {}",
                viewport.min_zoom
            )));
        }
        if !viewport.max_zoom.is_finite() || viewport.min_zoom > viewport.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "min_zoom {} exceeds max_zoom {}",
                viewport.min_zoom, viewport.max_zoom
            )));
        }
        if viewport.zoom_step.is_nan() || viewport.zoom_step <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "zoom_step must be greater than 1, got {}",
                viewport.zoom_step
            )));
        }
        if viewport.default_duration_ms.is_nan() || viewport.default_duration_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "default_duration_ms must not be negative, got {}",
                viewport.default_duration_ms
            )));
        }
        if !self.grid.is_valid() {
            return Err(ConfigError::Invalid(format!("grid size must be positive, got {}", self.grid.size)));
        }
        if self.surface.width.is_nan() || self.surface.height.is_nan() || self.surface.width < 0.0 || self.surface.height < 0.0 {
            return Err(ConfigError::Invalid("surface size must not be negative".to_string()));
        }

        let mut names = HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() {
                return Err(ConfigError::Invalid("layer name must not be empty".to_string()));
            }
            if !names.insert(layer.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate layer name: {}", layer.name)));
            }
        }
        Ok(())
    }
}
