//! Layer descriptors and per-layer bookkeeping.

use std::fmt;

use kurbo::{BezPath, Point, Rect, Shape};
use peniko::Mix;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::surface::SurfaceId;

/// Unique layer identifier. Never reused after deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new() -> Self {
        Self(format!("layer-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a layer composites onto the layers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    pub fn to_mix(self) -> Mix {
        match self {
            BlendMode::Normal => Mix::Normal,
            BlendMode::Multiply => Mix::Multiply,
            BlendMode::Screen => Mix::Screen,
            BlendMode::Overlay => Mix::Overlay,
            BlendMode::Darken => Mix::Darken,
            BlendMode::Lighten => Mix::Lighten,
        }
    }
}

/// Resolved layer descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub id: LayerId,
    pub name: String,
    pub z_index: i32,
    pub visible: bool,
    pub opacity: f64,
    pub blend_mode: BlendMode,
    pub cacheable: bool,
    /// Configured interactivity; a lock overrides it without changing it.
    pub interactive: bool,
    pub clip_bounds: Option<Rect>,
}

/// Data for creating a layer. Also the layer entry of the engine config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSpec {
    pub name: String,
    pub z_index: i32,
    pub visible: bool,
    pub opacity: f64,
    pub blend_mode: BlendMode,
    pub cacheable: bool,
    pub interactive: bool,
    pub clip_bounds: Option<Rect>,
}

impl Default for LayerSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            z_index: 0,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            cacheable: true,
            interactive: false,
            clip_bounds: None,
        }
    }
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, z_index: i32) -> Self {
        Self {
            name: name.into(),
            z_index,
            ..Self::default()
        }
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip_bounds = Some(clip);
        self
    }

    pub fn with_blend(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// The five layers every layer set starts with, bottom to top.
    pub fn defaults() -> Vec<LayerSpec> {
        vec![
            LayerSpec::new("background", 0),
            LayerSpec::new("grid", 10),
            LayerSpec::new("objects", 20).interactive(true),
            LayerSpec::new("ui", 30).interactive(true),
            LayerSpec::new("overlay", 40),
        ]
    }

    pub(crate) fn into_config(self, id: LayerId) -> LayerConfig {
        LayerConfig {
            id,
            name: self.name,
            z_index: self.z_index,
            visible: self.visible,
            opacity: clamp_opacity(self.opacity, 1.0),
            blend_mode: self.blend_mode,
            cacheable: self.cacheable,
            interactive: self.interactive,
            clip_bounds: self.clip_bounds,
        }
    }
}

/// Partial layer update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerUpdate {
    pub name: Option<String>,
    pub z_index: Option<i32>,
    pub visible: Option<bool>,
    pub opacity: Option<f64>,
    pub blend_mode: Option<BlendMode>,
    pub cacheable: Option<bool>,
    pub interactive: Option<bool>,
    /// `Some(None)` removes the clip. In JSON, an absent key leaves it alone
    /// and `null` removes it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub clip_bounds: Option<Option<Rect>>,
}

/// Distinguish an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl LayerUpdate {
    pub fn z_index(z_index: i32) -> Self {
        Self {
            z_index: Some(z_index),
            ..Self::default()
        }
    }

    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }
}

pub(crate) fn clamp_opacity(opacity: f64, fallback: f64) -> f64 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Cache state of a layer's rendered content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    #[default]
    None,
    Valid,
    Invalid,
}

/// An application object tracked by a layer: its id and cached placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerObject {
    pub id: String,
    pub position: Point,
    pub bounds: Rect,
    pub visible: bool,
    pub z_index: i32,
    /// Layer-manager revision of the last change.
    pub last_update: u64,
}

impl LayerObject {
    pub fn new(id: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            position: bounds.origin(),
            bounds,
            visible: true,
            z_index: 0,
            last_update: 0,
        }
    }

    pub fn at(mut self, position: Point) -> Self {
        self.position = position;
        self
    }
}

/// Mutable per-layer bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerState {
    pub objects: Vec<LayerObject>,
    /// Union of the object bounds; zero when empty.
    pub bounds: Rect,
    pub is_dirty: bool,
    pub last_update: u64,
    pub render_count: u64,
    pub cache_status: CacheStatus,
}

/// A layer owned by a [`LayerManager`](super::LayerManager).
#[derive(Debug, Clone)]
pub struct LayerInstance {
    pub config: LayerConfig,
    pub state: LayerState,
    pub(crate) surface: SurfaceId,
    /// Area the layer draws into: its clip, or the whole surface.
    pub render_bounds: Rect,
    pub clip_path: Option<BezPath>,
}

impl LayerInstance {
    pub fn id(&self) -> &LayerId {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub(crate) fn set_clip(&mut self, clip: Option<Rect>, surface_rect: Rect) {
        self.config.clip_bounds = clip;
        self.clip_path = clip.map(|rect| rect.to_path(0.1));
        self.render_bounds = clip.unwrap_or(surface_rect);
    }
}
