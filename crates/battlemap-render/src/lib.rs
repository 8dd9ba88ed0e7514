//! Battle-map Render Library
//!
//! Renderable registry, per-layer re-rendering and the per-canvas service registry.

pub mod canvas;
pub mod renderer;
pub mod service;

pub use canvas::{Canvas, CanvasId, CanvasRegistry, ViewportMut};
pub use renderer::{GridStyle, RenderContext, RenderFn, RenderStats, RenderableObject, RenderableUpdate, grid_drawable};
pub use service::{HIT_TOLERANCE, RenderingService};
