//! Per-canvas service registry.
//!
//! One [`CanvasRegistry`] is built at application start and handed to whatever
//! needs canvases. Each canvas bundles a viewport, its layers and its rendering
//! service; canvases share nothing mutable.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use battlemap_core::clock::FrameClock;
use battlemap_core::config::EngineConfig;
use battlemap_core::coords::{CoordinateConversion, CoordinateSpace};
use battlemap_core::grid::{GridConfig, GridSnapConfig};
use battlemap_core::layers::LayerManager;
use battlemap_core::snap::{SnapResult, snap_point};
use battlemap_core::viewport::{FrameOutcome, ViewportManager};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::RenderingService;

/// Unique canvas identifier. Never reused after destruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasId(String);

impl CanvasId {
    fn new() -> Self {
        Self(format!("canvas-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A viewport, its layers and its renderables.
#[derive(Debug)]
pub struct Canvas {
    id: CanvasId,
    viewport: ViewportManager,
    rendering: RenderingService,
    pub grid: GridConfig,
    pub snap: GridSnapConfig,
}

/// Mutable viewport access. Render callbacks and hit tolerance pick up the
/// new zoom when the guard is dropped.
pub struct ViewportMut<'a> {
    viewport: &'a mut ViewportManager,
    rendering: &'a mut RenderingService,
}

impl Deref for ViewportMut<'_> {
    type Target = ViewportManager;

    fn deref(&self) -> &ViewportManager {
        self.viewport
    }
}

impl DerefMut for ViewportMut<'_> {
    fn deref_mut(&mut self) -> &mut ViewportManager {
        self.viewport
    }
}

impl Drop for ViewportMut<'_> {
    fn drop(&mut self) {
        self.rendering.set_zoom(self.viewport.zoom());
    }
}

impl Canvas {
    pub fn id(&self) -> &CanvasId {
        &self.id
    }

    pub fn viewport(&self) -> &ViewportManager {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> ViewportMut<'_> {
        ViewportMut {
            viewport: &mut self.viewport,
            rendering: &mut self.rendering,
        }
    }

    pub fn rendering(&self) -> &RenderingService {
        &self.rendering
    }

    pub fn rendering_mut(&mut self) -> &mut RenderingService {
        &mut self.rendering
    }

    pub fn layers(&self) -> &LayerManager {
        self.rendering.layers()
    }

    pub fn layers_mut(&mut self) -> &mut LayerManager {
        self.rendering.layers_mut()
    }

    /// Snap a world point using the canvas grid.
    pub fn snap(&self, point: Point) -> SnapResult {
        snap_point(point, &self.grid, &self.snap)
    }

    /// Resize the viewport and every layer surface.
    pub fn resize(&mut self, size: Size) {
        self.viewport_mut().set_surface_size(size);
        self.rendering.layers_mut().set_surface_size(size);
    }

    /// Advance the viewport animation and keep render callbacks' zoom current.
    pub fn tick(&mut self) -> FrameOutcome {
        let outcome = self.viewport.tick();
        self.rendering.set_zoom(self.viewport.zoom());
        outcome
    }

    fn destroy(&mut self) {
        self.viewport.destroy();
        self.rendering.destroy();
    }
}

/// Owner of every live canvas.
pub struct CanvasRegistry {
    config: EngineConfig,
    clock: Arc<dyn FrameClock>,
    canvases: HashMap<CanvasId, Canvas>,
}

impl fmt::Debug for CanvasRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasRegistry")
            .field("config", &self.config)
            .field("canvases", &self.canvases.len())
            .finish_non_exhaustive()
    }
}

impl CanvasRegistry {
    pub fn new(config: EngineConfig, clock: Arc<dyn FrameClock>) -> Self {
        Self {
            config,
            clock,
            canvases: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }

    /// Create a canvas with the configured layers over a surface of `size` pixels.
    pub fn create_canvas(&mut self, size: Size) -> CanvasId {
        let id = CanvasId::new();
        let viewport = ViewportManager::new(size, self.config.viewport, self.clock.clone());
        let layers = LayerManager::with_layers(size, self.config.layers.iter().cloned());
        let canvas = Canvas {
            id: id.clone(),
            viewport,
            rendering: RenderingService::new(layers),
            grid: self.config.grid,
            snap: self.config.snap,
        };
        log::info!("created canvas {id} ({}x{})", size.width, size.height);
        self.canvases.insert(id.clone(), canvas);
        id
    }

    pub fn canvas(&self, id: &CanvasId) -> Option<&Canvas> {
        self.canvases.get(id)
    }

    pub fn canvas_mut(&mut self, id: &CanvasId) -> Option<&mut Canvas> {
        self.canvases.get_mut(id)
    }

    pub fn viewport(&self, id: &CanvasId) -> Option<&ViewportManager> {
        self.canvas(id).map(Canvas::viewport)
    }

    pub fn viewport_mut(&mut self, id: &CanvasId) -> Option<ViewportMut<'_>> {
        self.canvas_mut(id).map(Canvas::viewport_mut)
    }

    pub fn layers(&self, id: &CanvasId) -> Option<&LayerManager> {
        self.canvas(id).map(Canvas::layers)
    }

    pub fn layers_mut(&mut self, id: &CanvasId) -> Option<&mut LayerManager> {
        self.canvas_mut(id).map(Canvas::layers_mut)
    }

    pub fn rendering(&self, id: &CanvasId) -> Option<&RenderingService> {
        self.canvas(id).map(Canvas::rendering)
    }

    pub fn rendering_mut(&mut self, id: &CanvasId) -> Option<&mut RenderingService> {
        self.canvas_mut(id).map(Canvas::rendering_mut)
    }

    /// Destroy a canvas and everything it owns. Unknown ids return `false`.
    pub fn destroy_canvas(&mut self, id: &CanvasId) -> bool {
        match self.canvases.remove(id) {
            Some(mut canvas) => {
                canvas.destroy();
                log::info!("destroyed canvas {id}");
                true
            }
            None => {
                log::debug!("destroy_canvas: unknown canvas {id}");
                false
            }
        }
    }

    /// Live canvas ids, sorted.
    pub fn canvas_ids(&self) -> Vec<CanvasId> {
        let mut ids: Vec<_> = self.canvases.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Step every viewport animation once. Returns the canvases that still need frames.
    pub fn tick_all(&mut self) -> Vec<CanvasId> {
        let mut pending: Vec<_> = self
            .canvases
            .iter_mut()
            .filter_map(|(id, canvas)| (canvas.tick() == FrameOutcome::Continue).then(|| id.clone()))
            .collect();
        pending.sort();
        pending
    }

    /// Convert a point in a canvas. Unknown canvases yield an invalid, unchanged conversion.
    pub fn convert_coordinates(
        &self,
        id: &CanvasId,
        point: Point,
        from: CoordinateSpace,
        to: CoordinateSpace,
    ) -> CoordinateConversion {
        match self.viewport(id) {
            Some(viewport) => viewport.convert_coordinates(point, from, to),
            None => {
                log::debug!("convert_coordinates: unknown canvas {id}");
                CoordinateConversion::invalid(point, from, to)
            }
        }
    }
}
