//! Ordered set of layers over one container surface.

use std::collections::{HashMap, HashSet};

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

use super::config::{
    CacheStatus, LayerConfig, LayerId, LayerInstance, LayerObject, LayerSpec, LayerState, LayerUpdate,
    clamp_opacity,
};
use crate::coords::{rect_contains_inclusive, union_bounds};
use crate::surface::{Drawable, NodeId, Surface, SurfaceArena, SurfaceId};

/// One layer in a [`LayerManagerState`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub config: LayerConfig,
    pub state: LayerState,
    pub locked: bool,
}

/// Copy of a layer set for UI display, layers in render order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerManagerState {
    pub layers: Vec<LayerSnapshot>,
    pub render_order: Vec<LayerId>,
    pub visible_layers: Vec<LayerId>,
    pub locked_layers: Vec<LayerId>,
    pub active_layer: Option<LayerId>,
}

/// Owns the layers of one canvas and their backing surfaces.
///
/// `render_order` is kept sorted ascending by `z_index` (stable, so equal
/// indices keep insertion order), and the child order of the layer surfaces
/// under the container always matches it.
#[derive(Debug)]
pub struct LayerManager {
    surfaces: SurfaceArena,
    container: Option<SurfaceId>,
    layers: HashMap<LayerId, LayerInstance>,
    render_order: Vec<LayerId>,
    visible_layers: HashSet<LayerId>,
    locked_layers: HashSet<LayerId>,
    active_layer: Option<LayerId>,
    revision: u64,
}

impl LayerManager {
    /// A layer set with the five default layers, `objects` active.
    pub fn new(size: Size) -> Self {
        Self::with_layers(size, LayerSpec::defaults())
    }

    /// A layer set built from `specs`. The `objects` layer becomes active when
    /// present, otherwise the bottom layer.
    pub fn with_layers(size: Size, specs: impl IntoIterator<Item = LayerSpec>) -> Self {
        let mut surfaces = SurfaceArena::new();
        let container = surfaces.create(size);
        let mut manager = Self {
            surfaces,
            container: Some(container),
            layers: HashMap::new(),
            render_order: Vec::new(),
            visible_layers: HashSet::new(),
            locked_layers: HashSet::new(),
            active_layer: None,
            revision: 0,
        };
        for spec in specs {
            manager.create_layer(spec);
        }
        manager.active_layer = manager
            .layer_by_name("objects")
            .map(|layer| layer.config.id.clone())
            .or_else(|| manager.render_order.first().cloned());
        manager
    }

    pub fn is_destroyed(&self) -> bool {
        self.container.is_none()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer ids bottom to top.
    pub fn render_order(&self) -> &[LayerId] {
        &self.render_order
    }

    pub fn active_layer(&self) -> Option<&LayerId> {
        self.active_layer.as_ref()
    }

    pub fn set_active_layer(&mut self, id: &LayerId) -> bool {
        if !self.layers.contains_key(id) {
            log::debug!("set_active_layer: unknown layer {id}");
            return false;
        }
        self.active_layer = Some(id.clone());
        true
    }

    pub fn layer(&self, id: &LayerId) -> Option<&LayerInstance> {
        self.layers.get(id)
    }

    /// First layer in render order with this name.
    pub fn layer_by_name(&self, name: &str) -> Option<&LayerInstance> {
        self.render_order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .find(|layer| layer.config.name == name)
    }

    /// Layers bottom to top.
    pub fn layers_ordered(&self) -> impl Iterator<Item = &LayerInstance> {
        self.render_order.iter().filter_map(|id| self.layers.get(id))
    }

    pub fn is_visible(&self, id: &LayerId) -> bool {
        self.visible_layers.contains(id)
    }

    pub fn is_locked(&self, id: &LayerId) -> bool {
        self.locked_layers.contains(id)
    }

    /// Configured interactivity, forced off while locked.
    pub fn is_interactive(&self, id: &LayerId) -> bool {
        self.layers
            .get(id)
            .is_some_and(|layer| layer.config.interactive && !self.is_locked(id))
    }

    /// Backing surface of a layer.
    pub fn surface(&self, id: &LayerId) -> Option<&Surface> {
        self.surfaces.get(self.layers.get(id)?.surface)
    }

    pub fn container(&self) -> Option<&Surface> {
        self.surfaces.get(self.container?)
    }

    /// Create a layer and its backing surface.
    pub fn create_layer(&mut self, spec: LayerSpec) -> Option<LayerId> {
        let container = self.container?;
        let id = LayerId::new();
        let config = spec.into_config(id.clone());
        let size = self.surface_size();
        let surface = self.surfaces.create(size);
        self.surfaces.add_child(container, surface);

        let mut instance = LayerInstance {
            config,
            state: LayerState::default(),
            surface,
            render_bounds: Rect::from_origin_size(Point::ORIGIN, size),
            clip_path: None,
        };
        instance.set_clip(instance.config.clip_bounds, Rect::from_origin_size(Point::ORIGIN, size));
        instance.state.last_update = self.bump();

        if instance.config.visible {
            self.visible_layers.insert(id.clone());
        }
        log::debug!("created layer {} ({id}) at z {}", instance.config.name, instance.config.z_index);
        self.layers.insert(id.clone(), instance);
        self.render_order.push(id.clone());
        self.sync_surface(&id);
        self.sort_render_order();
        Some(id)
    }

    /// Apply a partial update. A `z_index` change re-sorts the render order.
    pub fn update_layer(&mut self, id: &LayerId, update: LayerUpdate) -> bool {
        let revision = self.bump();
        let surface_rect = Rect::from_origin_size(Point::ORIGIN, self.surface_size());
        let Some(layer) = self.layers.get_mut(id) else {
            log::warn!("update_layer: unknown layer {id}");
            return false;
        };

        let reorder = update
            .z_index
            .is_some_and(|z_index| z_index != layer.config.z_index);
        if let Some(name) = update.name {
            layer.config.name = name;
        }
        if let Some(z_index) = update.z_index {
            layer.config.z_index = z_index;
        }
        if let Some(visible) = update.visible {
            layer.config.visible = visible;
        }
        if let Some(opacity) = update.opacity {
            layer.config.opacity = clamp_opacity(opacity, layer.config.opacity);
        }
        if let Some(blend_mode) = update.blend_mode {
            layer.config.blend_mode = blend_mode;
        }
        if let Some(cacheable) = update.cacheable {
            layer.config.cacheable = cacheable;
        }
        if let Some(interactive) = update.interactive {
            layer.config.interactive = interactive;
        }
        if let Some(clip) = update.clip_bounds {
            layer.set_clip(clip, surface_rect);
        }
        mark_dirty(layer, revision);

        if layer.config.visible {
            self.visible_layers.insert(id.clone());
        } else {
            self.visible_layers.remove(id);
        }
        self.sync_surface(id);
        if reorder {
            self.sort_render_order();
        }
        true
    }

    /// Delete a layer and its surface. An active layer falls back to the bottom layer.
    pub fn delete_layer(&mut self, id: &LayerId) -> bool {
        let Some(layer) = self.layers.remove(id) else {
            log::debug!("delete_layer: unknown layer {id}");
            return false;
        };
        self.surfaces.destroy(layer.surface);
        self.render_order.retain(|other| other != id);
        self.visible_layers.remove(id);
        self.locked_layers.remove(id);
        if self.active_layer.as_ref() == Some(id) {
            self.active_layer = self.render_order.first().cloned();
        }
        self.bump();
        log::debug!("deleted layer {} ({id})", layer.config.name);
        true
    }

    pub fn set_layer_visibility(&mut self, id: &LayerId, visible: bool) -> bool {
        self.update_layer(id, LayerUpdate::visible(visible))
    }

    /// Set opacity, clamped to `[0, 1]`.
    pub fn set_layer_opacity(&mut self, id: &LayerId, opacity: f64) -> bool {
        self.update_layer(
            id,
            LayerUpdate {
                opacity: Some(opacity),
                ..LayerUpdate::default()
            },
        )
    }

    /// Lock or unlock a layer. Locking disables interactivity until unlocked.
    pub fn set_layer_locked(&mut self, id: &LayerId, locked: bool) -> bool {
        if !self.layers.contains_key(id) {
            log::debug!("set_layer_locked: unknown layer {id}");
            return false;
        }
        if locked {
            self.locked_layers.insert(id.clone());
        } else {
            self.locked_layers.remove(id);
        }
        self.sync_surface(id);
        true
    }

    /// Swap z-index with the layer above.
    pub fn move_layer_up(&mut self, id: &LayerId) -> bool {
        let Some(pos) = self.render_order.iter().position(|other| other == id) else {
            return false;
        };
        if pos + 1 >= self.render_order.len() {
            return false;
        }
        self.swap_with(pos, pos + 1)
    }

    /// Swap z-index with the layer below.
    pub fn move_layer_down(&mut self, id: &LayerId) -> bool {
        let Some(pos) = self.render_order.iter().position(|other| other == id) else {
            return false;
        };
        if pos == 0 {
            return false;
        }
        self.swap_with(pos, pos - 1)
    }

    /// Track an object in a layer, replacing an entry with the same id.
    pub fn add_object_to_layer(&mut self, id: &LayerId, mut object: LayerObject) -> bool {
        let revision = self.bump();
        let Some(layer) = self.layers.get_mut(id) else {
            log::debug!("add_object_to_layer: unknown layer {id}");
            return false;
        };
        object.last_update = revision;
        match layer.state.objects.iter_mut().find(|existing| existing.id == object.id) {
            Some(existing) => *existing = object,
            None => layer.state.objects.push(object),
        }
        recompute_bounds(layer);
        mark_dirty(layer, revision);
        true
    }

    /// Stop tracking an object; returns it when it was present.
    pub fn remove_object_from_layer(&mut self, id: &LayerId, object_id: &str) -> Option<LayerObject> {
        let revision = self.bump();
        let layer = self.layers.get_mut(id)?;
        let index = layer.state.objects.iter().position(|object| object.id == object_id)?;
        let object = layer.state.objects.remove(index);
        recompute_bounds(layer);
        mark_dirty(layer, revision);
        Some(object)
    }

    /// Move an object between layers. Either both layers change or neither does.
    pub fn move_object_to_layer(&mut self, object_id: &str, from: &LayerId, to: &LayerId) -> bool {
        if from == to {
            return self
                .layers
                .get(from)
                .is_some_and(|layer| layer.state.objects.iter().any(|object| object.id == object_id));
        }
        let present = self
            .layers
            .get(from)
            .is_some_and(|layer| layer.state.objects.iter().any(|object| object.id == object_id));
        if !present || !self.layers.contains_key(to) {
            return false;
        }
        match self.remove_object_from_layer(from, object_id) {
            Some(object) => self.add_object_to_layer(to, object),
            None => false,
        }
    }

    /// Tracked objects of a layer.
    pub fn objects_in_layer(&self, id: &LayerId) -> &[LayerObject] {
        self.layers
            .get(id)
            .map(|layer| layer.state.objects.as_slice())
            .unwrap_or(&[])
    }

    /// Drop every object and drawn node of a layer.
    pub fn clear_layer(&mut self, id: &LayerId) -> bool {
        let revision = self.bump();
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        layer.state.objects.clear();
        recompute_bounds(layer);
        mark_dirty(layer, revision);
        let surface = layer.surface;
        if let Some(surface) = self.surfaces.get_mut(surface) {
            surface.clear_nodes();
        }
        true
    }

    /// Record a completed render of the layer.
    pub fn mark_clean(&mut self, id: &LayerId) -> bool {
        let revision = self.bump();
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        layer.state.is_dirty = false;
        layer.state.render_count += 1;
        layer.state.last_update = revision;
        layer.state.cache_status = if layer.config.cacheable {
            CacheStatus::Valid
        } else {
            CacheStatus::None
        };
        true
    }

    /// Visible, interactive layers whose content and clip contain `point`, top first.
    pub fn layers_at_point(&self, point: Point) -> Vec<LayerId> {
        self.render_order
            .iter()
            .rev()
            .filter(|id| self.is_visible(id) && self.is_interactive(id))
            .filter_map(|id| self.layers.get(id))
            .filter(|layer| {
                layer
                    .config
                    .clip_bounds
                    .is_none_or(|clip| rect_contains_inclusive(clip, point))
                    && !layer.state.objects.is_empty()
                    && rect_contains_inclusive(layer.state.bounds, point)
            })
            .map(|layer| layer.config.id.clone())
            .collect()
    }

    /// Draw a node into a layer's surface on behalf of `owner`.
    pub fn draw(&mut self, id: &LayerId, owner: &str, drawable: Drawable) -> Option<NodeId> {
        let surface = self.layers.get(id)?.surface;
        self.surfaces.add_node(surface, owner, drawable)
    }

    /// Remove the nodes `owner` drew into a layer.
    pub fn erase(&mut self, id: &LayerId, owner: &str) -> usize {
        let Some(surface) = self.layers.get(id).map(|layer| layer.surface) else {
            return 0;
        };
        self.surfaces
            .get_mut(surface)
            .map_or(0, |surface| surface.remove_nodes_of(owner))
    }

    /// Remove every drawn node of a layer, keeping its tracked objects.
    pub fn erase_all(&mut self, id: &LayerId) -> bool {
        let Some(surface) = self.layers.get(id).map(|layer| layer.surface) else {
            return false;
        };
        match self.surfaces.get_mut(surface) {
            Some(surface) => {
                surface.clear_nodes();
                true
            }
            None => false,
        }
    }

    /// Owner of the topmost drawn node under `point`, searching visible
    /// listening layers from the top.
    pub fn hit(&self, point: Point, tolerance: f64) -> Option<(LayerId, String)> {
        self.render_order.iter().rev().find_map(|id| {
            if !self.is_visible(id) {
                return None;
            }
            let surface = self.surface(id)?;
            if !surface.listening {
                return None;
            }
            surface
                .hit(point, tolerance)
                .map(|node| (id.clone(), node.owner.clone()))
        })
    }

    pub fn surface_size(&self) -> Size {
        self.container().map_or(Size::ZERO, |surface| surface.size)
    }

    /// Resize the container and every layer surface.
    pub fn set_surface_size(&mut self, size: Size) {
        let Some(container) = self.container else {
            return;
        };
        if let Some(surface) = self.surfaces.get_mut(container) {
            surface.size = size;
        }
        let rect = Rect::from_origin_size(Point::ORIGIN, size);
        for layer in self.layers.values_mut() {
            let clip = layer.config.clip_bounds;
            layer.set_clip(clip, rect);
            if let Some(surface) = self.surfaces.get_mut(layer.surface) {
                surface.size = size;
            }
        }
    }

    pub fn state(&self) -> LayerManagerState {
        let layers = self
            .layers_ordered()
            .map(|layer| LayerSnapshot {
                config: layer.config.clone(),
                state: layer.state.clone(),
                locked: self.is_locked(&layer.config.id),
            })
            .collect();
        let in_order = |set: &HashSet<LayerId>| {
            self.render_order
                .iter()
                .filter(|id| set.contains(*id))
                .cloned()
                .collect::<Vec<_>>()
        };
        LayerManagerState {
            layers,
            render_order: self.render_order.clone(),
            visible_layers: in_order(&self.visible_layers),
            locked_layers: in_order(&self.locked_layers),
            active_layer: self.active_layer.clone(),
        }
    }

    /// Destroy every surface and forget every layer.
    pub fn destroy(&mut self) {
        if let Some(container) = self.container.take() {
            self.surfaces.destroy(container);
        }
        self.surfaces.clear();
        self.layers.clear();
        self.render_order.clear();
        self.visible_layers.clear();
        self.locked_layers.clear();
        self.active_layer = None;
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn swap_with(&mut self, a: usize, b: usize) -> bool {
        let (id_a, id_b) = (self.render_order[a].clone(), self.render_order[b].clone());
        let (Some(z_a), Some(z_b)) = (
            self.layers.get(&id_a).map(|layer| layer.config.z_index),
            self.layers.get(&id_b).map(|layer| layer.config.z_index),
        ) else {
            return false;
        };
        let revision = self.bump();
        for (id, z_index) in [(&id_a, z_b), (&id_b, z_a)] {
            if let Some(layer) = self.layers.get_mut(id) {
                layer.config.z_index = z_index;
                mark_dirty(layer, revision);
            }
        }
        // Equal z-indices keep the swapped order under the stable sort.
        self.render_order.swap(a, b);
        self.sort_render_order();
        true
    }

    fn sort_render_order(&mut self) {
        let layers = &self.layers;
        self.render_order
            .sort_by_key(|id| layers.get(id).map_or(i32::MAX, |layer| layer.config.z_index));
        let Some(container) = self.container else {
            return;
        };
        for (index, id) in self.render_order.iter().enumerate() {
            if let Some(layer) = self.layers.get(id) {
                self.surfaces.set_child_index(container, layer.surface, index);
            }
        }
    }

    /// Push a layer's config onto its backing surface.
    fn sync_surface(&mut self, id: &LayerId) {
        let interactive = self.is_interactive(id);
        let Some(layer) = self.layers.get(id) else {
            return;
        };
        if let Some(surface) = self.surfaces.get_mut(layer.surface) {
            surface.visible = layer.config.visible;
            surface.opacity = layer.config.opacity;
            surface.blend = layer.config.blend_mode.to_mix();
            surface.clip = layer.config.clip_bounds;
            surface.listening = interactive;
        }
    }
}

fn recompute_bounds(layer: &mut LayerInstance) {
    layer.state.bounds = union_bounds(layer.state.objects.iter().map(|object| object.bounds));
}

fn mark_dirty(layer: &mut LayerInstance, revision: u64) {
    layer.state.is_dirty = true;
    layer.state.last_update = revision;
    if layer.state.cache_status == CacheStatus::Valid {
        layer.state.cache_status = CacheStatus::Invalid;
    }
}
