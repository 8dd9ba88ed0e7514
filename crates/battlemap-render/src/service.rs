//! Rendering service: renderable registry, per-layer re-render and hit testing.

use std::collections::HashMap;

use battlemap_core::coords::rect_contains_inclusive;
use battlemap_core::layers::{LayerId, LayerManager, LayerObject};
use kurbo::{Point, Rect};

use crate::renderer::{RenderContext, RenderStats, RenderableObject, RenderableUpdate};

/// Hit tolerance in screen pixels, divided by zoom for world units.
pub const HIT_TOLERANCE: f64 = 4.0;

/// Owns a canvas's renderable objects and draws them into its layers.
///
/// Every render of an object replaces the nodes it previously drew; nothing is
/// patched in place.
#[derive(Debug)]
pub struct RenderingService {
    layers: LayerManager,
    objects: HashMap<String, RenderableObject>,
    /// Registration order, used as paint order within a layer.
    order: Vec<String>,
    /// Layer each object was placed in. Survives layer renames.
    placements: HashMap<String, LayerId>,
    zoom: f64,
    renders: u64,
    destroyed: bool,
}

impl RenderingService {
    pub fn new(layers: LayerManager) -> Self {
        Self {
            layers,
            objects: HashMap::new(),
            order: Vec::new(),
            placements: HashMap::new(),
            zoom: 1.0,
            renders: 0,
            destroyed: false,
        }
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerManager {
        &mut self.layers
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Zoom passed to render callbacks.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn has_object(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn object(&self, id: &str) -> Option<&RenderableObject> {
        self.objects.get(id)
    }

    /// Registered objects in registration order.
    pub fn objects(&self) -> impl Iterator<Item = &RenderableObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Objects placed in the named layer. For an unknown layer, the objects still waiting on it.
    pub fn objects_in_layer(&self, layer: &str) -> Vec<&RenderableObject> {
        match self.layer_id(layer) {
            Some(layer_id) => self
                .objects()
                .filter(|object| self.placed_in(object).as_ref() == Some(&layer_id))
                .collect(),
            None => self.objects().filter(|object| object.layer == layer).collect(),
        }
    }

    /// Number of render callbacks invoked so far.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn stats(&self) -> RenderStats {
        let nodes = self
            .layers
            .layers_ordered()
            .filter_map(|layer| self.layers.surface(layer.id()))
            .map(|surface| surface.nodes().len())
            .sum();
        RenderStats {
            objects: self.objects.len(),
            nodes,
            renders: self.renders,
        }
    }

    /// Register an object and draw it. An existing object with the same id is replaced.
    pub fn add_object(&mut self, object: RenderableObject) -> bool {
        if self.destroyed {
            return false;
        }
        if self.objects.contains_key(&object.id) {
            self.remove_object(&object.id);
        }
        let placement = self.layer_id(&object.layer);
        self.insert(object, placement)
    }

    /// Replace fields of an object, then remove and re-add it so it is drawn afresh.
    pub fn update_object(&mut self, id: &str, update: RenderableUpdate) -> bool {
        if self.destroyed {
            return false;
        }
        let Some(existing) = self.objects.get(id) else {
            log::debug!("update_object: unknown object {id}");
            return false;
        };
        let merged = existing.merged(update);
        // Same layer name: stay in the same layer even if it was renamed since.
        let placement = if merged.layer == existing.layer {
            self.placed_in(existing)
        } else {
            self.layer_id(&merged.layer)
        };
        self.remove_object(id);
        self.insert(merged, placement)
    }

    /// Unregister an object and erase what it drew.
    pub fn remove_object(&mut self, id: &str) -> Option<RenderableObject> {
        if self.destroyed {
            return None;
        }
        let object = self.objects.remove(id)?;
        self.order.retain(|other| other != id);
        if let Some(layer_id) = self.placements.remove(id) {
            self.layers.erase(&layer_id, id);
            self.layers.remove_object_from_layer(&layer_id, id);
        }
        Some(object)
    }

    /// Draw one object into its layer, replacing its previous nodes.
    ///
    /// Hidden objects and objects whose layer does not exist are skipped.
    pub fn render_object(&mut self, id: &str) -> bool {
        if self.destroyed {
            return false;
        }
        let Some(object) = self.objects.get(id) else {
            return false;
        };
        if !object.visible {
            return false;
        }
        let Some(layer) = self.placed_in(object).and_then(|layer_id| self.layers.layer(&layer_id)) else {
            log::warn!("render_object: layer {:?} not found for object {id}", object.layer);
            return false;
        };
        let layer_id = layer.id().clone();
        self.placements.insert(id.to_string(), layer_id.clone());
        let ctx = RenderContext {
            layer: layer.name().to_string(),
            layer_z_index: layer.config.z_index,
            zoom: self.zoom,
        };
        let render = object.render.clone();
        let position = object.position;

        let drawable = render(&ctx);
        self.renders += 1;
        self.layers.erase(&layer_id, id);

        let bounds = drawable
            .as_ref()
            .map_or(Rect::from_origin_size(position, (0.0, 0.0)), |drawable| drawable.bounds());
        self.layers
            .add_object_to_layer(&layer_id, LayerObject::new(id, bounds).at(position));
        match drawable {
            Some(drawable) => self.layers.draw(&layer_id, id, drawable).is_some(),
            None => false,
        }
    }

    /// Clear the named layer's drawn nodes and redraw every object assigned to it.
    ///
    /// Returns the number of objects drawn.
    pub fn render_layer(&mut self, name: &str) -> usize {
        if self.destroyed {
            return 0;
        }
        let Some(layer_id) = self.layer_id(name) else {
            log::warn!("render_layer: layer {name:?} not found");
            return 0;
        };
        self.layers.erase_all(&layer_id);
        let ids: Vec<String> = self
            .objects()
            .filter(|object| self.placed_in(object).as_ref() == Some(&layer_id))
            .map(|object| object.id.clone())
            .collect();
        let drawn = ids.iter().filter(|id| self.render_object(id)).count();
        self.layers.mark_clean(&layer_id);
        drawn
    }

    /// Re-render every layer, bottom to top.
    pub fn render_all(&mut self) -> usize {
        let names: Vec<String> = self
            .layers
            .layers_ordered()
            .map(|layer| layer.name().to_string())
            .collect();
        names.iter().map(|name| self.render_layer(name)).sum()
    }

    /// Topmost object drawn under a world point, searching layers from the top.
    pub fn object_at_point(&self, point: Point) -> Option<&RenderableObject> {
        if self.destroyed {
            return None;
        }
        let (_, owner) = self.layers.hit(point, HIT_TOLERANCE / self.zoom)?;
        self.objects.get(&owner)
    }

    /// Objects whose position lies inside `area`, edges included.
    pub fn objects_in_area(&self, area: Rect) -> Vec<&RenderableObject> {
        self.objects()
            .filter(|object| rect_contains_inclusive(area, object.position))
            .collect()
    }

    /// Destroy every layer surface and clear the registry. Later mutators are no-ops.
    pub fn destroy(&mut self) {
        self.layers.destroy();
        self.objects.clear();
        self.order.clear();
        self.placements.clear();
        self.destroyed = true;
    }

    fn insert(&mut self, object: RenderableObject, placement: Option<LayerId>) -> bool {
        let id = object.id.clone();
        if let Some(layer_id) = placement {
            self.layers.add_object_to_layer(
                &layer_id,
                LayerObject::new(id.clone(), Rect::from_origin_size(object.position, (0.0, 0.0)))
                    .at(object.position),
            );
            self.placements.insert(id.clone(), layer_id);
        }
        self.order.push(id.clone());
        self.objects.insert(id.clone(), object);
        self.render_object(&id);
        true
    }

    /// The layer an object lives in: its recorded placement while that layer
    /// exists, otherwise whatever layer currently carries its layer name.
    fn placed_in(&self, object: &RenderableObject) -> Option<LayerId> {
        self.placements
            .get(&object.id)
            .filter(|layer_id| self.layers.layer(layer_id).is_some())
            .cloned()
            .or_else(|| self.layer_id(&object.layer))
    }

    fn layer_id(&self, name: &str) -> Option<LayerId> {
        self.layers.layer_by_name(name).map(|layer| layer.id().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battlemap_core::layers::{LayerSpec, LayerUpdate};
    use battlemap_core::surface::Drawable;
    use kurbo::Size;
    use peniko::Color;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> RenderingService {
        RenderingService::new(LayerManager::new(Size::new(800.0, 600.0)))
    }

    fn token(id: &str, layer: &str, center: Point) -> RenderableObject {
        RenderableObject::new(id, "token", layer, center, move |_| {
            Some(Drawable::circle(center, 10.0, Color::from_rgba8(200, 30, 30, 255)))
        })
    }

    fn nodes_in(service: &RenderingService, layer: &str) -> usize {
        let id = service.layers().layer_by_name(layer).unwrap().id().clone();
        service.layers().surface(&id).unwrap().nodes().len()
    }

    #[test]
    fn test_add_draws_into_layer() {
        let mut service = service();
        assert!(service.add_object(token("a", "objects", Point::new(50.0, 50.0))));
        assert!(service.has_object("a"));
        assert_eq!(nodes_in(&service, "objects"), 1);
        assert_eq!(service.render_count(), 1);

        let layer = service.layers().layer_by_name("objects").unwrap();
        assert_eq!(layer.state.objects.len(), 1);
        let bounds = layer.state.bounds;
        for (got, want) in [(bounds.x0, 40.0), (bounds.y0, 40.0), (bounds.x1, 60.0), (bounds.y1, 60.0)] {
            assert!((got - want).abs() < 0.1, "{bounds:?}");
        }
    }

    #[test]
    fn test_missing_layer_is_a_noop() {
        let mut service = service();
        assert!(service.add_object(token("a", "nowhere", Point::ZERO)));
        assert!(!service.render_object("a"));
        assert_eq!(service.stats().nodes, 0);
        assert_eq!(service.render_layer("nowhere"), 0);
    }

    #[test]
    fn test_hidden_object_is_not_drawn() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::ZERO).hidden());
        assert_eq!(nodes_in(&service, "objects"), 0);
        assert_eq!(service.render_count(), 0);
    }

    #[test]
    fn test_update_redraws_from_scratch() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::new(50.0, 50.0)));
        assert!(service.update_object("a", RenderableUpdate::layer("ui")));
        assert_eq!(nodes_in(&service, "objects"), 0);
        assert_eq!(nodes_in(&service, "ui"), 1);
        assert_eq!(service.object("a").unwrap().layer, "ui");
        assert!(service.layers().layer_by_name("objects").unwrap().state.objects.is_empty());
        assert_eq!(service.render_count(), 2);

        assert!(!service.update_object("ghost", RenderableUpdate::visible(false)));
    }

    #[test]
    fn test_update_position_keeps_render() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::new(50.0, 50.0)));
        service.update_object("a", RenderableUpdate::position(Point::new(300.0, 300.0)));
        let object = service.object("a").unwrap();
        assert_eq!(object.position, Point::new(300.0, 300.0));
        assert_eq!(nodes_in(&service, "objects"), 1);
    }

    #[test]
    fn test_remove_erases_nodes() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::ZERO));
        service.add_object(token("b", "objects", Point::new(100.0, 0.0)));
        assert!(service.remove_object("a").is_some());
        assert!(service.remove_object("a").is_none());
        assert_eq!(nodes_in(&service, "objects"), 1);
        assert_eq!(service.len(), 1);
    }

    #[test]
    fn test_render_layer_reinvokes_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut service = service();
        for i in 0..3 {
            let counter = calls.clone();
            let center = Point::new(i as f64 * 30.0, 0.0);
            service.add_object(RenderableObject::new(format!("t{i}"), "token", "objects", center, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Drawable::circle(center, 5.0, Color::BLACK))
            }));
        }
        service.add_object(token("ui-1", "ui", Point::ZERO));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert_eq!(service.render_layer("objects"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(nodes_in(&service, "objects"), 3);
        assert_eq!(nodes_in(&service, "ui"), 1);

        let layer = service.layers().layer_by_name("objects").unwrap();
        assert_eq!(layer.state.render_count, 1);
        assert!(!layer.state.is_dirty);

        assert_eq!(service.render_all(), 4);
        assert_eq!(service.stats().nodes, 4);
    }

    #[test]
    fn test_render_context() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        let mut service = service();
        service.set_zoom(2.5);
        service.add_object(RenderableObject::new("a", "token", "ui", Point::ZERO, move |ctx| {
            *sink.lock().unwrap() = Some(ctx.clone());
            None
        }));
        let ctx = seen.lock().unwrap().clone().unwrap();
        assert_eq!(ctx.layer, "ui");
        assert_eq!(ctx.layer_z_index, 30);
        assert_eq!(ctx.zoom, 2.5);
        assert_eq!(nodes_in(&service, "ui"), 0);
    }

    #[test]
    fn test_object_at_point_prefers_top_layer() {
        let mut service = service();
        service.add_object(token("below", "objects", Point::new(100.0, 100.0)));
        service.add_object(token("above", "ui", Point::new(100.0, 100.0)));
        assert_eq!(service.object_at_point(Point::new(102.0, 100.0)).unwrap().id, "above");

        let ui = service.layers().layer_by_name("ui").unwrap().id().clone();
        service.layers_mut().update_layer(&ui, LayerUpdate::visible(false));
        assert_eq!(service.object_at_point(Point::new(102.0, 100.0)).unwrap().id, "below");
        assert!(service.object_at_point(Point::new(400.0, 400.0)).is_none());
    }

    #[test]
    fn test_object_at_point_skips_locked_layers() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::new(10.0, 10.0)));
        let objects = service.layers().layer_by_name("objects").unwrap().id().clone();
        service.layers_mut().set_layer_locked(&objects, true);
        assert!(service.object_at_point(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_objects_in_area_is_inclusive() {
        let mut service = service();
        service.add_object(token("edge", "objects", Point::new(100.0, 100.0)));
        service.add_object(token("inside", "objects", Point::new(50.0, 50.0)));
        service.add_object(token("outside", "ui", Point::new(101.0, 50.0)));
        let ids: Vec<_> = service
            .objects_in_area(Rect::new(0.0, 0.0, 100.0, 100.0))
            .into_iter()
            .map(|object| object.id.as_str())
            .collect();
        assert_eq!(ids, ["edge", "inside"]);
    }

    #[test]
    fn test_objects_in_layer() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::ZERO));
        service.add_object(token("b", "ui", Point::ZERO));
        service.add_object(token("c", "objects", Point::ZERO));
        let ids: Vec<_> = service
            .objects_in_layer("objects")
            .into_iter()
            .map(|object| object.id.as_str())
            .collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn test_custom_layer_from_spec() {
        let mut service = RenderingService::new(LayerManager::with_layers(
            Size::new(100.0, 100.0),
            vec![LayerSpec::new("fog", 0)],
        ));
        service.add_object(token("f", "fog", Point::ZERO));
        service.add_object(token("g", "objects", Point::ZERO));
        assert_eq!(nodes_in(&service, "fog"), 1);
        assert_eq!(service.stats().nodes, 1);
        assert_eq!(service.len(), 2);
    }

    #[test]
    fn test_renamed_layer_keeps_its_objects() {
        let mut service = service();
        service.add_object(token("below", "ui", Point::new(100.0, 100.0)));
        service.add_object(token("a", "objects", Point::new(100.0, 100.0)));
        let objects = service.layers().layer_by_name("objects").unwrap().id().clone();
        service.layers_mut().update_layer(
            &objects,
            LayerUpdate {
                name: Some("tokens".into()),
                ..LayerUpdate::default()
            },
        );
        let ui = service.layers().layer_by_name("ui").unwrap().id().clone();
        service.layers_mut().update_layer(&ui, LayerUpdate::z_index(5));

        assert!(service.update_object("a", RenderableUpdate::position(Point::new(120.0, 100.0))));
        assert_eq!(nodes_in(&service, "tokens"), 1);
        assert_eq!(service.objects_in_layer("tokens").len(), 1);
        assert_eq!(service.render_layer("tokens"), 1);

        assert!(service.remove_object("a").is_some());
        assert_eq!(nodes_in(&service, "tokens"), 0);
        assert!(service.layers().layer_by_name("tokens").unwrap().state.objects.is_empty());
        assert_eq!(service.object_at_point(Point::new(100.0, 100.0)).unwrap().id, "below");
    }

    #[test]
    fn test_destroy() {
        let mut service = service();
        service.add_object(token("a", "objects", Point::ZERO));
        service.destroy();
        assert!(service.is_destroyed());
        assert!(service.is_empty());
        assert!(service.layers().is_empty());
        assert!(!service.add_object(token("b", "objects", Point::ZERO)));
        assert!(!service.update_object("a", RenderableUpdate::visible(true)));
        assert_eq!(service.render_all(), 0);
    }
}
