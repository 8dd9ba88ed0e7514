//! Drawing surfaces owned by the viewport and layer managers.
//!
//! Surfaces live in a [`SurfaceArena`] and are addressed through opaque
//! [`SurfaceId`] handles. Only the manager that owns an arena dereferences its
//! handles. A surface carries its own placement (size, position, scale,
//! rotation), its child surfaces in back-to-front order, and the drawn nodes.

use std::collections::HashMap;

use kurbo::{Affine, BezPath, Circle, ParamCurveNearest, Point, Rect, Shape as KurboShape, Size, Vec2};
use peniko::{Color, Mix};
use serde::{Deserialize, Serialize};

use crate::coords::rect_contains_inclusive;

/// Tolerance used when flattening curves for hit testing.
const PATH_ACCURACY: f64 = 0.1;

/// Opaque handle to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(u64);

/// Opaque handle to a drawn node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

/// Stroke of a drawable outline.
#[derive(Debug, Clone, Copy)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
}

/// Geometry produced by a render callback, in world coordinates.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub path: BezPath,
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
    pub opacity: f64,
}

impl Drawable {
    /// Filled path.
    pub fn filled(path: BezPath, color: Color) -> Self {
        Self {
            path,
            fill: Some(color),
            stroke: None,
            opacity: 1.0,
        }
    }

    /// Outline-only path.
    pub fn stroked(path: BezPath, color: Color, width: f64) -> Self {
        Self {
            path,
            fill: None,
            stroke: Some(Stroke { color, width }),
            opacity: 1.0,
        }
    }

    /// Filled rectangle.
    pub fn rect(rect: Rect, color: Color) -> Self {
        Self::filled(rect.to_path(PATH_ACCURACY), color)
    }

    /// Filled circle, the usual token footprint.
    pub fn circle(center: Point, radius: f64, color: Color) -> Self {
        Self::filled(Circle::new(center, radius).to_path(PATH_ACCURACY), color)
    }

    pub fn with_stroke(mut self, color: Color, width: f64) -> Self {
        self.stroke = Some(Stroke { color, width });
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Bounding box including half the stroke width.
    pub fn bounds(&self) -> Rect {
        let bbox = self.path.bounding_box();
        match self.stroke {
            Some(stroke) => bbox.inflate(stroke.width / 2.0, stroke.width / 2.0),
            None => bbox,
        }
    }

    /// Whether a world point touches this drawable.
    ///
    /// Filled paths hit on their interior; stroked paths hit within half the
    /// stroke width plus `tolerance` of any segment.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        if !self.bounds().inflate(tolerance, tolerance).contains(point) {
            return false;
        }
        if self.fill.is_some() && self.path.contains(point) {
            return true;
        }
        let reach = self.stroke.map_or(0.0, |s| s.width / 2.0) + tolerance;
        if self.fill.is_none() && self.stroke.is_none() {
            // Invisible geometry still hits on its bounds.
            return true;
        }
        self.path
            .segments()
            .any(|seg| seg.nearest(point, PATH_ACCURACY).distance_sq <= reach * reach)
    }
}

/// A drawn node, owned by the surface it was drawn into.
#[derive(Debug, Clone)]
pub struct DrawNode {
    pub id: NodeId,
    /// Identifier of the object that produced the node.
    pub owner: String,
    pub drawable: Drawable,
}

/// A drawing surface.
#[derive(Debug, Clone)]
pub struct Surface {
    id: SurfaceId,
    /// Pixel size.
    pub size: Size,
    /// Uniform scale applied to content.
    pub scale: f64,
    /// Offset of the content origin.
    pub position: Vec2,
    /// Rotation in degrees.
    pub rotation: f64,
    pub opacity: f64,
    pub visible: bool,
    /// Whether the surface takes part in hit testing.
    pub listening: bool,
    /// Content outside this rectangle is neither drawn nor hit.
    pub clip: Option<Rect>,
    pub blend: Mix,
    parent: Option<SurfaceId>,
    children: Vec<SurfaceId>,
    nodes: Vec<DrawNode>,
}

impl Surface {
    fn new(id: SurfaceId, size: Size) -> Self {
        Self {
            id,
            size,
            scale: 1.0,
            position: Vec2::ZERO,
            rotation: 0.0,
            opacity: 1.0,
            visible: true,
            listening: true,
            clip: None,
            blend: Mix::Normal,
            parent: None,
            children: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn parent(&self) -> Option<SurfaceId> {
        self.parent
    }

    /// Child surfaces, back to front.
    pub fn children(&self) -> &[SurfaceId] {
        &self.children
    }

    /// Drawn nodes, back to front.
    pub fn nodes(&self) -> &[DrawNode] {
        &self.nodes
    }

    /// Content → surface pixel transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.position)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.scale)
    }

    /// Surface pixel → content transform; identity when singular.
    pub fn inverse_transform(&self) -> Affine {
        let forward = self.transform();
        if forward.determinant().abs() < f64::EPSILON || !forward.is_finite() {
            return Affine::IDENTITY;
        }
        forward.inverse()
    }

    /// Pointer position in surface-local content coordinates.
    pub fn to_local(&self, pointer: Point) -> Point {
        self.inverse_transform() * pointer
    }

    /// Pixel rectangle of the surface.
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.size)
    }

    /// Remove every node drawn by `owner`; returns how many were removed.
    pub fn remove_nodes_of(&mut self, owner: &str) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.owner != owner);
        before - self.nodes.len()
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<DrawNode> {
        let index = self.nodes.iter().position(|node| node.id == id)?;
        Some(self.nodes.remove(index))
    }

    pub fn clear_nodes(&mut self) {
        self.nodes.clear();
    }

    /// Topmost node under a content-space point, honouring the clip rectangle.
    pub fn hit(&self, point: Point, tolerance: f64) -> Option<&DrawNode> {
        if let Some(clip) = self.clip {
            if !rect_contains_inclusive(clip, point) {
                return None;
            }
        }
        self.nodes
            .iter()
            .rev()
            .find(|node| node.drawable.hit_test(point, tolerance))
    }
}

/// Owner of a set of surfaces.
#[derive(Debug, Clone, Default)]
pub struct SurfaceArena {
    surfaces: HashMap<SurfaceId, Surface>,
    next_surface: u64,
    next_node: u64,
}

impl SurfaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached surface.
    pub fn create(&mut self, size: Size) -> SurfaceId {
        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.surfaces.insert(id, Surface::new(id, size));
        id
    }

    /// Destroy a surface, its children, and its nodes. Detaches it from its parent.
    pub fn destroy(&mut self, id: SurfaceId) -> bool {
        let Some(surface) = self.surfaces.remove(&id) else {
            return false;
        };
        if let Some(parent) = surface.parent.and_then(|p| self.surfaces.get_mut(&p)) {
            parent.children.retain(|&child| child != id);
        }
        for child in surface.children {
            if let Some(child_surface) = self.surfaces.get_mut(&child) {
                child_surface.parent = None;
            }
            self.destroy(child);
        }
        true
    }

    /// Destroy every surface.
    pub fn clear(&mut self) {
        self.surfaces.clear();
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Append `child` on top of `parent`'s children, moving it from any previous parent.
    pub fn add_child(&mut self, parent: SurfaceId, child: SurfaceId) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        self.detach(child);
        if let Some(p) = self.surfaces.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.surfaces.get_mut(&child) {
            c.parent = Some(parent);
        }
        true
    }

    /// Detach `child` from `parent` without destroying it.
    pub fn remove_child(&mut self, parent: SurfaceId, child: SurfaceId) -> bool {
        let Some(p) = self.surfaces.get_mut(&parent) else {
            return false;
        };
        let before = p.children.len();
        p.children.retain(|&c| c != child);
        let removed = p.children.len() != before;
        if removed {
            if let Some(c) = self.surfaces.get_mut(&child) {
                c.parent = None;
            }
        }
        removed
    }

    /// Move `child` to `index` among its siblings (clamped to the last slot).
    pub fn set_child_index(&mut self, parent: SurfaceId, child: SurfaceId, index: usize) -> bool {
        let Some(p) = self.surfaces.get_mut(&parent) else {
            return false;
        };
        let Some(current) = p.children.iter().position(|&c| c == child) else {
            return false;
        };
        let id = p.children.remove(current);
        let index = index.min(p.children.len());
        p.children.insert(index, id);
        true
    }

    /// Position of `child` among `parent`'s children.
    pub fn child_index(&self, parent: SurfaceId, child: SurfaceId) -> Option<usize> {
        self.surfaces
            .get(&parent)?
            .children
            .iter()
            .position(|&c| c == child)
    }

    /// Draw a node on top of a surface.
    pub fn add_node(&mut self, surface: SurfaceId, owner: &str, drawable: Drawable) -> Option<NodeId> {
        let target = self.surfaces.get_mut(&surface)?;
        self.next_node += 1;
        let id = NodeId(self.next_node);
        target.nodes.push(DrawNode {
            id,
            owner: owner.to_string(),
            drawable,
        });
        Some(id)
    }

    fn detach(&mut self, child: SurfaceId) {
        let parent = self.surfaces.get(&child).and_then(|c| c.parent);
        if let Some(parent) = parent {
            self.remove_child(parent, child);
        }
    }
}
