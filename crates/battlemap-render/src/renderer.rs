//! Renderable objects and the context handed to their render callbacks.

use std::fmt;
use std::sync::Arc;

use battlemap_core::grid::{GridConfig, GridKind, HexCoord};
use battlemap_core::surface::Drawable;
use kurbo::{BezPath, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Context for a single render callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    /// Name of the layer being drawn into.
    pub layer: String,
    pub layer_z_index: i32,
    /// Current viewport zoom, for zoom-dependent detail.
    pub zoom: f64,
}

/// Render callback: world-space geometry, or `None` to draw nothing.
pub type RenderFn = Arc<dyn Fn(&RenderContext) -> Option<Drawable> + Send + Sync>;

/// An object registered with the rendering service.
///
/// The domain object lives elsewhere; this is its id, its placement and the
/// callback that turns it into geometry.
#[derive(Clone)]
pub struct RenderableObject {
    pub id: String,
    /// Domain kind, e.g. `token` or `wall`.
    pub kind: String,
    /// Name of the layer the object draws into.
    pub layer: String,
    pub position: Point,
    pub visible: bool,
    pub render: RenderFn,
}

impl RenderableObject {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        layer: impl Into<String>,
        position: Point,
        render: impl Fn(&RenderContext) -> Option<Drawable> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            layer: layer.into(),
            position,
            visible: true,
            render: Arc::new(render),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Fields of `self` overridden by `update`.
    pub fn merged(&self, update: RenderableUpdate) -> Self {
        Self {
            id: self.id.clone(),
            kind: update.kind.unwrap_or_else(|| self.kind.clone()),
            layer: update.layer.unwrap_or_else(|| self.layer.clone()),
            position: update.position.unwrap_or(self.position),
            visible: update.visible.unwrap_or(self.visible),
            render: update.render.unwrap_or_else(|| self.render.clone()),
        }
    }
}

impl fmt::Debug for RenderableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderableObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("layer", &self.layer)
            .field("position", &self.position)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

/// Partial update of a renderable; `None` fields keep their value.
#[derive(Clone, Default)]
pub struct RenderableUpdate {
    pub kind: Option<String>,
    pub layer: Option<String>,
    pub position: Option<Point>,
    pub visible: Option<bool>,
    pub render: Option<RenderFn>,
}

impl RenderableUpdate {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn layer(layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
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

impl fmt::Debug for RenderableUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderableUpdate")
            .field("kind", &self.kind)
            .field("layer", &self.layer)
            .field("position", &self.position)
            .field("visible", &self.visible)
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Counters reported by the rendering service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderStats {
    /// Registered objects.
    pub objects: usize,
    /// Drawn nodes across all layers.
    pub nodes: usize,
    /// Render callbacks invoked so far.
    pub renders: u64,
}

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStyle {
    /// Full grid lines.
    #[default]
    Lines,
    /// Only corner crosses (+).
    Crosses,
}

impl GridStyle {
    /// Cycle to the next grid style.
    pub fn next(self) -> Self {
        match self {
            GridStyle::Lines => GridStyle::Crosses,
            GridStyle::Crosses => GridStyle::Lines,
        }
    }
}

const GRID_STROKE_WIDTH: f64 = 0.5;
const CROSS_HALF_SIZE: f64 = 3.0;
/// Upper bound on cells per axis; beyond it the grid is too dense to draw.
const MAX_GRID_LINES: f64 = 2000.0;
/// Upper bound on cells drawn one by one (crosses, hexes).
const MAX_GRID_CELLS: f64 = 250_000.0;

/// Geometry of the grid covering `area` (world units), batched into one path.
///
/// Returns `None` for an invalid grid or when the area holds too many cells.
pub fn grid_drawable(area: Rect, grid: &GridConfig, style: GridStyle) -> Option<Drawable> {
    if !grid.is_valid() || !grid.visible {
        return None;
    }
    let color = Color::from_rgba8(200, 200, 200, 100);
    let path = match grid.kind {
        GridKind::Square => square_grid_path(area.abs(), grid.size, style)?,
        GridKind::Hex => hex_grid_path(area.abs(), grid.size)?,
    };
    Some(Drawable::stroked(path, color, GRID_STROKE_WIDTH))
}

fn square_grid_path(area: Rect, size: f64, style: GridStyle) -> Option<BezPath> {
    let start_x = (area.x0 / size).floor() * size;
    let start_y = (area.y0 / size).floor() * size;
    let end_x = (area.x1 / size).ceil() * size;
    let end_y = (area.y1 / size).ceil() * size;
    let (columns, rows) = ((end_x - start_x) / size, (end_y - start_y) / size);
    if columns > MAX_GRID_LINES || rows > MAX_GRID_LINES {
        return None;
    }
    if style == GridStyle::Crosses && (columns + 1.0) * (rows + 1.0) > MAX_GRID_CELLS {
        return None;
    }

    let mut path = BezPath::new();
    match style {
        GridStyle::Lines => {
            let mut x = start_x;
            while x <= end_x {
                path.move_to(Point::new(x, start_y));
                path.line_to(Point::new(x, end_y));
                x += size;
            }
            let mut y = start_y;
            while y <= end_y {
                path.move_to(Point::new(start_x, y));
                path.line_to(Point::new(end_x, y));
                y += size;
            }
        }
        GridStyle::Crosses => {
            let mut x = start_x;
            while x <= end_x {
                let mut y = start_y;
                while y <= end_y {
                    path.move_to(Point::new(x - CROSS_HALF_SIZE, y));
                    path.line_to(Point::new(x + CROSS_HALF_SIZE, y));
                    path.move_to(Point::new(x, y - CROSS_HALF_SIZE));
                    path.line_to(Point::new(x, y + CROSS_HALF_SIZE));
                    y += size;
                }
                x += size;
            }
        }
    }
    Some(path)
}

fn hex_grid_path(area: Rect, size: f64) -> Option<BezPath> {
    let corners = [
        HexCoord::from_pixel(Point::new(area.x0, area.y0), size),
        HexCoord::from_pixel(Point::new(area.x1, area.y0), size),
        HexCoord::from_pixel(Point::new(area.x0, area.y1), size),
        HexCoord::from_pixel(Point::new(area.x1, area.y1), size),
    ];
    let q_min = corners.iter().map(|c| c.q).min()?.saturating_sub(1);
    let q_max = corners.iter().map(|c| c.q).max()?.saturating_add(1);
    let r_min = corners.iter().map(|c| c.r).min()?.saturating_sub(1);
    let r_max = corners.iter().map(|c| c.r).max()?.saturating_add(1);
    let span_q = (i64::from(q_max) - i64::from(q_min) + 1) as f64;
    let span_r = (i64::from(r_max) - i64::from(r_min) + 1) as f64;
    if span_q > MAX_GRID_LINES || span_r > MAX_GRID_LINES || span_q * span_r > MAX_GRID_CELLS {
        return None;
    }

    let mut path = BezPath::new();
    for q in q_min..=q_max {
        for r in r_min..=r_max {
            let center = HexCoord::new(q, r).to_pixel(size);
            let cell = Rect::from_center_size(center, (size * 2.0, size * 2.0));
            if cell.intersect(area).area() <= 0.0 {
                continue;
            }
            for corner in 0..6 {
                let angle = (60.0 * corner as f64).to_radians();
                let vertex = Point::new(center.x + size * angle.cos(), center.y + size * angle.sin());
                if corner == 0 {
                    path.move_to(vertex);
                } else {
                    path.line_to(vertex);
                }
            }
            path.close_path();
        }
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    fn dot(_: &RenderContext) -> Option<Drawable> {
        Some(Drawable::circle(Point::ZERO, 1.0, Color::BLACK))
    }

    #[test]
    fn test_merged_keeps_unset_fields() {
        let object = RenderableObject::new("t1", "token", "objects", Point::new(1.0, 2.0), dot);
        let merged = object.merged(RenderableUpdate::position(Point::new(5.0, 5.0)));
        assert_eq!(merged.id, "t1");
        assert_eq!(merged.kind, "token");
        assert_eq!(merged.layer, "objects");
        assert_eq!(merged.position, Point::new(5.0, 5.0));
        assert!(merged.visible);
        assert!(Arc::ptr_eq(&merged.render, &object.render));
    }

    #[test]
    fn test_merged_replaces_render() {
        let object = RenderableObject::new("t1", "token", "objects", Point::ZERO, dot);
        let merged = object.merged(RenderableUpdate {
            render: Some(Arc::new(|_: &RenderContext| None)),
            visible: Some(false),
            ..RenderableUpdate::default()
        });
        let ctx = RenderContext {
            layer: "objects".into(),
            layer_z_index: 20,
            zoom: 1.0,
        };
        assert!((merged.render)(&ctx).is_none());
        assert!(!merged.visible);
    }

    #[test]
    fn test_square_grid_covers_area() {
        let grid = GridConfig::square(50.0);
        let drawable = grid_drawable(Rect::new(10.0, 10.0, 190.0, 90.0), &grid, GridStyle::Lines).unwrap();
        assert_eq!(drawable.path.bounding_box(), Rect::new(0.0, 0.0, 200.0, 100.0));
        assert!(drawable.fill.is_none());
    }

    #[test]
    fn test_crosses_style() {
        let grid = GridConfig::square(50.0);
        let drawable = grid_drawable(Rect::new(0.0, 0.0, 50.0, 50.0), &grid, GridStyle::Crosses).unwrap();
        // Four intersections, two strokes each.
        let moves = drawable
            .path
            .elements()
            .iter()
            .filter(|el| matches!(el, kurbo::PathEl::MoveTo(_)))
            .count();
        assert_eq!(moves, 8);
    }

    #[test]
    fn test_hex_grid_draws_cells() {
        let grid = GridConfig::hex(30.0);
        let drawable = grid_drawable(Rect::new(0.0, 0.0, 200.0, 200.0), &grid, GridStyle::Lines).unwrap();
        assert!(drawable.bounds().contains(Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_hidden_or_dense_grid_is_skipped() {
        let hidden = GridConfig {
            visible: false,
            ..GridConfig::default()
        };
        assert!(grid_drawable(Rect::new(0.0, 0.0, 10.0, 10.0), &hidden, GridStyle::Lines).is_none());
        let dense = GridConfig::square(0.01);
        assert!(grid_drawable(Rect::new(0.0, 0.0, 1000.0, 1000.0), &dense, GridStyle::Lines).is_none());
    }

    #[test]
    fn test_dense_cell_grids_are_capped_by_cell_count() {
        // 1000 cells per axis is fine for lines, too many for per-cell geometry.
        let area = Rect::new(0.0, 0.0, 10_000.0, 10_000.0);
        let square = GridConfig::square(10.0);
        assert!(grid_drawable(area, &square, GridStyle::Lines).is_some());
        assert!(grid_drawable(area, &square, GridStyle::Crosses).is_none());
        assert!(grid_drawable(area, &GridConfig::hex(10.0), GridStyle::Lines).is_none());
        assert!(grid_drawable(Rect::new(0.0, 0.0, 1000.0, 1000.0), &GridConfig::hex(10.0), GridStyle::Lines).is_some());
    }

    #[test]
    fn test_grid_style_cycles() {
        assert_eq!(GridStyle::Lines.next().next(), GridStyle::Lines);
    }
}
