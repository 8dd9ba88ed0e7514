//! Coordinate transforms between screen, stage and world space, plus grid math.
//!
//! Everything here is a pure function. The viewport manager feeds its live
//! [`ViewTransform`] into these helpers; grid renderers use the cell helpers to
//! find which lines are on screen.

use std::fmt;
use std::str::FromStr;

use crate::grid::{self, GridCell, GridConfig, GridKind, HexCoord};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// The coordinate spaces a point can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSpace {
    /// Raw pointer pixels.
    Screen,
    /// Pixels local to the drawing surface.
    Stage,
    /// Logical map units.
    World,
    /// Alias of `World` while layers are not nested.
    Local,
}

impl CoordinateSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            CoordinateSpace::Screen => "screen",
            CoordinateSpace::Stage => "stage",
            CoordinateSpace::World => "world",
            CoordinateSpace::Local => "local",
        }
    }
}

impl fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinateSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screen" => Ok(CoordinateSpace::Screen),
            "stage" => Ok(CoordinateSpace::Stage),
            "world" => Ok(CoordinateSpace::World),
            "local" => Ok(CoordinateSpace::Local),
            other => Err(format!("unknown coordinate space: {other}")),
        }
    }
}

/// Result of converting a point between two spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateConversion {
    pub source: Point,
    pub target: Point,
    pub source_space: CoordinateSpace,
    pub target_space: CoordinateSpace,
    /// False when no viewport was available; `target` then equals `source`.
    pub is_valid: bool,
}

impl CoordinateConversion {
    /// Conversion that could not be performed.
    pub fn invalid(point: Point, from: CoordinateSpace, to: CoordinateSpace) -> Self {
        Self {
            source: point,
            target: point,
            source_space: from,
            target_space: to,
            is_valid: false,
        }
    }
}

/// Pan/zoom/rotation of a viewport, as consumed by the pure transform helpers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Screen position of the world origin.
    pub position: Vec2,
    /// Uniform zoom factor.
    pub scale: f64,
    /// Rotation in degrees, clockwise on screen.
    pub rotation: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

impl ViewTransform {
    pub fn new(position: Vec2, scale: f64) -> Self {
        Self {
            position,
            scale,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Whether the transform can be inverted.
    pub fn is_invertible(&self) -> bool {
        self.scale.is_finite() && self.scale.abs() > f64::EPSILON
    }

    /// World → screen affine.
    pub fn to_affine(&self) -> Affine {
        Affine::translate(self.position)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.scale)
    }

    /// Screen → world affine; identity when the transform is singular.
    pub fn inverse_affine(&self) -> Affine {
        if !self.is_invertible() {
            return Affine::IDENTITY;
        }
        self.to_affine().inverse()
    }
}

/// Convert a screen point into canvas (world) space.
///
/// `(p - position) / scale`, un-rotated when the view is rotated. A singular
/// view leaves the point unchanged.
pub fn screen_to_canvas(point: Point, view: &ViewTransform) -> Point {
    if !view.is_invertible() {
        return point;
    }
    let mut local = point.to_vec2() - view.position;
    if view.rotation != 0.0 {
        local = rotate_vec(local, -view.rotation);
    }
    (local / view.scale).to_point()
}

/// Exact inverse of [`screen_to_canvas`].
pub fn canvas_to_screen(point: Point, view: &ViewTransform) -> Point {
    if !view.is_invertible() {
        return point;
    }
    let mut scaled = point.to_vec2() * view.scale;
    if view.rotation != 0.0 {
        scaled = rotate_vec(scaled, view.rotation);
    }
    (scaled + view.position).to_point()
}

/// World-space rectangle covered by a surface of the given pixel size.
pub fn visible_world_rect(view: &ViewTransform, surface: Size) -> Rect {
    view.inverse_affine()
        .transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, surface))
}

/// Cell containing a point.
///
/// Square grids floor each axis; hex grids round to the nearest axial cell.
pub fn grid_position(point: Point, grid: &GridConfig) -> GridCell {
    match grid.kind {
        GridKind::Square => GridCell::new(
            (point.x / grid.size).floor() as i64,
            (point.y / grid.size).floor() as i64,
        ),
        GridKind::Hex => HexCoord::from_pixel(point, grid.size).into(),
    }
}

/// Reference pixel of a cell: the cell centre. Inverse of [`grid_position`].
pub fn point_from_grid(cell: GridCell, grid: &GridConfig) -> Point {
    match grid.kind {
        GridKind::Square => Point::new(
            (cell.col as f64 + 0.5) * grid.size,
            (cell.row as f64 + 0.5) * grid.size,
        ),
        GridKind::Hex => HexCoord::from(cell).to_pixel(grid.size),
    }
}

/// Number of grid steps between two cells.
///
/// Manhattan distance on square grids, hex distance on hex grids.
pub fn grid_distance(a: GridCell, b: GridCell, grid: &GridConfig) -> i64 {
    match grid.kind {
        GridKind::Square => (a.col - b.col).abs() + (a.row - b.row).abs(),
        GridKind::Hex => HexCoord::from(a).distance(HexCoord::from(b)),
    }
}

/// Grid distance between the cells containing two points.
pub fn grid_distance_between(a: Point, b: Point, grid: &GridConfig) -> i64 {
    grid_distance(grid_position(a, grid), grid_position(b, grid), grid)
}

/// Inclusive range of cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_col: i64,
    pub max_col: i64,
    pub min_row: i64,
    pub max_row: i64,
}

impl GridBounds {
    pub fn contains(&self, cell: GridCell) -> bool {
        cell.col >= self.min_col
            && cell.col <= self.max_col
            && cell.row >= self.min_row
            && cell.row <= self.max_row
    }

    pub fn columns(&self) -> i64 {
        self.max_col - self.min_col + 1
    }

    pub fn rows(&self) -> i64 {
        self.max_row - self.min_row + 1
    }
}

/// Cells a renderer has to draw for a viewport, padded by one cell on every side.
pub fn visible_grid_bounds(view: &ViewTransform, surface: Size, grid: &GridConfig) -> GridBounds {
    let world = visible_world_rect(view, surface);
    if !grid.is_valid() {
        return GridBounds::default();
    }

    match grid.kind {
        GridKind::Square => GridBounds {
            min_col: (world.x0 / grid.size).floor() as i64 - 1,
            max_col: (world.x1 / grid.size).floor() as i64 + 1,
            min_row: (world.y0 / grid.size).floor() as i64 - 1,
            max_row: (world.y1 / grid.size).floor() as i64 + 1,
        },
        GridKind::Hex => {
            let col_step = grid::hex_column_step(grid.size);
            let row_step = grid::hex_row_step(grid.size);
            let min_q = (world.x0 / col_step).floor() as i64 - 1;
            let max_q = (world.x1 / col_step).ceil() as i64 + 1;
            // r = y / row_step - q / 2, so the extreme rows pair with the extreme columns.
            let min_r = (world.y0 / row_step - max_q as f64 / 2.0).floor() as i64 - 1;
            let max_r = (world.y1 / row_step - min_q as f64 / 2.0).ceil() as i64 + 1;
            GridBounds {
                min_col: min_q,
                max_col: max_q,
                min_row: min_r,
                max_row: max_r,
            }
        }
    }
}

/// Smallest axis-aligned rectangle containing every point; zero rect when empty.
pub fn bounds_of(points: &[Point]) -> Rect {
    let Some((first, rest)) = points.split_first() else {
        return Rect::ZERO;
    };
    rest.iter()
        .fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
}

/// Union of rectangles; zero rect when empty.
pub fn union_bounds<I: IntoIterator<Item = Rect>>(rects: I) -> Rect {
    rects
        .into_iter()
        .reduce(|acc, r| acc.union(r))
        .unwrap_or(Rect::ZERO)
}

/// Whether `point` lies inside `rect`, edges included.
pub fn rect_contains_inclusive(rect: Rect, point: Point) -> bool {
    let rect = rect.abs();
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

/// Euclidean distance.
pub fn distance(a: Point, b: Point) -> f64 {
    a.distance(b)
}

/// Angle of the vector `a → b` in degrees, normalized to `[0, 360)`.
pub fn angle_between(a: Point, b: Point) -> f64 {
    normalize_degrees((b.y - a.y).atan2(b.x - a.x).to_degrees())
}

/// Rotate `point` around `center` by `degrees`.
pub fn rotate_point(point: Point, center: Point, degrees: f64) -> Point {
    center + rotate_vec(point - center, degrees)
}

/// Linear interpolation between two points.
pub fn lerp_point(a: Point, b: Point, t: f64) -> Point {
    a.lerp(b, t)
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

fn rotate_vec(v: Vec2, degrees: f64) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
    }

    #[test]
    fn test_screen_to_canvas_formula() {
        let view = ViewTransform::new(Vec2::new(100.0, 50.0), 2.0);
        let world = screen_to_canvas(Point::new(300.0, 250.0), &view);
        assert!(approx(world, Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_roundtrip_many_views() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(123.4, -56.7),
            Point::new(-1e4, 3e3),
            Point::new(799.0, 599.0),
        ];
        let views = [
            ViewTransform::new(Vec2::new(30.0, -20.0), 1.5),
            ViewTransform::new(Vec2::new(-400.0, 250.0), 0.1),
            ViewTransform::new(Vec2::new(5.0, 5.0), 10.0),
            ViewTransform::new(Vec2::new(12.0, 34.0), 0.75).with_rotation(37.0),
        ];
        for view in &views {
            for &p in &points {
                let back = canvas_to_screen(screen_to_canvas(p, view), view);
                assert!(approx(back, p), "{p:?} -> {back:?} via {view:?}");
            }
        }
    }

    #[test]
    fn test_singular_view_is_identity() {
        let view = ViewTransform::new(Vec2::new(10.0, 10.0), 0.0);
        let p = Point::new(4.0, 2.0);
        assert_eq!(screen_to_canvas(p, &view), p);
        assert_eq!(view.inverse_affine(), Affine::IDENTITY);
    }

    #[test]
    fn test_affine_matches_pure_functions() {
        let view = ViewTransform::new(Vec2::new(-15.0, 40.0), 1.25).with_rotation(90.0);
        let p = Point::new(20.0, 30.0);
        assert!(approx(view.to_affine() * p, canvas_to_screen(p, &view)));
        assert!(approx(view.inverse_affine() * p, screen_to_canvas(p, &view)));
    }

    #[test]
    fn test_grid_position_roundtrip_square() {
        let grid = GridConfig::square(50.0);
        for &(col, row) in &[(0, 0), (3, -2), (-7, 11)] {
            let cell = GridCell::new(col, row);
            assert_eq!(grid_position(point_from_grid(cell, &grid), &grid), cell);
        }
        assert_eq!(grid_position(Point::new(49.9, 50.0), &grid), GridCell::new(0, 1));
        assert_eq!(grid_position(Point::new(-0.1, 0.0), &grid), GridCell::new(-1, 0));
    }

    #[test]
    fn test_grid_position_roundtrip_hex() {
        let grid = GridConfig::hex(30.0);
        let cell = GridCell::new(4, -3);
        assert_eq!(grid_position(point_from_grid(cell, &grid), &grid), cell);
    }

    #[test]
    fn test_grid_distance() {
        let square = GridConfig::square(50.0);
        assert_eq!(grid_distance(GridCell::new(0, 0), GridCell::new(3, -4), &square), 7);

        let hex = GridConfig::hex(50.0);
        assert_eq!(grid_distance(GridCell::new(0, 0), GridCell::new(3, -4), &hex), 4);
        assert_eq!(grid_distance(GridCell::new(1, 1), GridCell::new(1, 1), &hex), 0);
    }

    #[test]
    fn test_visible_grid_bounds_square() {
        let view = ViewTransform::default();
        let bounds = visible_grid_bounds(&view, Size::new(800.0, 600.0), &GridConfig::square(50.0));
        assert_eq!(bounds.min_col, -1);
        assert_eq!(bounds.max_col, 17);
        assert_eq!(bounds.min_row, -1);
        assert_eq!(bounds.max_row, 13);
    }

    #[test]
    fn test_visible_grid_bounds_follow_zoom() {
        let view = ViewTransform::new(Vec2::new(-100.0, -100.0), 2.0);
        let bounds = visible_grid_bounds(&view, Size::new(200.0, 200.0), &GridConfig::square(50.0));
        // World rect is (50,50)-(150,150).
        assert_eq!(bounds.min_col, 0);
        assert_eq!(bounds.max_col, 4);
        assert!(bounds.contains(GridCell::new(2, 2)));
        assert!(!bounds.contains(GridCell::new(5, 2)));
    }

    #[test]
    fn test_visible_grid_bounds_hex_cover_corners() {
        let grid = GridConfig::hex(20.0);
        let view = ViewTransform::default();
        let surface = Size::new(400.0, 300.0);
        let bounds = visible_grid_bounds(&view, surface, &grid);
        for corner in [
            Point::new(0.0, 0.0),
            Point::new(400.0, 0.0),
            Point::new(0.0, 300.0),
            Point::new(400.0, 300.0),
        ] {
            assert!(bounds.contains(grid_position(corner, &grid)), "{corner:?}");
        }
    }

    #[test]
    fn test_bounds_of() {
        assert_eq!(bounds_of(&[]), Rect::ZERO);
        let rect = bounds_of(&[Point::new(3.0, 4.0), Point::new(-1.0, 10.0), Point::new(5.0, 0.0)]);
        assert_eq!(rect, Rect::new(-1.0, 0.0, 5.0, 10.0));
        let single = bounds_of(&[Point::new(2.0, 2.0)]);
        assert!(single.is_zero_area());
    }

    #[test]
    fn test_rect_contains_inclusive_edges() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect_contains_inclusive(rect, Point::new(10.0, 10.0)));
        assert!(rect_contains_inclusive(rect, Point::new(0.0, 5.0)));
        assert!(!rect_contains_inclusive(rect, Point::new(10.1, 5.0)));
    }

    #[test]
    fn test_angles() {
        assert!((angle_between(Point::ZERO, Point::new(0.0, -1.0)) - 270.0).abs() < EPSILON);
        assert!((normalize_degrees(-90.0) - 270.0).abs() < EPSILON);
        assert!((normalize_degrees(720.0)).abs() < EPSILON);
        let rotated = rotate_point(Point::new(2.0, 1.0), Point::new(1.0, 1.0), 90.0);
        assert!(approx(rotated, Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_space_names() {
        assert_eq!("stage".parse::<CoordinateSpace>(), Ok(CoordinateSpace::Stage));
        assert_eq!(CoordinateSpace::Local.to_string(), "local");
        assert!("galaxy".parse::<CoordinateSpace>().is_err());
    }
}
