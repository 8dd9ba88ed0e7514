//! Grid geometry for square and hex battle maps.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Default cell size in world units.
pub const DEFAULT_GRID_SIZE: f64 = 50.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Grid tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    /// Axis-aligned square cells.
    #[default]
    Square,
    /// Flat-top hexagons addressed by axial coordinates.
    Hex,
}

/// Subdivision of each square cell into a finer snapping step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubGrid {
    /// Number of steps per cell edge.
    pub divisions: u32,
}

/// Grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cell size in world units. For hex grids this is the hexagon radius.
    pub size: f64,
    /// Square or hex tiling.
    #[serde(rename = "type")]
    pub kind: GridKind,
    /// Whether `snap_to_grid` moves points at all.
    pub snap_enabled: bool,
    /// Whether grid lines are drawn.
    pub visible: bool,
    /// Optional finer subdivision for square grids.
    pub sub_grid: Option<SubGrid>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            kind: GridKind::Square,
            snap_enabled: true,
            visible: true,
            sub_grid: None,
        }
    }
}

impl GridConfig {
    /// Square grid with snapping enabled.
    pub fn square(size: f64) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Hex grid with snapping enabled.
    pub fn hex(size: f64) -> Self {
        Self {
            size,
            kind: GridKind::Hex,
            ..Self::default()
        }
    }

    /// Toggle snapping.
    pub fn with_snap(mut self, enabled: bool) -> Self {
        self.snap_enabled = enabled;
        self
    }

    /// Add a sub-grid.
    pub fn with_sub_grid(mut self, divisions: u32) -> Self {
        self.sub_grid = Some(SubGrid { divisions });
        self
    }

    /// Snapping step for square grids, taking the sub-grid into account.
    pub fn step(&self) -> f64 {
        match self.sub_grid {
            Some(SubGrid { divisions }) if divisions > 1 && self.kind == GridKind::Square => {
                self.size / divisions as f64
            }
            _ => self.size,
        }
    }

    /// Whether the geometry is usable (positive, finite size).
    pub fn is_valid(&self) -> bool {
        self.size.is_finite() && self.size > 0.0
    }
}

/// How points are attracted to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSnapConfig {
    /// Master switch.
    pub enabled: bool,
    /// Maximum snap distance in world units; `0` means unlimited.
    pub threshold: f64,
    /// Snap to line intersections (cell corners, hex centres).
    pub snap_to_intersections: bool,
    /// Snap to cell centres.
    pub snap_to_midpoints: bool,
    /// Snap onto the nearest grid line along one axis.
    pub snap_to_edges: bool,
}

impl Default for GridSnapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.0,
            snap_to_intersections: true,
            snap_to_midpoints: false,
            snap_to_edges: false,
        }
    }
}

/// Integer cell address.
///
/// Square grids use `(col, row)`; hex grids store axial `(q, r)` in the same fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCell {
    pub col: i64,
    pub row: i64,
}

impl GridCell {
    pub fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }
}

impl From<HexCoord> for GridCell {
    fn from(hex: HexCoord) -> Self {
        Self::new(hex.q, hex.r)
    }
}

impl From<GridCell> for HexCoord {
    fn from(cell: GridCell) -> Self {
        Self::new(cell.col, cell.row)
    }
}

/// Axial coordinate of a flat-top hexagon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HexCoord {
    pub q: i64,
    pub r: i64,
}

/// Axial offsets of the six neighbours, counter-clockwise from east.
const HEX_DIRECTIONS: [(i64, i64); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

impl HexCoord {
    pub fn new(q: i64, r: i64) -> Self {
        Self { q, r }
    }

    /// Third cube coordinate; `q + r + s == 0`.
    pub fn s(&self) -> i64 {
        -self.q - self.r
    }

    /// Round fractional axial coordinates to the nearest hexagon.
    ///
    /// Each cube coordinate is rounded on its own, then the one with the largest
    /// rounding error is recomputed from the other two. Ties prefer fixing `q`,
    /// then `r`, then `s`.
    pub fn round(q: f64, r: f64) -> Self {
        let s = -q - r;

        let mut rq = q.round();
        let mut rr = r.round();
        let rs = s.round();

        let q_diff = (rq - q).abs();
        let r_diff = (rr - r).abs();
        let s_diff = (rs - s).abs();

        if q_diff >= r_diff && q_diff >= s_diff {
            rq = -rr - rs;
        } else if r_diff >= s_diff {
            rr = -rq - rs;
        }

        Self::new(rq as i64, rr as i64)
    }

    /// Hexagon containing a pixel-space point.
    pub fn from_pixel(point: Point, size: f64) -> Self {
        let (q, r) = pixel_to_axial(point, size);
        Self::round(q, r)
    }

    /// Centre of this hexagon in pixel space.
    pub fn to_pixel(self, size: f64) -> Point {
        axial_to_pixel(self.q as f64, self.r as f64, size)
    }

    /// Number of steps between two hexagons.
    pub fn distance(self, other: HexCoord) -> i64 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.q + self.r - other.q - other.r).abs();
        dq.max(dr).max(ds)
    }

    /// The six adjacent hexagons.
    pub fn neighbors(self) -> [HexCoord; 6] {
        HEX_DIRECTIONS.map(|(dq, dr)| HexCoord::new(self.q + dq, self.r + dr))
    }
}

/// Fractional axial coordinates of a pixel-space point.
pub fn pixel_to_axial(point: Point, size: f64) -> (f64, f64) {
    let hex_width = size;
    let hex_height = size;
    let q = (2.0 / 3.0) * point.x / hex_width;
    let r = (-1.0 / 3.0 * point.x + SQRT_3 / 3.0 * point.y) / hex_height;
    (q, r)
}

/// Pixel-space point of fractional axial coordinates; exact inverse of [`pixel_to_axial`].
pub fn axial_to_pixel(q: f64, r: f64, size: f64) -> Point {
    let x = 1.5 * q * size;
    let y = SQRT_3 * (r + q / 2.0) * size;
    Point::new(x, y)
}

/// Horizontal distance between adjacent hex column centres.
pub fn hex_column_step(size: f64) -> f64 {
    1.5 * size
}

/// Vertical distance between adjacent hex row centres.
pub fn hex_row_step(size: f64) -> f64 {
    SQRT_3 * size
}
