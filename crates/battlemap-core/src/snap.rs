//! Snap functionality for aligning points to the map grid.

use crate::grid::{GridConfig, GridKind, GridSnapConfig, HexCoord};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// What a point was snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapKind {
    /// Not snapped.
    #[default]
    None,
    /// Grid line intersection (hex centre on hex grids).
    Intersection,
    /// Cell centre.
    Midpoint,
    /// Nearest grid line along one axis.
    Edge,
}

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
    /// Which target won.
    pub kind: SnapKind,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
            kind: SnapKind::None,
        }
    }

    fn both(point: Point, kind: SnapKind) -> Self {
        Self {
            point,
            snapped_x: true,
            snapped_y: true,
            kind,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Snap a point to the nearest grid reference position.
///
/// Square grids round each axis to the nearest multiple of the step; hex grids
/// move to the centre of the containing hexagon. A no-op when snapping is off.
/// Snapping an already snapped point returns it unchanged.
pub fn snap_to_grid(point: Point, grid: &GridConfig) -> Point {
    if !grid.snap_enabled || !grid.is_valid() {
        return point;
    }

    match grid.kind {
        GridKind::Square => {
            let step = grid.step();
            Point::new(
                (point.x / step).round() * step,
                (point.y / step).round() * step,
            )
        }
        GridKind::Hex => HexCoord::from_pixel(point, grid.size).to_pixel(grid.size),
    }
}

/// Snap a point using the full snapping configuration.
///
/// Collects every enabled target, keeps the nearest one, and applies it only if
/// it lies within `config.threshold` (a threshold of zero never rejects).
pub fn snap_point(point: Point, grid: &GridConfig, config: &GridSnapConfig) -> SnapResult {
    if !config.enabled || !grid.snap_enabled || !grid.is_valid() {
        return SnapResult::none(point);
    }

    let candidates = match grid.kind {
        GridKind::Square => square_candidates(point, grid.step(), config),
        GridKind::Hex => hex_candidates(point, grid.size, config),
    };

    let best = candidates.into_iter().fold(None::<(f64, SnapResult)>, |best, candidate| {
        let dist = point.distance(candidate.point);
        match best {
            Some((best_dist, _)) if best_dist <= dist => best,
            _ => Some((dist, candidate)),
        }
    });

    match best {
        Some((dist, result)) if config.threshold <= 0.0 || dist <= config.threshold => result,
        _ => SnapResult::none(point),
    }
}

fn square_candidates(point: Point, step: f64, config: &GridSnapConfig) -> Vec<SnapResult> {
    let mut candidates = Vec::with_capacity(3);
    let round_x = (point.x / step).round() * step;
    let round_y = (point.y / step).round() * step;

    if config.snap_to_intersections {
        candidates.push(SnapResult::both(Point::new(round_x, round_y), SnapKind::Intersection));
    }

    if config.snap_to_midpoints {
        let mid = Point::new(
            ((point.x / step).floor() + 0.5) * step,
            ((point.y / step).floor() + 0.5) * step,
        );
        candidates.push(SnapResult::both(mid, SnapKind::Midpoint));
    }

    if config.snap_to_edges {
        // Nearest vertical or horizontal line, leaving the other axis free.
        let dx = (point.x - round_x).abs();
        let dy = (point.y - round_y).abs();
        let edge = if dx <= dy {
            SnapResult {
                point: Point::new(round_x, point.y),
                snapped_x: true,
                snapped_y: false,
                kind: SnapKind::Edge,
            }
        } else {
            SnapResult {
                point: Point::new(point.x, round_y),
                snapped_x: false,
                snapped_y: true,
                kind: SnapKind::Edge,
            }
        };
        candidates.push(edge);
    }

    candidates
}

fn hex_candidates(point: Point, size: f64, config: &GridSnapConfig) -> Vec<SnapResult> {
    if !(config.snap_to_intersections || config.snap_to_midpoints || config.snap_to_edges) {
        return Vec::new();
    }
    let kind = if config.snap_to_intersections {
        SnapKind::Intersection
    } else {
        SnapKind::Midpoint
    };
    let center = HexCoord::from_pixel(point, size).to_pixel(size);
    vec![SnapResult::both(center, kind)]
}
