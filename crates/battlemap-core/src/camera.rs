//! Camera module for pan/zoom/rotation transforms and animation records.

use std::fmt;

use crate::coords::{self, ViewTransform};
use crate::easing::Easing;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Default zoom limits.
pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
pub const DEFAULT_MAX_ZOOM: f64 = 10.0;

/// Camera manages the view transform for a viewport.
///
/// It handles panning (translation), zooming (scaling) and rotation,
/// converting between screen coordinates and world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Screen position of the world origin (pan).
    pub position: Vec2,
    /// Current zoom level (1.0 = 100%).
    pub zoom: f64,
    /// Rotation in degrees, `[0, 360)`.
    pub rotation: f64,
    /// Minimum allowed zoom level.
    pub min_zoom: f64,
    /// Maximum allowed zoom level.
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera with custom zoom limits.
    pub fn with_limits(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            min_zoom,
            max_zoom,
            ..Self::default()
        }
    }

    /// Effective `(min, max)` zoom limits.
    ///
    /// Non-finite or non-positive limits fall back to the defaults and an
    /// inverted pair is swapped, so the result is always an ordered range.
    pub fn zoom_limits(&self) -> (f64, f64) {
        let sane = |limit: f64, fallback: f64| if limit.is_finite() && limit > 0.0 { limit } else { fallback };
        let min = sane(self.min_zoom, DEFAULT_MIN_ZOOM);
        let max = sane(self.max_zoom, DEFAULT_MAX_ZOOM);
        (min.min(max), max.max(min))
    }

    /// Clamp a requested zoom into the allowed range. Non-finite requests keep the current zoom.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        let (min, max) = self.zoom_limits();
        let zoom = if zoom.is_finite() {
            zoom
        } else if self.zoom.is_finite() {
            self.zoom
        } else {
            1.0
        };
        zoom.clamp(min, max)
    }

    /// The pure view parameters.
    pub fn view(&self) -> ViewTransform {
        ViewTransform::new(self.position, self.zoom).with_rotation(self.rotation)
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts world coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        self.view().to_affine()
    }

    /// Get the inverse transform for input handling.
    ///
    /// This transform converts screen coordinates to world coordinates.
    pub fn inverse_transform(&self) -> Affine {
        self.view().inverse_affine()
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        coords::screen_to_canvas(screen_point, &self.view())
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        coords::canvas_to_screen(world_point, &self.view())
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.position += delta;
    }

    /// Where the camera would sit after zooming to `zoom` around a fixed screen point.
    pub fn zoomed_about(&self, screen_point: Point, zoom: f64) -> Camera {
        let mut next = *self;
        let new_zoom = self.clamp_zoom(zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            next.zoom = new_zoom;
            return next;
        }

        // Convert screen point to world before zoom
        let world_point = self.screen_to_world(screen_point);

        // Apply new zoom
        next.zoom = new_zoom;

        // Adjust position so world_point stays at screen_point
        let new_screen = next.world_to_screen(world_point);
        next.position += screen_point - new_screen;
        next
    }

    /// Zoom the camera, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, zoom: f64) {
        *self = self.zoomed_about(screen_point, zoom);
    }

    /// Reset camera to the origin at 100% without rotation.
    pub fn reset(&mut self) {
        self.position = Vec2::ZERO;
        self.zoom = 1.0;
        self.rotation = 0.0;
    }

    /// Camera placement that fits `bounds` inside a viewport of `viewport` pixels.
    ///
    /// The scale never exceeds 100% and never drops below `min_zoom`. The bounds
    /// centre lands on the viewport centre, keeping the current rotation. A
    /// zero-size axis is ignored; fully degenerate bounds keep the current zoom.
    pub fn fitted(&self, bounds: Rect, viewport: Size, padding: f64) -> Camera {
        let bounds = bounds.abs();
        let available = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );

        let scale_x = (bounds.width() > 0.0).then(|| available.width / bounds.width());
        let scale_y = (bounds.height() > 0.0).then(|| available.height / bounds.height());
        let scale = match (scale_x, scale_y) {
            (Some(x), Some(y)) => x.min(y),
            (Some(s), None) | (None, Some(s)) => s,
            (None, None) => self.zoom,
        };
        let zoom = self.clamp_zoom(scale.min(1.0));

        let mut next = *self;
        next.zoom = zoom;
        next.position = Vec2::ZERO;
        let viewport_center = Point::new(viewport.width / 2.0, viewport.height / 2.0);
        let projected = next.world_to_screen(bounds.center());
        next.position = viewport_center - projected;
        next
    }

    /// Fit the camera to show the given bounding box.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        *self = self.fitted(bounds, viewport, padding);
    }

    /// Capture the current placement as an animation endpoint.
    pub fn keyframe(&self, timestamp: f64) -> CameraKeyframe {
        CameraKeyframe {
            position: self.position,
            zoom: self.zoom,
            rotation: self.rotation,
            timestamp,
        }
    }

    /// Move the camera onto a keyframe.
    pub fn apply_keyframe(&mut self, keyframe: &CameraKeyframe) {
        self.position = keyframe.position;
        self.zoom = keyframe.zoom;
        self.rotation = coords::normalize_degrees(keyframe.rotation);
    }
}

/// An immutable camera placement captured at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraKeyframe {
    pub position: Vec2,
    pub zoom: f64,
    pub rotation: f64,
    /// Milliseconds on the frame clock.
    pub timestamp: f64,
}

impl CameraKeyframe {
    /// Interpolate towards `to` by eased progress `t`.
    ///
    /// Rotation takes the shorter way around the circle.
    pub fn lerp(&self, to: &CameraKeyframe, t: f64) -> CameraKeyframe {
        let delta = (to.rotation - self.rotation + 540.0).rem_euclid(360.0) - 180.0;
        CameraKeyframe {
            position: self.position.lerp(to.position, t),
            zoom: self.zoom + (to.zoom - self.zoom) * t,
            rotation: coords::normalize_degrees(self.rotation + delta * t),
            timestamp: self.timestamp + (to.timestamp - self.timestamp) * t,
        }
    }
}

/// Target-facing camera snapshot for UI display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec2,
    pub zoom: f64,
    pub rotation: f64,
    pub timestamp: f64,
    pub is_animating: bool,
    pub animation_id: Option<String>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            timestamp: 0.0,
            is_animating: false,
            animation_id: None,
        }
    }
}

/// Callback fired once when an animation reaches its target.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// An in-flight camera transition.
pub struct CameraAnimation {
    pub id: String,
    pub from: CameraKeyframe,
    pub to: CameraKeyframe,
    /// Duration in milliseconds.
    pub duration: f64,
    pub easing: Easing,
    pub start_time: f64,
    pub on_complete: Option<CompletionCallback>,
}

impl CameraAnimation {
    /// Linear progress at `now`, clamped to `[0, 1]`.
    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    /// Camera placement at `now` and the raw progress it was computed from.
    ///
    /// The final frame lands exactly on `to`.
    pub fn sample(&self, now: f64) -> (CameraKeyframe, f64) {
        let progress = self.progress(now);
        if progress >= 1.0 {
            return (self.to, 1.0);
        }
        let eased = self.easing.apply(progress);
        (self.from.lerp(&self.to, eased), progress)
    }
}

impl fmt::Debug for CameraAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraAnimation")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("duration", &self.duration)
            .field("easing", &self.easing)
            .field("start_time", &self.start_time)
            .field("has_on_complete", &self.on_complete.is_some())
            .finish()
    }
}
