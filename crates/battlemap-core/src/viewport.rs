//! Viewport manager: pan/zoom/rotation state and animated camera transitions.
//!
//! A viewport is either idle or transitioning. Animated operations start a
//! [`CameraAnimation`]; starting another one while a transition is in flight
//! freezes the camera at its current interpolated placement and replaces the
//! old animation, so two transitions never interleave. The host drives
//! animations by calling [`ViewportManager::tick`] once per display frame.

use std::sync::Arc;

use crate::camera::{Camera, CameraAnimation, CameraKeyframe, CameraState, CompletionCallback};
use crate::clock::FrameClock;
use crate::coords::{CoordinateConversion, CoordinateSpace, ViewTransform};
use crate::easing::Easing;
use crate::surface::{Surface, SurfaceArena, SurfaceId};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tunables for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Multiplier used by `zoom_in` / `zoom_out`.
    pub zoom_step: f64,
    /// Duration of `Transition::Smooth`, in milliseconds.
    pub default_duration_ms: f64,
    /// Easing of `Transition::Smooth`.
    pub default_easing: Easing,
    /// Padding used by `zoom_to_fit`, in pixels.
    pub fit_padding: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 10.0,
            zoom_step: 1.2,
            default_duration_ms: 300.0,
            default_easing: Easing::EaseOut,
            fit_padding: 50.0,
        }
    }
}

/// How a camera change reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Transition {
    /// Apply immediately.
    #[default]
    Instant,
    /// Animate with the configured default duration and easing.
    Smooth,
    /// Animate with an explicit duration (milliseconds) and easing.
    Animated { duration_ms: f64, easing: Easing },
}

impl Transition {
    pub fn animated(duration_ms: f64, easing: Easing) -> Self {
        Transition::Animated { duration_ms, easing }
    }

    fn resolve(self, config: &ViewportConfig) -> Option<(f64, Easing)> {
        match self {
            Transition::Instant => None,
            Transition::Smooth => Some((config.default_duration_ms, config.default_easing)),
            Transition::Animated { duration_ms, easing } => Some((duration_ms, easing)),
        }
    }
}

/// Options for [`ViewportManager::fit_to_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitOptions {
    /// Padding in pixels; the configured `fit_padding` when `None`.
    pub padding: Option<f64>,
    pub transition: Transition,
}

/// Snapshot of a viewport for UI display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub position: Vec2,
    pub zoom: f64,
    pub rotation: f64,
    /// Surface rectangle in pixels.
    pub bounds: Rect,
    /// World-space rectangle visible through the surface.
    pub world_bounds: Rect,
    pub is_transitioning: bool,
    pub transition_id: Option<String>,
}

/// What the host should do after stepping a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing is animating; no further frames needed.
    Idle,
    /// The animation advanced; request another frame.
    Continue,
    /// The animation reached its target on this frame.
    Finished,
}

#[derive(Debug, Default)]
enum AnimationState {
    #[default]
    Idle,
    Running(CameraAnimation),
}

/// Owns one viewport's camera, its stage surface, and its transitions.
pub struct ViewportManager {
    config: ViewportConfig,
    camera: Camera,
    surfaces: SurfaceArena,
    stage: Option<SurfaceId>,
    size: Size,
    surface_origin: Vec2,
    state: ViewportState,
    camera_state: CameraState,
    animation: AnimationState,
    clock: Arc<dyn FrameClock>,
}

impl std::fmt::Debug for ViewportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportManager")
            .field("config", &self.config)
            .field("camera", &self.camera)
            .field("stage", &self.stage)
            .field("size", &self.size)
            .field("state", &self.state)
            .field("animation", &self.animation)
            .finish()
    }
}

impl ViewportManager {
    /// Create a viewport over a surface of `size` pixels.
    pub fn new(size: Size, config: ViewportConfig, clock: Arc<dyn FrameClock>) -> Self {
        let mut surfaces = SurfaceArena::new();
        let stage = surfaces.create(size);
        let camera = Camera::with_limits(config.min_zoom, config.max_zoom);
        let mut manager = Self {
            config,
            camera,
            surfaces,
            stage: Some(stage),
            size,
            surface_origin: Vec2::ZERO,
            state: ViewportState {
                position: Vec2::ZERO,
                zoom: 1.0,
                rotation: 0.0,
                bounds: Rect::ZERO,
                world_bounds: Rect::ZERO,
                is_transitioning: false,
                transition_id: None,
            },
            camera_state: CameraState::default(),
            animation: AnimationState::Idle,
            clock,
        };
        manager.camera.zoom = manager.camera.clamp_zoom(1.0);
        manager.sync();
        manager
    }

    /// Whether `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.stage.is_none()
    }

    /// Copy of the viewport state.
    pub fn state(&self) -> ViewportState {
        self.state.clone()
    }

    /// Copy of the camera state.
    pub fn camera_state(&self) -> CameraState {
        self.camera_state.clone()
    }

    /// Copy of the configuration.
    pub fn config(&self) -> ViewportConfig {
        self.config
    }

    /// Replace the configuration; the current zoom is re-clamped to the new limits.
    pub fn set_config(&mut self, config: ViewportConfig) {
        if self.is_destroyed() {
            return;
        }
        self.config = config;
        self.camera.min_zoom = config.min_zoom;
        self.camera.max_zoom = config.max_zoom;
        self.camera.zoom = self.camera.clamp_zoom(self.camera.zoom);
        self.sync();
    }

    /// Current pure view parameters.
    pub fn view_transform(&self) -> ViewTransform {
        self.camera.view()
    }

    pub fn zoom(&self) -> f64 {
        self.camera.zoom
    }

    /// Zoom as a rounded percentage for display.
    pub fn zoom_percentage(&self) -> f64 {
        (self.camera.zoom * 100.0).round()
    }

    pub fn position(&self) -> Vec2 {
        self.camera.position
    }

    pub fn rotation(&self) -> f64 {
        self.camera.rotation
    }

    pub fn surface_size(&self) -> Size {
        self.size
    }

    /// Read-only view of the stage surface.
    pub fn stage(&self) -> Option<&Surface> {
        self.stage.and_then(|id| self.surfaces.get(id))
    }

    /// Resize the drawing surface.
    pub fn set_surface_size(&mut self, size: Size) {
        if self.is_destroyed() {
            return;
        }
        self.size = size;
        if let Some(stage) = self.stage.and_then(|id| self.surfaces.get_mut(id)) {
            stage.size = size;
        }
        self.sync();
    }

    /// Screen position of the surface's top-left corner.
    pub fn set_surface_origin(&mut self, origin: Point) {
        if self.is_destroyed() {
            return;
        }
        self.surface_origin = origin.to_vec2();
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.animation, AnimationState::Running(_))
    }

    /// Zoom to `zoom` (clamped), keeping `center` fixed on screen.
    ///
    /// Without a center the surface centre stays fixed.
    pub fn set_zoom(&mut self, zoom: f64, center: Option<Point>, transition: Transition) {
        if self.is_destroyed() {
            return;
        }
        self.settle_in_flight();
        let center = center.unwrap_or_else(|| self.surface_center());
        let target = self.camera.zoomed_about(center, zoom);
        self.begin(target, transition, None);
    }

    /// Zoom in by the configured step.
    pub fn zoom_in(&mut self, center: Option<Point>, transition: Transition) {
        let target = self.target_camera().zoom * self.config.zoom_step;
        self.set_zoom(target, center, transition);
    }

    /// Zoom out by the configured step.
    pub fn zoom_out(&mut self, center: Option<Point>, transition: Transition) {
        let target = self.target_camera().zoom / self.config.zoom_step;
        self.set_zoom(target, center, transition);
    }

    /// Move the world origin to `position` on screen.
    pub fn set_pan(&mut self, position: Vec2, transition: Transition) {
        if self.is_destroyed() {
            return;
        }
        self.settle_in_flight();
        let mut target = self.camera;
        target.position = position;
        self.begin(target, transition, None);
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, delta: Vec2, transition: Transition) {
        if self.is_destroyed() {
            return;
        }
        self.settle_in_flight();
        let mut target = self.camera;
        target.pan(delta);
        self.begin(target, transition, None);
    }

    /// Rotate to `degrees`, normalized into `[0, 360)`.
    pub fn set_rotation(&mut self, degrees: f64, transition: Transition) {
        if self.is_destroyed() {
            return;
        }
        self.settle_in_flight();
        let mut target = self.camera;
        target.rotation = crate::coords::normalize_degrees(degrees);
        self.begin(target, transition, None);
    }

    /// Fit `bounds` (world units) inside the surface.
    pub fn fit_to_bounds(&mut self, bounds: Rect, options: FitOptions) {
        if self.is_destroyed() {
            return;
        }
        self.settle_in_flight();
        let padding = options.padding.unwrap_or(self.config.fit_padding);
        let target = self.camera.fitted(bounds, self.size, padding);
        self.begin(target, options.transition, None);
    }

    /// Fit with the configured padding and default animation.
    pub fn zoom_to_fit(&mut self, bounds: Rect) {
        self.fit_to_bounds(
            bounds,
            FitOptions {
                padding: None,
                transition: Transition::Smooth,
            },
        );
    }

    /// Back to the origin at 100% without rotation.
    pub fn reset(&mut self, transition: Transition) {
        if self.is_destroyed() {
            return;
        }
        self.settle_in_flight();
        let mut target = self.camera;
        target.reset();
        self.begin(target, transition, None);
    }

    /// Current placement as a keyframe stamped with the clock.
    pub fn capture_keyframe(&self) -> CameraKeyframe {
        self.camera.keyframe(self.clock.now_ms())
    }

    /// Animate to a keyframe; `on_complete` fires once when it is reached.
    ///
    /// Returns the animation id, or `None` when the move was applied at once.
    pub fn animate_to(
        &mut self,
        keyframe: CameraKeyframe,
        duration_ms: f64,
        easing: Easing,
        on_complete: Option<CompletionCallback>,
    ) -> Option<String> {
        if self.is_destroyed() {
            return None;
        }
        self.settle_in_flight();
        let mut target = self.camera;
        target.apply_keyframe(&keyframe);
        target.zoom = target.clamp_zoom(target.zoom);
        self.begin(target, Transition::animated(duration_ms, easing), on_complete)
    }

    /// Stop the in-flight animation where it is. `on_complete` does not fire.
    pub fn cancel_animation(&mut self) -> bool {
        match std::mem::take(&mut self.animation) {
            AnimationState::Running(animation) => {
                log::debug!("camera animation {} cancelled", animation.id);
                self.sync();
                true
            }
            AnimationState::Idle => false,
        }
    }

    /// Advance the animation using the injected clock.
    pub fn tick(&mut self) -> FrameOutcome {
        let now = self.clock.now_ms();
        self.step(now)
    }

    /// Advance the animation to `now` (milliseconds on the frame clock).
    pub fn step(&mut self, now: f64) -> FrameOutcome {
        let AnimationState::Running(animation) = &self.animation else {
            return FrameOutcome::Idle;
        };
        let (frame, progress) = animation.sample(now);
        self.apply_frame(&frame);

        if progress < 1.0 {
            self.sync();
            return FrameOutcome::Continue;
        }

        let AnimationState::Running(finished) = std::mem::take(&mut self.animation) else {
            return FrameOutcome::Idle;
        };
        log::debug!("camera animation {} finished", finished.id);
        self.sync();
        if let Some(callback) = finished.on_complete {
            callback();
        }
        FrameOutcome::Finished
    }

    /// Screen pixel → world.
    pub fn screen_to_world(&self, point: Point) -> Point {
        self.camera.screen_to_world(self.screen_to_stage(point))
    }

    /// World → screen pixel.
    pub fn world_to_screen(&self, point: Point) -> Point {
        self.stage_to_screen(self.camera.world_to_screen(point))
    }

    /// Screen pixel → surface-local pixel.
    pub fn screen_to_stage(&self, point: Point) -> Point {
        point - self.surface_origin
    }

    /// Surface-local pixel → screen pixel.
    pub fn stage_to_screen(&self, point: Point) -> Point {
        point + self.surface_origin
    }

    /// Convert a point between spaces, routing through world space.
    pub fn convert_coordinates(
        &self,
        point: Point,
        from: CoordinateSpace,
        to: CoordinateSpace,
    ) -> CoordinateConversion {
        if self.is_destroyed() {
            return CoordinateConversion::invalid(point, from, to);
        }
        let world = match from {
            CoordinateSpace::Screen => self.screen_to_world(point),
            CoordinateSpace::Stage => self.camera.screen_to_world(point),
            CoordinateSpace::World | CoordinateSpace::Local => point,
        };
        let target = match to {
            CoordinateSpace::Screen => self.world_to_screen(world),
            CoordinateSpace::Stage => self.camera.world_to_screen(world),
            CoordinateSpace::World | CoordinateSpace::Local => world,
        };
        CoordinateConversion {
            source: point,
            target,
            source_space: from,
            target_space: to,
            is_valid: true,
        }
    }

    /// Stop animations and release the stage surface. Later mutators are no-ops.
    pub fn destroy(&mut self) {
        if let AnimationState::Running(animation) = std::mem::take(&mut self.animation) {
            log::debug!("camera animation {} dropped on destroy", animation.id);
        }
        if let Some(stage) = self.stage.take() {
            self.surfaces.destroy(stage);
        }
        self.state.is_transitioning = false;
        self.state.transition_id = None;
        self.camera_state.is_animating = false;
        self.camera_state.animation_id = None;
    }

    fn surface_center(&self) -> Point {
        Point::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// Where the camera is heading: the animation target, or the camera itself.
    fn target_camera(&self) -> Camera {
        match &self.animation {
            AnimationState::Running(animation) => {
                let mut target = self.camera;
                target.apply_keyframe(&animation.to);
                target
            }
            AnimationState::Idle => self.camera,
        }
    }

    /// Freeze an in-flight animation at its current interpolated placement.
    fn settle_in_flight(&mut self) {
        if !self.is_transitioning() {
            return;
        }
        let now = self.clock.now_ms();
        if let AnimationState::Running(animation) = &self.animation {
            let (frame, _) = animation.sample(now);
            self.apply_frame(&frame);
        }
        if let AnimationState::Running(animation) = std::mem::take(&mut self.animation) {
            log::debug!("camera animation {} superseded", animation.id);
        }
        self.sync();
    }

    fn begin(
        &mut self,
        mut target: Camera,
        transition: Transition,
        on_complete: Option<CompletionCallback>,
    ) -> Option<String> {
        target.zoom = target.clamp_zoom(target.zoom);
        let now = self.clock.now_ms();

        let animated = transition
            .resolve(&self.config)
            .filter(|(duration, _)| duration.is_finite() && *duration > 0.0);

        let Some((duration, easing)) = animated else {
            self.camera = target;
            self.apply_camera_to_stage();
            self.sync();
            if let Some(callback) = on_complete {
                callback();
            }
            return None;
        };

        let id = format!("camera-{}", Uuid::new_v4());
        log::debug!(
            "camera animation {id} started: zoom {:.3} -> {:.3} over {duration}ms ({easing})",
            self.camera.zoom,
            target.zoom
        );
        self.animation = AnimationState::Running(CameraAnimation {
            id: id.clone(),
            from: self.camera.keyframe(now),
            to: target.keyframe(now + duration),
            duration,
            easing,
            start_time: now,
            on_complete,
        });
        self.sync();
        Some(id)
    }

    fn apply_frame(&mut self, frame: &CameraKeyframe) {
        self.camera.apply_keyframe(frame);
        // Overshooting easings may not push zoom out of range.
        self.camera.zoom = self.camera.clamp_zoom(self.camera.zoom);
        self.apply_camera_to_stage();
    }

    fn apply_camera_to_stage(&mut self) {
        let camera = self.camera;
        if let Some(stage) = self.stage.and_then(|id| self.surfaces.get_mut(id)) {
            stage.position = camera.position;
            stage.scale = camera.zoom;
            stage.rotation = camera.rotation;
        }
    }

    /// Rebuild the state snapshots from the camera.
    fn sync(&mut self) {
        let bounds = Rect::from_origin_size(Point::ORIGIN, self.size);
        let transition_id = match &self.animation {
            AnimationState::Running(animation) => Some(animation.id.clone()),
            AnimationState::Idle => None,
        };
        let is_transitioning = transition_id.is_some();

        self.state = ViewportState {
            position: self.camera.position,
            zoom: self.camera.zoom,
            rotation: self.camera.rotation,
            bounds,
            world_bounds: self.camera.inverse_transform().transform_rect_bbox(bounds),
            is_transitioning,
            transition_id: transition_id.clone(),
        };
        self.camera_state = CameraState {
            position: self.camera.position,
            zoom: self.camera.zoom,
            rotation: self.camera.rotation,
            timestamp: self.clock.now_ms(),
            is_animating: is_transitioning,
            animation_id: transition_id,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> (ViewportManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0.0));
        let viewport = ViewportManager::new(Size::new(800.0, 600.0), ViewportConfig::default(), clock.clone());
        (viewport, clock)
    }

    #[test]
    fn test_initial_state() {
        let (viewport, _) = manager();
        let state = viewport.state();
        assert_eq!(state.zoom, 1.0);
        assert_eq!(state.bounds, Rect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(state.world_bounds, Rect::new(0.0, 0.0, 800.0, 600.0));
        assert!(!state.is_transitioning);
        assert!(state.transition_id.is_none());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let (mut viewport, _) = manager();
        for requested in [-5.0, 0.0, 0.05, 0.5, 3.0, 10.0, 42.0, f64::INFINITY, f64::NAN] {
            viewport.set_zoom(requested, None, Transition::Instant);
            let zoom = viewport.state().zoom;
            assert!((0.1..=10.0).contains(&zoom), "{requested} -> {zoom}");
        }
    }

    #[test]
    fn test_zoom_about_point_is_pixel_stable() {
        let (mut viewport, _) = manager();
        viewport.set_pan(Vec2::new(37.0, -12.0), Transition::Instant);
        let center = Point::new(250.0, 410.0);
        let world = viewport.screen_to_world(center);

        viewport.set_zoom(3.2, Some(center), Transition::Instant);

        let screen = viewport.world_to_screen(world);
        assert!((screen.x - center.x).abs() < 1e-6);
        assert!((screen.y - center.y).abs() < 1e-6);
        let expected = center.to_vec2() - (center.to_vec2() - Vec2::new(37.0, -12.0)) * 3.2;
        assert!((viewport.position() - expected).hypot() < 1e-6);
    }

    #[test]
    fn test_animated_zoom_linear_midpoint_and_end() {
        let (mut viewport, clock) = manager();
        let id = viewport.state().transition_id;
        assert!(id.is_none());

        viewport.set_zoom(2.0, None, Transition::animated(300.0, Easing::Linear));
        assert!(viewport.state().is_transitioning);

        clock.set(150.0);
        assert_eq!(viewport.tick(), FrameOutcome::Continue);
        assert!((viewport.state().zoom - 1.5).abs() < 1e-9);
        assert!(viewport.camera_state().is_animating);

        clock.set(300.0);
        assert_eq!(viewport.tick(), FrameOutcome::Finished);
        let state = viewport.state();
        assert!(!state.is_transitioning);
        assert_eq!(state.zoom, 2.0);
        assert!(state.transition_id.is_none());

        assert_eq!(viewport.tick(), FrameOutcome::Idle);
    }

    #[test]
    fn test_new_animation_supersedes_previous() {
        let (mut viewport, clock) = manager();
        viewport.set_zoom(3.0, None, Transition::animated(100.0, Easing::Linear));
        let first = viewport.state().transition_id.unwrap();

        clock.set(50.0);
        viewport.set_pan(Vec2::new(100.0, 0.0), Transition::animated(100.0, Easing::Linear));
        let state = viewport.state();
        let second = state.transition_id.clone().unwrap();
        assert_ne!(first, second);
        // Restarted from the interpolated zoom, not the old target.
        assert!((state.zoom - 2.0).abs() < 1e-9);

        clock.set(150.0);
        assert_eq!(viewport.tick(), FrameOutcome::Finished);
        assert!((viewport.zoom() - 2.0).abs() < 1e-9);
        assert!((viewport.position().x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_on_complete_fires_exactly_once() {
        let (mut viewport, clock) = manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut target = viewport.capture_keyframe();
        target.zoom = 4.0;

        let id = viewport.animate_to(
            target,
            200.0,
            Easing::EaseInOut,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        assert!(id.is_some());

        clock.set(100.0);
        viewport.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        clock.set(250.0);
        viewport.tick();
        viewport.tick();
        clock.set(400.0);
        viewport.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(viewport.zoom(), 4.0);
    }

    #[test]
    fn test_cancel_does_not_fire_on_complete() {
        let (mut viewport, clock) = manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut target = viewport.capture_keyframe();
        target.rotation = 90.0;
        viewport.animate_to(
            target,
            100.0,
            Easing::Linear,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        clock.set(50.0);
        viewport.tick();
        assert!(viewport.cancel_animation());
        assert!(!viewport.cancel_animation());

        clock.set(500.0);
        assert_eq!(viewport.tick(), FrameOutcome::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!((viewport.rotation() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_elastic_overshoot_stays_in_zoom_range() {
        let (mut viewport, clock) = manager();
        viewport.set_zoom(10.0, None, Transition::animated(1000.0, Easing::Elastic));
        for t in (0..=1000).step_by(10) {
            clock.set(t as f64);
            viewport.tick();
            let zoom = viewport.state().zoom;
            assert!((0.1..=10.0).contains(&zoom), "t={t} zoom={zoom}");
        }
        assert_eq!(viewport.zoom(), 10.0);
    }

    #[test]
    fn test_rotation_is_normalized() {
        let (mut viewport, _) = manager();
        viewport.set_rotation(-90.0, Transition::Instant);
        assert!((viewport.rotation() - 270.0).abs() < 1e-9);
        viewport.set_rotation(720.0, Transition::Instant);
        assert!(viewport.rotation().abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_bounds_scenario() {
        let (mut viewport, _) = manager();
        viewport.fit_to_bounds(
            Rect::new(0.0, 0.0, 1000.0, 1000.0),
            FitOptions {
                padding: Some(50.0),
                transition: Transition::Instant,
            },
        );
        let state = viewport.state();
        assert!((state.zoom - 0.5).abs() < 1e-12);
        let center = viewport.world_to_screen(Point::new(500.0, 500.0));
        assert!((center.x - 400.0).abs() < 1e-9);
        assert!((center.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_to_fit_animates() {
        let (mut viewport, clock) = manager();
        viewport.zoom_to_fit(Rect::new(0.0, 0.0, 2000.0, 2000.0));
        assert!(viewport.is_transitioning());
        clock.set(300.0);
        assert_eq!(viewport.tick(), FrameOutcome::Finished);
        assert!((viewport.zoom() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_reset_animated() {
        let (mut viewport, clock) = manager();
        viewport.set_zoom(4.0, Some(Point::new(10.0, 10.0)), Transition::Instant);
        viewport.set_rotation(30.0, Transition::Instant);
        viewport.reset(Transition::Smooth);
        assert!(viewport.is_transitioning());
        clock.set(1000.0);
        viewport.tick();
        let state = viewport.state();
        assert_eq!(state.position, Vec2::ZERO);
        assert_eq!(state.zoom, 1.0);
        assert_eq!(state.rotation, 0.0);
    }

    #[test]
    fn test_zoom_in_out_steps() {
        let (mut viewport, _) = manager();
        viewport.zoom_in(None, Transition::Instant);
        assert!((viewport.zoom() - 1.2).abs() < 1e-12);
        viewport.zoom_out(None, Transition::Instant);
        assert!((viewport.zoom() - 1.0).abs() < 1e-12);
        assert_eq!(viewport.zoom_percentage(), 100.0);
    }

    #[test]
    fn test_world_bounds_follow_camera() {
        let (mut viewport, _) = manager();
        viewport.set_pan(Vec2::new(-100.0, -50.0), Transition::Instant);
        viewport.set_zoom(2.0, Some(Point::ZERO), Transition::Instant);
        let state = viewport.state();
        let expected = viewport.view_transform().inverse_affine().transform_rect_bbox(state.bounds);
        assert_eq!(state.world_bounds, expected);
        assert!((state.world_bounds.width() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_is_a_copy() {
        let (mut viewport, _) = manager();
        let mut state = viewport.state();
        state.zoom = 9.0;
        let mut config = viewport.config();
        config.max_zoom = 1000.0;
        assert_eq!(viewport.state().zoom, 1.0);
        assert_eq!(viewport.config().max_zoom, 10.0);
        viewport.set_zoom(50.0, None, Transition::Instant);
        assert_eq!(viewport.zoom(), 10.0);
    }

    #[test]
    fn test_set_config_reclamps() {
        let (mut viewport, _) = manager();
        viewport.set_zoom(8.0, None, Transition::Instant);
        viewport.set_config(ViewportConfig {
            max_zoom: 4.0,
            ..ViewportConfig::default()
        });
        assert_eq!(viewport.zoom(), 4.0);
    }

    #[test]
    fn test_inverted_zoom_limits_do_not_panic() {
        let (mut viewport, _) = manager();
        viewport.set_zoom(8.0, None, Transition::Instant);
        viewport.set_config(ViewportConfig {
            min_zoom: 5.0,
            max_zoom: 2.0,
            ..ViewportConfig::default()
        });
        assert_eq!(viewport.zoom(), 5.0);
        viewport.set_zoom(0.5, None, Transition::Instant);
        assert_eq!(viewport.zoom(), 2.0);
    }

    #[test]
    fn test_nan_min_zoom_falls_back_to_default() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut viewport = ViewportManager::new(
            Size::new(800.0, 600.0),
            ViewportConfig {
                min_zoom: f64::NAN,
                ..ViewportConfig::default()
            },
            clock,
        );
        assert_eq!(viewport.zoom(), 1.0);
        viewport.set_zoom(0.0001, None, Transition::Instant);
        assert!((viewport.zoom() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_convert_coordinates_routes_through_world() {
        let (mut viewport, _) = manager();
        viewport.set_surface_origin(Point::new(20.0, 10.0));
        viewport.set_pan(Vec2::new(100.0, 100.0), Transition::Instant);
        viewport.set_zoom(2.0, Some(Point::new(100.0, 100.0)), Transition::Instant);

        let conversion =
            viewport.convert_coordinates(Point::new(320.0, 210.0), CoordinateSpace::Screen, CoordinateSpace::World);
        assert!(conversion.is_valid);
        assert!((conversion.target.x - 100.0).abs() < 1e-9);
        assert!((conversion.target.y - 50.0).abs() < 1e-9);

        let stage =
            viewport.convert_coordinates(Point::new(320.0, 210.0), CoordinateSpace::Screen, CoordinateSpace::Stage);
        assert_eq!(stage.target, Point::new(300.0, 200.0));

        let local =
            viewport.convert_coordinates(Point::new(7.0, 8.0), CoordinateSpace::World, CoordinateSpace::Local);
        assert_eq!(local.target, Point::new(7.0, 8.0));
    }

    #[test]
    fn test_destroy_stops_animation_and_ignores_mutators() {
        let (mut viewport, clock) = manager();
        viewport.set_zoom(5.0, None, Transition::animated(100.0, Easing::Linear));
        viewport.destroy();
        assert!(viewport.is_destroyed());
        assert!(viewport.stage().is_none());

        clock.set(200.0);
        assert_eq!(viewport.tick(), FrameOutcome::Idle);
        assert_eq!(viewport.zoom(), 1.0);

        viewport.set_zoom(3.0, None, Transition::Instant);
        assert_eq!(viewport.zoom(), 1.0);

        let conversion =
            viewport.convert_coordinates(Point::new(1.0, 2.0), CoordinateSpace::Screen, CoordinateSpace::World);
        assert!(!conversion.is_valid);
        assert_eq!(conversion.target, conversion.source);
    }

    #[test]
    fn test_stage_surface_tracks_camera() {
        let (mut viewport, _) = manager();
        viewport.set_pan(Vec2::new(12.0, 34.0), Transition::Instant);
        viewport.set_zoom(2.0, Some(Point::new(12.0, 34.0)), Transition::Instant);
        let stage = viewport.stage().unwrap();
        assert_eq!(stage.position, Vec2::new(12.0, 34.0));
        assert_eq!(stage.scale, 2.0);
    }

    #[test]
    fn test_zero_duration_applies_immediately() {
        let (mut viewport, _) = manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut target = viewport.capture_keyframe();
        target.zoom = 2.0;
        let id = viewport.animate_to(
            target,
            0.0,
            Easing::Linear,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        assert!(id.is_none());
        assert_eq!(viewport.zoom(), 2.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
