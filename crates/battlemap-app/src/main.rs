//! Headless battle-map driver.
//!
//! Loads an engine configuration (first argument, or the defaults), builds a
//! canvas, runs a scripted set of camera transitions against a simulated frame
//! clock and prints one JSON snapshot per step. `RUST_LOG` controls logging.

use std::process::ExitCode;
use std::sync::Arc;

use battlemap_core::camera::CameraState;
use battlemap_core::clock::{FrameClock, ManualClock};
use battlemap_core::config::{ConfigError, EngineConfig};
use battlemap_core::coords::{CoordinateConversion, CoordinateSpace, union_bounds};
use battlemap_core::grid::GridConfig;
use battlemap_core::layers::LayerManagerState;
use battlemap_core::surface::Drawable;
use battlemap_core::viewport::{FitOptions, Transition, ViewportState};
use battlemap_render::{
    CanvasId, CanvasRegistry, GridStyle, RenderContext, RenderStats, RenderableObject, RenderableUpdate, ViewportMut,
    grid_drawable,
};
use kurbo::{Point, Rect};
use peniko::Color;
use serde::Serialize;
use thiserror::Error;

/// Simulated display refresh interval.
const FRAME_MS: f64 = 1000.0 / 60.0;
/// Frames after which a transition is considered stuck.
const MAX_FRAMES: usize = 600;
const TOKEN_RADIUS: f64 = 20.0;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canvas {0} disappeared")]
    MissingCanvas(CanvasId),
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    step: &'a str,
    time_ms: f64,
    frames: usize,
    viewport: ViewportState,
    camera: CameraState,
    layers: LayerManagerState,
    stats: RenderStats,
    pointer: CoordinateConversion,
}

struct Demo {
    registry: CanvasRegistry,
    clock: Arc<ManualClock>,
    canvas: CanvasId,
    grid: GridConfig,
}

impl Demo {
    fn new(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(0.0));
        let grid = config.grid;
        let size = config.surface.size();
        let mut registry = CanvasRegistry::new(config, clock.clone());
        let canvas = registry.create_canvas(size);
        Self {
            registry,
            clock,
            canvas,
            grid,
        }
    }

    /// Place a few tokens on grid cells and draw the grid under them.
    fn populate(&mut self) -> Result<Rect, AppError> {
        let tokens = [
            ("fighter", Point::new(100.0, 100.0), Color::from_rgba8(200, 30, 30, 255)),
            ("wizard", Point::new(420.0, 180.0), Color::from_rgba8(40, 80, 220, 255)),
            ("goblin", Point::new(900.0, 640.0), Color::from_rgba8(40, 160, 60, 255)),
        ];
        let canvas = self
            .registry
            .canvas_mut(&self.canvas)
            .ok_or_else(|| AppError::MissingCanvas(self.canvas.clone()))?;

        let mut footprints = Vec::new();
        for (name, position, color) in tokens {
            let center = canvas.snap(position).point;
            footprints.push(Rect::from_center_size(center, (TOKEN_RADIUS * 2.0, TOKEN_RADIUS * 2.0)));
            canvas.rendering_mut().add_object(RenderableObject::new(
                name,
                "token",
                "objects",
                center,
                move |ctx| {
                    // Keep tokens legible when zoomed far out.
                    let radius = TOKEN_RADIUS.max(4.0 / ctx.zoom);
                    Some(Drawable::circle(center, radius, color).with_stroke(Color::BLACK, 1.0))
                },
            ));
        }

        let area = canvas.viewport().state().world_bounds;
        let grid = self.grid;
        canvas.rendering_mut().add_object(RenderableObject::new(
            "grid",
            "grid",
            "grid",
            Point::ORIGIN,
            move |_| grid_drawable(area, &grid, GridStyle::Lines),
        ));
        Ok(union_bounds(footprints))
    }

    fn viewport_mut(&mut self) -> Result<ViewportMut<'_>, AppError> {
        self.registry
            .viewport_mut(&self.canvas)
            .ok_or_else(|| AppError::MissingCanvas(self.canvas.clone()))
    }

    /// Step frames until no canvas is animating. Returns the frame count.
    fn run_frames(&mut self) -> usize {
        let mut frames = 0;
        while frames < MAX_FRAMES {
            self.clock.advance(FRAME_MS);
            frames += 1;
            if self.registry.tick_all().is_empty() {
                break;
            }
        }
        frames
    }

    /// Redraw the grid over whatever is visible now.
    fn refresh_grid(&mut self) -> Result<(), AppError> {
        let grid = self.grid;
        let canvas = self
            .registry
            .canvas_mut(&self.canvas)
            .ok_or_else(|| AppError::MissingCanvas(self.canvas.clone()))?;
        let area = canvas.viewport().state().world_bounds;
        canvas.rendering_mut().update_object(
            "grid",
            RenderableUpdate {
                render: Some(Arc::new(move |_: &RenderContext| grid_drawable(area, &grid, GridStyle::Lines))),
                ..RenderableUpdate::default()
            },
        );
        Ok(())
    }

    fn snapshot(&self, step: &str, frames: usize, pointer: Point) -> Result<String, AppError> {
        let canvas = self
            .registry
            .canvas(&self.canvas)
            .ok_or_else(|| AppError::MissingCanvas(self.canvas.clone()))?;
        let snapshot = Snapshot {
            step,
            time_ms: self.clock.now_ms(),
            frames,
            viewport: canvas.viewport().state(),
            camera: canvas.viewport().camera_state(),
            layers: canvas.layers().state(),
            stats: canvas.rendering().stats(),
            pointer: self.registry.convert_coordinates(
                &self.canvas,
                pointer,
                CoordinateSpace::Screen,
                CoordinateSpace::World,
            ),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    fn run(&mut self) -> Result<(), AppError> {
        let pointer = Point::new(200.0, 150.0);
        let content = self.populate()?;
        println!("{}", self.snapshot("initial", 0, pointer)?);

        self.viewport_mut()?.fit_to_bounds(
            content,
            FitOptions {
                padding: None,
                transition: Transition::Smooth,
            },
        );
        let frames = self.run_frames();
        self.refresh_grid()?;
        println!("{}", self.snapshot("fit", frames, pointer)?);

        {
            let mut viewport = self.viewport_mut()?;
            viewport.zoom_in(Some(pointer), Transition::Smooth);
            viewport.zoom_in(Some(pointer), Transition::Smooth);
        }
        let frames = self.run_frames();
        self.refresh_grid()?;
        println!("{}", self.snapshot("zoom-in", frames, pointer)?);

        self.viewport_mut()?.set_rotation(45.0, Transition::Smooth);
        let frames = self.run_frames();
        self.refresh_grid()?;
        println!("{}", self.snapshot("rotate", frames, pointer)?);

        self.viewport_mut()?.reset(Transition::Smooth);
        let frames = self.run_frames();
        self.refresh_grid()?;
        println!("{}", self.snapshot("reset", frames, pointer)?);

        self.registry.destroy_canvas(&self.canvas);
        log::info!("demo finished at {:.1}ms", self.clock.now_ms());
        Ok(())
    }
}

fn load_config() -> Result<EngineConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(path),
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting battlemap");

    let result = load_config()
        .map_err(AppError::from)
        .and_then(|config| Demo::new(config).run());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("battlemap: {e}");
            ExitCode::FAILURE
        }
    }
}
