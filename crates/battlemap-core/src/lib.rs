//! Battle-map Core Library
//!
//! Coordinate math, the animated viewport camera and layer composition for the
//! battle-map editor. Nothing here draws pixels; drawing surfaces are plain
//! data owned by the managers through opaque handles.

pub mod camera;
pub mod clock;
pub mod config;
pub mod coords;
pub mod easing;
pub mod grid;
pub mod layers;
pub mod snap;
pub mod surface;
pub mod viewport;

pub use camera::{Camera, CameraAnimation, CameraKeyframe, CameraState, CompletionCallback};
pub use clock::{FrameClock, ManualClock, SystemClock};
pub use config::{ConfigError, ConfigResult, EngineConfig, SurfaceConfig};
pub use coords::{CoordinateConversion, CoordinateSpace, GridBounds, ViewTransform};
pub use easing::Easing;
pub use grid::{GridCell, GridConfig, GridKind, GridSnapConfig, HexCoord, SubGrid, DEFAULT_GRID_SIZE};
pub use layers::{
    BlendMode, CacheStatus, LayerConfig, LayerId, LayerInstance, LayerManager, LayerManagerState, LayerObject,
    LayerSnapshot, LayerSpec, LayerState, LayerUpdate,
};
pub use snap::{SnapKind, SnapResult, snap_point, snap_to_grid};
pub use surface::{DrawNode, Drawable, NodeId, Stroke, Surface, SurfaceArena, SurfaceId};
pub use viewport::{FitOptions, FrameOutcome, Transition, ViewportConfig, ViewportManager, ViewportState};
