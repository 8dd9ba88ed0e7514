//! Layer composition: ordered, lockable, clippable drawing surfaces.

mod config;
mod manager;

pub use config::{
    BlendMode, CacheStatus, LayerConfig, LayerId, LayerInstance, LayerObject, LayerSpec, LayerState, LayerUpdate,
};
pub use manager::{LayerManager, LayerManagerState, LayerSnapshot};
