//! # hvmap
//!
//! Tile and overlay rendering engine for high-voltage network maps.
//!
//! The crate projects geographic coordinates into Web Mercator tile space,
//! loads base-map tiles through a disk cache and a throttled HTTP client,
//! indexes substations and lines in per-draw-order R-trees, and paints
//! everything through a cancellable, progressive render pipeline. Windows,
//! widgets and event loops belong to the caller; the engine only draws into a
//! [`DrawContext`].

pub mod core;
pub mod data;
pub mod prelude;
pub mod rendering;
pub mod spatial;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Bounds,
    config::{EngineConfig, PipelineMode},
    geo::{project, unproject, Coordinate, Tile, TilePoint},
    viewport::{ViewTransform, Viewport},
};

pub use crate::data::network::{
    BranchGraphic, Color, LineGraphic, NetworkGraphic, SegmentGraphic, SubstationGraphic,
};

pub use crate::rendering::{
    context::{Canvas, DrawCommand, DrawContext, RecordingContext},
    painter::{NetworkPainter, PaintStyle},
    pipeline::{RenderChain, RenderQueue, RenderTask, TaskState},
    renderer::{MapRenderer, RenderEvent},
};

pub use crate::spatial::{
    index::{SpatialIndex, SpatialItem},
    layers::{LayeredIndex, SharedNetworkIndex},
};

pub use crate::tiles::{
    cache::{TileCache, TileImage},
    fetch::{HttpTileFetcher, ThrottledFetcher, TileFetcher},
    loader::TileLoader,
    source::{ServerInfo, TileSource},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for tile {tile}")]
    HttpStatus { tile: Tile, status: u16 },

    #[error("Tile fetch failed: {0}")]
    Fetch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Error type alias for convenience
pub type Error = MapError;

/// Initialise `env_logger` with `info` as the default filter.
#[cfg(feature = "debug")]
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
