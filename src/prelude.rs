//! Prelude module for common hvmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use hvmap::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{EngineConfig, FetchConfig, PipelineMode, RenderConfig, TileCacheConfig},
    geo::{project, unproject, Coordinate, Tile, TilePoint},
    viewport::{ViewTransform, Viewport},
};

pub use crate::data::network::{
    BranchGraphic, Color, LineGraphic, NetworkData, NetworkGraphic, SegmentGraphic,
    SubstationGraphic,
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

pub use crate::rendering::{
    context::{Canvas, DrawCommand, DrawContext, RecordingContext},
    painter::{NetworkPainter, PaintStyle},
    pipeline::{RenderChain, RenderQueue, RenderTask, TaskState},
    renderer::{MapRenderer, RenderEvent},
};

pub use crate::{MapError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
