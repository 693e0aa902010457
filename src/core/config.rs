//! Configuration for the tile and overlay engine
//!
//! Everything the engine needs is grouped into one [`EngineConfig`] that can
//! be built from presets or loaded from JSON. It is loaded once and shared
//! read-only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{
    CACHE_DIR_ENV, DEFAULT_EVENT_CAPACITY, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MEMORY_CACHE_TILES, DEFAULT_USER_AGENT,
};
use crate::rendering::painter::PaintStyle;
use crate::tiles::source::ServerInfo;
use crate::{MapError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerInfo,
    pub cache: TileCacheConfig,
    pub fetch: FetchConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Small limits and no network pressure, for tests
    pub fn for_testing() -> Self {
        Self {
            server: ServerInfo::new("http://127.0.0.1:9/{z}/{x}/{y}.png"),
            cache: TileCacheConfig {
                root: None,
                memory_capacity: 16,
            },
            fetch: FetchConfig {
                max_concurrent: 1,
                timeout_ms: 500,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            render: RenderConfig {
                mode: PipelineMode::Chain,
                keep_buffer: 0,
                style: PaintStyle::default(),
                event_capacity: DEFAULT_EVENT_CAPACITY,
            },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        if self.fetch.max_concurrent == 0 {
            return Err(MapError::Config("fetch.max_concurrent must be at least 1".into()));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(MapError::Config("fetch.timeout_ms must be positive".into()));
        }
        if self.cache.memory_capacity == 0 {
            return Err(MapError::Config("cache.memory_capacity must be at least 1".into()));
        }
        if self.render.event_capacity == 0 {
            return Err(MapError::Config("render.event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileCacheConfig {
    /// Cache root; falls back to `$HVMAP_TILE_CACHE_DIR`, then the per-user cache dir
    pub root: Option<PathBuf>,
    /// Tiles kept in memory in front of the disk store
    pub memory_capacity: usize,
}

impl TileCacheConfig {
    /// Resolves the directory tiles are stored under.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        directories::ProjectDirs::from("org", "hvmap", "hvmap")
            .map(|dirs| dirs.cache_dir().join("tiles"))
            .ok_or_else(|| MapError::Config("no home directory for the tile cache".into()))
    }
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            memory_capacity: DEFAULT_MEMORY_CACHE_TILES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum in-flight requests against the tile server
    pub max_concurrent: usize,
    /// Per-request timeout; failed requests are never retried
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// How layers after the first one are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Self-scheduling sequential links
    #[default]
    Chain,
    /// FIFO queue drained by a background dispatcher
    Queue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub mode: PipelineMode,
    /// Extra rings of tiles loaded around the visible area
    pub keep_buffer: u32,
    pub style: PaintStyle,
    /// Render events retained for a consumer that is not reading
    pub event_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Chain,
            keep_buffer: 1,
            style: PaintStyle::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
