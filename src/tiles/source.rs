use serde::{Deserialize, Serialize};

use crate::core::constants::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, MAX_ZOOM_LEVEL, TILE_SIZE};
use crate::core::geo::Tile;
use crate::{MapError, Result};

/// Trait representing anything that can produce tile URLs for a given tile.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `tile`.
    fn url(&self, tile: Tile) -> String;
}

/// Descriptor of a remote raster tile server.
///
/// The template carries `{x}`, `{y}` and `{z}` placeholders; upper-case
/// spellings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url_template: String,
    #[serde(default = "default_tile_size")]
    pub tile_width: u32,
    #[serde(default = "default_tile_size")]
    pub tile_height: u32,
    #[serde(default)]
    pub min_zoom: u8,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

fn default_tile_size() -> u32 {
    TILE_SIZE
}

fn default_max_zoom() -> u8 {
    DEFAULT_MAX_ZOOM
}

impl ServerInfo {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }

    /// The public OpenStreetMap tile server.
    pub fn openstreetmap() -> Self {
        Self::new("https://tile.openstreetmap.org/{z}/{x}/{y}.png")
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Clamps `zoom` into this server's `[min_zoom, max_zoom]`
    pub fn clamp_zoom(&self, zoom: u8) -> u8 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Substitutes the tile indices into the URL template.
    pub fn tile_url(&self, tile: Tile) -> String {
        let x = tile.x.to_string();
        let y = tile.y.to_string();
        let z = tile.zoom.to_string();

        [("x", &x), ("y", &y), ("z", &z)]
            .iter()
            .fold(self.url_template.clone(), |url, (name, value)| {
                url.replace(&format!("{{{name}}}"), value)
                    .replace(&format!("{{{}}}", name.to_ascii_uppercase()), value)
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.url_template.trim().is_empty() {
            return Err(MapError::Config("tile URL template is empty".into()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(MapError::Config(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.max_zoom > MAX_ZOOM_LEVEL {
            return Err(MapError::Config(format!(
                "max_zoom {} exceeds {}",
                self.max_zoom, MAX_ZOOM_LEVEL
            )));
        }
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(MapError::Config("tile size must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::openstreetmap()
    }
}

impl TileSource for ServerInfo {
    fn url(&self, tile: Tile) -> String {
        self.tile_url(tile)
    }
}
