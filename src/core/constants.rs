//! Engine-wide constants derived from common web-map conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Latitude limit of the Web Mercator square (atan(sinh(π)) in degrees).
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Zoom bounds used when a server descriptor does not narrow them.
pub const DEFAULT_MIN_ZOOM: u8 = 0;
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// Deepest zoom whose tile indices still fit the signed 32-bit tile grid.
pub const MAX_ZOOM_LEVEL: u8 = 30;

/// At most this many tile requests are in flight against the tile server.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 2;

/// Per-request timeout for tile downloads, in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Identifying User-Agent sent with every tile request.
pub const DEFAULT_USER_AGENT: &str = concat!("hvmap/", env!("CARGO_PKG_VERSION"));

/// Decoded tiles kept in memory in front of the disk cache.
pub const DEFAULT_MEMORY_CACHE_TILES: usize = 512;

/// Render events kept for a consumer that has fallen behind.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Children per R-tree node.
pub const RTREE_BRANCHING_FACTOR: usize = 6;

/// Environment variable overriding the tile cache root.
pub const CACHE_DIR_ENV: &str = "HVMAP_TILE_CACHE_DIR";
