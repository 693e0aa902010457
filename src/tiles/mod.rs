pub mod cache;
pub mod fetch;
pub mod loader;
pub mod source;

// Re-exports for convenience
pub use cache::{CacheStats, TileCache, TileImage};
pub use fetch::{HttpTileFetcher, ThrottledFetcher, TileFetcher};
pub use loader::TileLoader;
pub use source::{ServerInfo, TileSource};
