use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::core::config::TileCacheConfig;
use crate::core::constants::DEFAULT_MEMORY_CACHE_TILES;
use crate::core::geo::Tile;
use crate::Result;

/// Raw (still encoded) image bytes of one tile, cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage(Arc<[u8]>);

impl TileImage {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for TileImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for TileImage {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

/// Counters describing how lookups were served.
#[derive(Debug, Default)]
pub struct CacheStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStats {
    pub fn memory_hits(&self) -> u64 {
        self.memory_hits.load(Ordering::Relaxed)
    }

    pub fn disk_hits(&self) -> u64 {
        self.disk_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Two-level tile cache: an in-memory LRU in front of a directory tree laid
/// out as `<root>/<zoom>/<x>/<y>`, one raw image file per tile.
///
/// The presence of a file is the hit signal; there is no manifest. The root
/// directory is created lazily on the first write.
#[derive(Debug)]
pub struct TileCache {
    root: PathBuf,
    memory: Mutex<LruCache<Tile, TileImage>>,
    stats: CacheStats,
    next_temp: AtomicU64,
}

impl TileCache {
    /// Create a new tile cache rooted at `root` with the given memory capacity
    pub fn new(root: impl Into<PathBuf>, memory_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(memory_capacity)
            .or(NonZeroUsize::new(DEFAULT_MEMORY_CACHE_TILES))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            memory: Mutex::new(LruCache::new(capacity)),
            stats: CacheStats::default(),
            next_temp: AtomicU64::new(0),
        }
    }

    /// Create a cache from configuration, resolving the default root
    pub fn from_config(config: &TileCacheConfig) -> Result<Self> {
        Ok(Self::new(config.resolve_root()?, config.memory_capacity))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// File backing `tile`
    pub fn path_for(&self, tile: Tile) -> PathBuf {
        self.root
            .join(tile.zoom.to_string())
            .join(tile.x.to_string())
            .join(tile.y.to_string())
    }

    /// Unique in-progress file next to the one backing `tile`
    fn temp_path_for(&self, tile: Tile) -> PathBuf {
        let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.path_for(tile)
            .with_file_name(format!("{}.{}-{}.tmp", tile.y, std::process::id(), n))
    }

    /// Looks a tile up: `Some` on a hit, `None` on a miss.
    ///
    /// Read errors other than a missing file are logged and reported as a
    /// miss so the caller falls back to fetching.
    pub async fn lookup(&self, tile: Tile) -> Option<TileImage> {
        if let Some(image) = self.memory_get(tile) {
            self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some(image);
        }

        let path = self.path_for(tile);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                self.stats.disk_hits.fetch_add(1, Ordering::Relaxed);
                let image = TileImage::from(bytes);
                self.memory_put(tile, image.clone());
                Some(image)
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("tile cache read {} failed: {}", path.display(), e);
                }
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Like [`lookup`](Self::lookup), but resolves to `None` as soon as
    /// `token` is cancelled.
    pub async fn lookup_cancellable(
        &self,
        tile: Tile,
        token: &CancellationToken,
    ) -> Option<TileImage> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            image = self.lookup(tile) => image,
        }
    }

    /// Writes a tile to disk and to the memory tier.
    ///
    /// The bytes go to a temporary sibling first and are renamed into place,
    /// so a tile file is either absent or complete.
    pub async fn store(&self, tile: Tile, image: &TileImage) -> Result<()> {
        let path = self.path_for(tile);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path_for(tile);
        let written = match tokio::fs::write(&temp, image.bytes()).await {
            Ok(()) => tokio::fs::rename(&temp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("removing {} failed: {}", temp.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        self.memory_put(tile, image.clone());
        log::debug!("cached tile {} ({} bytes)", tile, image.len());
        Ok(())
    }

    /// Check if a tile is in the memory tier
    pub fn contains_in_memory(&self, tile: &Tile) -> bool {
        self.memory
            .lock()
            .map(|cache| cache.contains(tile))
            .unwrap_or(false)
    }

    /// Get a tile from the memory tier without touching the disk
    pub fn memory_get(&self, tile: Tile) -> Option<TileImage> {
        self.memory.lock().ok()?.get(&tile).cloned()
    }

    fn memory_put(&self, tile: Tile, image: TileImage) {
        if let Ok(mut cache) = self.memory.lock() {
            cache.put(tile, image);
        }
    }

    /// Get the current number of tiles held in memory
    pub fn memory_len(&self) -> usize {
        self.memory.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Drop the memory tier; files on disk are kept
    pub fn clear_memory(&self) {
        if let Ok(mut cache) = self.memory.lock() {
            cache.clear();
        }
    }
}
