use futures::future::{BoxFuture, FutureExt, Shared};
use fxhash::FxHashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::cache::{TileCache, TileImage};
use super::fetch::TileFetcher;
use super::source::{ServerInfo, TileSource};
use crate::core::geo::Tile;
use crate::{MapError, Result};

/// Error text is shared between every waiter on the same download.
type SharedFetch = Shared<BoxFuture<'static, std::result::Result<TileImage, String>>>;

/// Serves tiles from the cache, downloading and caching the ones it lacks.
///
/// A miss is fetched exactly once no matter how many callers ask for the
/// tile meanwhile; the bytes are written to the cache before any caller
/// gets them. Downloads run as their own tasks, so a caller giving up (or a
/// cancelled render pass) never interrupts the I/O.
pub struct TileLoader {
    server: Arc<ServerInfo>,
    cache: Arc<TileCache>,
    fetcher: Arc<dyn TileFetcher>,
    /// Currently downloading tiles to prevent duplicates
    in_flight: Arc<Mutex<FxHashMap<Tile, SharedFetch>>>,
}

impl TileLoader {
    pub fn new(
        server: Arc<ServerInfo>,
        cache: Arc<TileCache>,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Self {
        Self {
            server,
            cache,
            fetcher,
            in_flight: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    pub fn server(&self) -> &Arc<ServerInfo> {
        &self.server
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Get the number of downloads currently running
    pub fn pending_count(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Cache-then-fetch: returns the cached image or downloads, stores and
    /// returns it.
    pub async fn load(&self, tile: Tile) -> Result<TileImage> {
        if let Some(image) = self.cache.lookup(tile).await {
            return Ok(image);
        }
        self.download(tile).await
    }

    /// Same as [`load`](Self::load) but gives up waiting once `token` is
    /// cancelled, yielding `Ok(None)`. A download already started keeps
    /// running and still populates the cache.
    pub async fn load_cancellable(
        &self,
        tile: Tile,
        token: &CancellationToken,
    ) -> Result<Option<TileImage>> {
        let cached = self.cache.lookup_cancellable(tile, token).await;
        if token.is_cancelled() {
            return Ok(None);
        }
        if let Some(image) = cached {
            return Ok(Some(image));
        }

        let download = self.download(tile);
        tokio::select! {
            biased;
            _ = token.cancelled() => Ok(None),
            result = download => result.map(Some),
        }
    }

    fn download(&self, tile: Tile) -> impl Future<Output = Result<TileImage>> + Send + 'static {
        self.shared_download(tile)
            .map(|outcome| outcome.map_err(MapError::Fetch))
    }

    fn shared_download(&self, tile: Tile) -> SharedFetch {
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = in_flight.get(&tile) {
            log::debug!("joining in-flight download of tile {}", tile);
            return existing.clone();
        }

        let url = self.server.url(tile);
        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let registry = self.in_flight.clone();

        // The registry lock is still held here, so the task's removal below
        // always happens after the insert at the end of this function.
        let handle = tokio::spawn(async move {
            let outcome = match fetcher.fetch(tile, &url).await {
                Ok(bytes) => {
                    let image = TileImage::from(bytes);
                    if let Err(e) = cache.store(tile, &image).await {
                        log::warn!("failed to cache tile {}: {}", tile, e);
                    }
                    log::debug!("downloaded tile {} ({} bytes)", tile, image.len());
                    Ok(image)
                }
                Err(e) => {
                    log::warn!("tile {} download failed: {}", tile, e);
                    Err(e.to_string())
                }
            };

            if let Ok(mut map) = registry.lock() {
                map.remove(&tile);
            }
            outcome
        });

        let shared = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(e.to_string()),
            }
        }
        .boxed()
        .shared();

        in_flight.insert(tile, shared.clone());
        shared
    }
}
