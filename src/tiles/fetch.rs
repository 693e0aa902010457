use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::core::config::FetchConfig;
use crate::core::geo::Tile;
use crate::{MapError, Result};

/// Retrieves the raw bytes of one tile from wherever tiles come from.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, tile: Tile, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<F: TileFetcher + ?Sized> TileFetcher for Arc<F> {
    async fn fetch(&self, tile: Tile, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(tile, url).await
    }
}

/// Plain HTTP tile download.
///
/// Every request carries the configured User-Agent and a bounded timeout.
/// Failures are returned as-is; there is no retry.
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, tile: Tile, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(MapError::HttpStatus {
                tile,
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Caps the number of in-flight requests of the wrapped fetcher.
///
/// Requests beyond the limit wait for a permit in arrival order instead of
/// being rejected, which keeps fast panning from flooding the tile server.
pub struct ThrottledFetcher<F> {
    inner: F,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl<F: TileFetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl ThrottledFetcher<HttpTileFetcher> {
    /// The production fetcher: HTTP behind the configured throttle
    pub fn http(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(HttpTileFetcher::new(config)?, config.max_concurrent))
    }
}

#[async_trait]
impl<F: TileFetcher> TileFetcher for ThrottledFetcher<F> {
    async fn fetch(&self, tile: Tile, url: &str) -> Result<Vec<u8>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MapError::Fetch("fetch throttle closed".into()))?;

        log::debug!("fetching tile {} from {}", tile, url);
        self.inner.fetch(tile, url).await
    }
}
