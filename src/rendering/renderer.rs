use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::{EngineConfig, PipelineMode, RenderConfig};
use crate::core::geo::Tile;
use crate::core::viewport::Viewport;
use crate::rendering::context::{Canvas, DrawContext};
use crate::rendering::painter::{NetworkPainter, PaintStyle};
use crate::rendering::pipeline::{RenderChain, RenderQueue, RenderTask, TaskState};
use crate::spatial::layers::SharedNetworkIndex;
use crate::tiles::cache::TileCache;
use crate::tiles::fetch::ThrottledFetcher;
use crate::tiles::loader::TileLoader;
use crate::tiles::source::ServerInfo;
use crate::{MapError, Result};

/// Progress of render passes, for the presentation layer to repaint on.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    PassStarted {
        pass: u64,
        tiles: usize,
        layers: usize,
    },
    TilePainted {
        pass: u64,
        tile: Tile,
    },
    TileFailed {
        pass: u64,
        tile: Tile,
        error: String,
    },
    LayerPainted {
        pass: u64,
        draw_order: i32,
        graphics: usize,
    },
    PassFinished {
        pass: u64,
        cancelled: bool,
    },
}

#[derive(Debug, Clone)]
enum NetworkPipeline {
    Chain(RenderChain),
    Queue(RenderQueue),
}

impl NetworkPipeline {
    fn start(mode: PipelineMode, tasks: Vec<RenderTask>, token: CancellationToken) -> Self {
        match mode {
            PipelineMode::Chain => {
                NetworkPipeline::Chain(RenderChain::start_with_token(tasks, token))
            }
            PipelineMode::Queue => {
                NetworkPipeline::Queue(RenderQueue::start_with_token(tasks, token))
            }
        }
    }

    fn cancel(&self) {
        match self {
            NetworkPipeline::Chain(chain) => chain.cancel(),
            NetworkPipeline::Queue(queue) => queue.cancel(),
        }
    }

    fn states(&self) -> Vec<TaskState> {
        match self {
            NetworkPipeline::Chain(chain) => chain.states(),
            NetworkPipeline::Queue(queue) => queue.states(),
        }
    }

    async fn wait_for_completion(&self) {
        match self {
            NetworkPipeline::Chain(chain) => chain.wait_for_completion().await,
            NetworkPipeline::Queue(queue) => queue.wait_for_completion().await,
        }
    }
}

struct RenderPass {
    id: u64,
    token: CancellationToken,
    pipeline: NetworkPipeline,
    tiles: Vec<JoinHandle<()>>,
    finished: bool,
}

/// Drives render passes for a map view.
///
/// Base tiles go to the tile canvas, network layers to the network canvas
/// stacked above it. The two must be distinct surfaces: tiles arrive in any
/// order while network layers are painting. Every call to
/// [`render`](Self::render) starts a new pass and cancels the previous one; a
/// cancelled pass never paints again, although its tile downloads still
/// complete and fill the cache.
///
/// Progress is published on a bounded channel. Events that do not fit are
/// dropped, so a consumer that stops reading never makes the renderer grow.
pub struct MapRenderer<C> {
    config: RenderConfig,
    loader: Arc<TileLoader>,
    network: SharedNetworkIndex,
    tile_canvas: Canvas<C>,
    network_canvas: Canvas<C>,
    current: Option<RenderPass>,
    next_pass: u64,
    events: Sender<RenderEvent>,
    receiver: Option<Receiver<RenderEvent>>,
}

impl<C: DrawContext + 'static> MapRenderer<C> {
    pub fn new(
        config: RenderConfig,
        loader: Arc<TileLoader>,
        network: SharedNetworkIndex,
        tile_canvas: Canvas<C>,
        network_canvas: Canvas<C>,
    ) -> Result<Self> {
        if tile_canvas.same_as(&network_canvas) {
            return Err(MapError::Config("tiles and network need separate canvases".to_string()));
        }
        if config.event_capacity == 0 {
            return Err(MapError::Config("event_capacity must be at least 1".to_string()));
        }

        let (events, receiver) = crossbeam_channel::bounded(config.event_capacity);
        Ok(Self {
            config,
            loader,
            network,
            tile_canvas,
            network_canvas,
            current: None,
            next_pass: 1,
            events,
            receiver: Some(receiver),
        })
    }

    /// Wires cache, throttled HTTP fetcher and loader from configuration
    pub fn from_config(
        config: &EngineConfig,
        network: SharedNetworkIndex,
        tile_canvas: Canvas<C>,
        network_canvas: Canvas<C>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = TileCache::from_config(&config.cache)?;
        log::info!("tile cache at {}", cache.root().display());
        let fetcher = ThrottledFetcher::http(&config.fetch)?;
        let loader = TileLoader::new(
            Arc::new(config.server.clone()),
            Arc::new(cache),
            Arc::new(fetcher),
        );
        Self::new(
            config.render.clone(),
            Arc::new(loader),
            network,
            tile_canvas,
            network_canvas,
        )
    }

    pub fn with_style(mut self, style: PaintStyle) -> Self {
        self.config.style = style;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn server(&self) -> &ServerInfo {
        self.loader.server()
    }

    pub fn loader(&self) -> &Arc<TileLoader> {
        &self.loader
    }

    pub fn network(&self) -> &SharedNetworkIndex {
        &self.network
    }

    pub fn tile_canvas(&self) -> &Canvas<C> {
        &self.tile_canvas
    }

    pub fn network_canvas(&self) -> &Canvas<C> {
        &self.network_canvas
    }

    /// Hands out the receiver of pass progress events, once.
    ///
    /// Until it is taken, at most `event_capacity` events are retained.
    pub fn take_events(&mut self) -> Option<Receiver<RenderEvent>> {
        self.receiver.take()
    }

    /// Task states of the current pass's network pipeline
    pub fn layer_states(&self) -> Vec<TaskState> {
        self.current
            .as_ref()
            .map(|pass| pass.pipeline.states())
            .unwrap_or_default()
    }

    /// Starts a new pass for `viewport` and returns its id.
    ///
    /// The previous pass is cancelled and its running layer drained before
    /// the canvases are cleared. The lowest network layer is painted before
    /// this returns; tiles and the other layers follow in the background.
    pub async fn render(&mut self, viewport: &Viewport) -> Result<u64> {
        self.cancel();
        self.wait_for_idle().await;

        let id = self.next_pass;
        self.next_pass += 1;
        let token = CancellationToken::new();
        let viewport = viewport.clamped(self.loader.server());
        let transform = viewport.transform(self.loader.server());

        self.tile_canvas
            .with(|ctx| ctx.clear_rect(0.0, 0.0, viewport.width, viewport.height))?;
        self.network_canvas
            .with(|ctx| ctx.clear_rect(0.0, 0.0, viewport.width, viewport.height))?;

        let visible = transform.visible_tiles(self.config.keep_buffer);
        let tiles: Vec<JoinHandle<()>> = visible
            .iter()
            .map(|&tile| {
                let (x, y) = transform.tile_position(&tile);
                self.spawn_tile(id, tile, x, y, token.clone())
            })
            .collect();

        let index = self.network.snapshot();
        let view_bounds = transform.bounds();
        let painter = NetworkPainter::new(transform, self.config.style);
        let tasks: Vec<RenderTask> = index
            .draw_orders()
            .map(|draw_order| {
                let index = index.clone();
                let canvas = self.network_canvas.clone();
                let events = self.events.clone();
                RenderTask::new(format!("pass {} layer {}", id, draw_order), move || {
                    let graphics = canvas.with(|ctx| {
                        let graphics = index.query_layer(draw_order, &view_bounds);
                        painter.paint_layer(ctx, draw_order, graphics)
                    })?;
                    publish(&events, RenderEvent::LayerPainted {
                        pass: id,
                        draw_order,
                        graphics,
                    });
                    Ok(())
                })
            })
            .collect();

        log::debug!(
            "pass {}: zoom {}, {} tiles, {} network layers",
            id,
            viewport.zoom,
            tiles.len(),
            tasks.len()
        );
        publish(&self.events, RenderEvent::PassStarted {
            pass: id,
            tiles: tiles.len(),
            layers: tasks.len(),
        });

        let pipeline = NetworkPipeline::start(self.config.mode, tasks, token.clone());
        self.current = Some(RenderPass {
            id,
            token,
            pipeline,
            tiles,
            finished: false,
        });
        Ok(id)
    }

    fn spawn_tile(
        &self,
        pass: u64,
        tile: Tile,
        x: f64,
        y: f64,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let loader = self.loader.clone();
        let canvas = self.tile_canvas.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            match loader.load_cancellable(tile, &token).await {
                Ok(Some(image)) => {
                    // Checked under the canvas lock so a newer pass's clear
                    // can never be followed by a stale tile
                    let painted = canvas.with(|ctx| {
                        if token.is_cancelled() {
                            return Ok(false);
                        }
                        ctx.draw_image(image.bytes(), x, y).map(|_| true)
                    });
                    match painted {
                        Ok(true) => {
                            publish(&events, RenderEvent::TilePainted { pass, tile });
                        }
                        Ok(false) => {}
                        Err(e) => log::warn!("painting tile {} failed: {}", tile, e),
                    }
                }
                Ok(None) => log::debug!("tile {} abandoned by pass {}", tile, pass),
                Err(e) => {
                    publish(&events, RenderEvent::TileFailed {
                        pass,
                        tile,
                        error: e.to_string(),
                    });
                }
            }
        })
    }

    /// Cancels the current pass, if any. Nothing it has not started yet will
    /// paint.
    pub fn cancel(&self) {
        if let Some(pass) = &self.current {
            if pass.finished || pass.token.is_cancelled() {
                return;
            }
            log::debug!("cancelling pass {}", pass.id);
            pass.token.cancel();
            pass.pipeline.cancel();
        }
    }

    /// Waits for the current pass to finish, or to drain after a cancel,
    /// then reports it with [`RenderEvent::PassFinished`].
    pub async fn wait_for_idle(&mut self) {
        let Some(pass) = self.current.as_mut() else {
            return;
        };
        if pass.finished {
            return;
        }

        pass.pipeline.wait_for_completion().await;
        for handle in pass.tiles.drain(..) {
            if let Err(e) = handle.await {
                log::error!("tile task of pass {} failed: {}", pass.id, e);
            }
        }
        pass.finished = true;

        let cancelled = pass.token.is_cancelled();
        log::debug!("pass {} finished (cancelled: {})", pass.id, cancelled);
        publish(&self.events, RenderEvent::PassFinished {
            pass: pass.id,
            cancelled,
        });
    }
}

/// Sends without blocking; a full or abandoned channel drops the event
fn publish(events: &Sender<RenderEvent>, event: RenderEvent) {
    if let Err(TrySendError::Full(event)) = events.try_send(event) {
        log::trace!("event queue full, dropping {:?}", event);
    }
}
