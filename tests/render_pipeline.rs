use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hvmap::prelude::*;
use hvmap::rendering::context::RecordedCommand;

/// Serves a small fake image for every tile, optionally slowly or failing
#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

#[async_trait]
impl TileFetcher for FakeFetcher {
    async fn fetch(&self, tile: Tile, _url: &str) -> hvmap::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(MapError::HttpStatus { tile, status: 503 });
        }
        Ok(tile.to_string().into_bytes())
    }
}

struct Harness {
    renderer: MapRenderer<RecordingContext>,
    tiles: Canvas<RecordingContext>,
    overlay: Canvas<RecordingContext>,
    fetcher: Arc<FakeFetcher>,
    _dir: tempfile::TempDir,
}

fn harness(fetcher: FakeFetcher, graphics: Vec<NetworkGraphic>, mode: PipelineMode) -> Harness {
    let mut config = EngineConfig::for_testing().render;
    config.mode = mode;
    harness_with(fetcher, graphics, config)
}

fn test_loader(dir: &tempfile::TempDir, fetcher: Arc<FakeFetcher>) -> Arc<TileLoader> {
    Arc::new(TileLoader::new(
        Arc::new(ServerInfo::new("mock://tiles/{z}/{x}/{y}.png")),
        Arc::new(TileCache::new(dir.path(), 64)),
        fetcher,
    ))
}

fn harness_with(
    fetcher: FakeFetcher,
    graphics: Vec<NetworkGraphic>,
    config: RenderConfig,
) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(fetcher);
    let loader = test_loader(&dir, fetcher.clone());

    let tiles = Canvas::new(RecordingContext::new(256.0, 256.0));
    let overlay = Canvas::new(RecordingContext::new(256.0, 256.0));
    let network = SharedNetworkIndex::new(LayeredIndex::build(graphics).unwrap());
    let renderer =
        MapRenderer::new(config, loader, network, tiles.clone(), overlay.clone()).unwrap();

    Harness {
        renderer,
        tiles,
        overlay,
        fetcher,
        _dir: dir,
    }
}

/// A few graphics per draw order around (0, 0), in shuffled order
fn layered_network(orders: &[i32]) -> Vec<NetworkGraphic> {
    let mut graphics = Vec::new();
    for (i, &order) in orders.iter().enumerate() {
        let offset = i as f64;
        let position = Coordinate::new(offset, offset);
        graphics.push(
            SubstationGraphic::new(format!("S{}", order), Color::rgb(200, 0, 0), position)
                .with_draw_order(order)
                .into(),
        );
        graphics.push(
            BranchGraphic::new(
                vec![
                    Coordinate::new(-offset, 0.0),
                    Coordinate::new(1.0, 1.0 + offset),
                    Coordinate::new(2.0, -offset),
                ],
                LineGraphic::new(format!("L{}", order), order, Color::rgb(0, 0, 200)),
            )
            .unwrap()
            .into(),
        );
    }
    graphics
}

/// Commands recorded since the last clear
fn last_picture(canvas: &Canvas<RecordingContext>) -> Vec<RecordedCommand> {
    let ctx = canvas.lock();
    let commands = ctx.commands();
    let start = commands
        .iter()
        .rposition(|c| matches!(c.command, DrawCommand::Clear { .. }))
        .map(|i| i + 1)
        .unwrap_or(0);
    commands[start..].to_vec()
}

fn layer_trace(commands: &[RecordedCommand]) -> Vec<i32> {
    let mut trace = Vec::new();
    for layer in commands.iter().filter(|c| c.command.is_paint()).filter_map(|c| c.layer) {
        if trace.last() != Some(&layer) {
            trace.push(layer);
        }
    }
    trace
}

fn origin_view(zoom: u8) -> Viewport {
    Viewport::new(Coordinate::new(0.0, 0.0), zoom, 256.0, 256.0)
}

#[tokio::test]
async fn test_layers_paint_in_ascending_draw_order() {
    for mode in [PipelineMode::Chain, PipelineMode::Queue] {
        let mut h = harness(FakeFetcher::default(), layered_network(&[3, 1, 2]), mode);

        h.renderer.render(&origin_view(3)).await.unwrap();
        h.renderer.wait_for_idle().await;

        let picture = last_picture(&h.overlay);
        assert_eq!(layer_trace(&picture), vec![1, 2, 3], "{:?}", mode);
        assert_eq!(h.renderer.layer_states(), vec![TaskState::Done; 3]);
    }
}

#[tokio::test]
async fn test_first_layer_is_painted_before_render_returns() {
    let mut h = harness(
        FakeFetcher {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        },
        layered_network(&[5, 7]),
        PipelineMode::Chain,
    );

    h.renderer.render(&origin_view(4)).await.unwrap();

    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![5]);
    h.renderer.wait_for_idle().await;
    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![5, 7]);
}

#[tokio::test]
async fn test_visible_tiles_are_fetched_cached_and_painted() {
    let mut h = harness(FakeFetcher::default(), Vec::new(), PipelineMode::Chain);
    let view = origin_view(3);
    let expected = view.visible_tiles(h.renderer.server(), 0).len();
    assert!(expected > 0);

    h.renderer.render(&view).await.unwrap();
    h.renderer.wait_for_idle().await;

    assert_eq!(h.tiles.lock().images_drawn(), expected);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), expected);
    assert_eq!(h.renderer.loader().cache().stats().writes(), expected as u64);

    // Same view again: everything comes from the cache
    h.renderer.render(&view).await.unwrap();
    h.renderer.wait_for_idle().await;

    let images = last_picture(&h.tiles)
        .iter()
        .filter(|c| matches!(c.command, DrawCommand::Image { .. }))
        .count();
    assert_eq!(images, expected);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), expected);
}

#[tokio::test]
async fn test_failed_tiles_do_not_stop_the_pass() {
    let mut h = harness(
        FakeFetcher {
            fail: true,
            ..Default::default()
        },
        layered_network(&[0, 1]),
        PipelineMode::Queue,
    );
    let events = h.renderer.take_events().unwrap();

    let pass = h.renderer.render(&origin_view(2)).await.unwrap();
    h.renderer.wait_for_idle().await;

    assert_eq!(h.tiles.lock().images_drawn(), 0);
    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![0, 1]);

    let received: Vec<RenderEvent> = events.try_iter().collect();
    assert!(received
        .iter()
        .any(|e| matches!(e, RenderEvent::TileFailed { error, .. } if error.contains("503"))));
    assert!(received.contains(&RenderEvent::PassFinished {
        pass,
        cancelled: false
    }));
}

#[tokio::test]
async fn test_new_pass_cancels_the_previous_one() {
    let mut h = harness(
        FakeFetcher {
            delay: Some(Duration::from_millis(30)),
            ..Default::default()
        },
        layered_network(&[1, 2, 3]),
        PipelineMode::Chain,
    );
    let events = h.renderer.take_events().unwrap();

    let first = h.renderer.render(&origin_view(3)).await.unwrap();
    let second = h.renderer.render(&origin_view(4)).await.unwrap();
    h.renderer.wait_for_idle().await;

    let received: Vec<RenderEvent> = events.try_iter().collect();
    assert!(received.contains(&RenderEvent::PassFinished {
        pass: first,
        cancelled: true
    }));
    assert!(received.contains(&RenderEvent::PassFinished {
        pass: second,
        cancelled: false
    }));

    // Only the synchronous first layer of the cancelled pass was painted
    let first_layers: Vec<i32> = received
        .iter()
        .filter_map(|e| match e {
            RenderEvent::LayerPainted {
                pass,
                draw_order,
                ..
            } if *pass == first => Some(*draw_order),
            _ => None,
        })
        .collect();
    assert_eq!(first_layers, vec![1]);

    // The first pass's tile loads never got going
    let second_tiles = origin_view(4).visible_tiles(h.renderer.server(), 0).len();
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), second_tiles);
    assert_eq!(h.tiles.lock().images_drawn(), second_tiles);
    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_abandoned_downloads_still_fill_the_cache() {
    let mut h = harness(
        FakeFetcher {
            delay: Some(Duration::from_millis(60)),
            ..Default::default()
        },
        Vec::new(),
        PipelineMode::Chain,
    );
    let events = h.renderer.take_events().unwrap();

    let first = h.renderer.render(&origin_view(3)).await.unwrap();
    // Let the downloads start
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.renderer.render(&origin_view(4)).await.unwrap();
    h.renderer.wait_for_idle().await;

    let received: Vec<RenderEvent> = events.try_iter().collect();
    assert!(!received
        .iter()
        .any(|e| matches!(e, RenderEvent::TilePainted { pass, .. } if *pass == first)));

    let first_tiles = origin_view(3).visible_tiles(h.renderer.server(), 0).len();
    let second_tiles = origin_view(4).visible_tiles(h.renderer.server(), 0).len();
    assert_eq!(h.tiles.lock().images_drawn(), second_tiles);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        h.renderer.loader().cache().stats().writes(),
        (first_tiles + second_tiles) as u64
    );
}

#[tokio::test]
async fn test_swapped_network_is_used_by_the_next_pass() {
    let mut h = harness(FakeFetcher::default(), layered_network(&[1]), PipelineMode::Chain);

    h.renderer.render(&origin_view(3)).await.unwrap();
    h.renderer.wait_for_idle().await;
    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![1]);

    h.renderer.network().rebuild(layered_network(&[4, 6])).unwrap();
    h.renderer.render(&origin_view(3)).await.unwrap();
    h.renderer.wait_for_idle().await;
    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![4, 6]);
}

#[tokio::test]
async fn test_tiles_and_network_cannot_share_a_canvas() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher {
        delay: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let canvas = Canvas::new(RecordingContext::new(256.0, 256.0));
    let network = SharedNetworkIndex::new(LayeredIndex::build(layered_network(&[1])).unwrap());

    let result = MapRenderer::new(
        EngineConfig::for_testing().render,
        test_loader(&dir, fetcher),
        network,
        canvas.clone(),
        canvas,
    );
    assert!(matches!(result, Err(MapError::Config(_))));
}

#[tokio::test]
async fn test_late_tiles_never_land_on_the_network_canvas() {
    let mut h = harness(
        FakeFetcher {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        },
        layered_network(&[1]),
        PipelineMode::Chain,
    );

    h.renderer.render(&origin_view(3)).await.unwrap();
    h.renderer.wait_for_idle().await;

    let overlay = last_picture(&h.overlay);
    assert!(!overlay
        .iter()
        .any(|c| matches!(c.command, DrawCommand::Image { .. })));
    assert_eq!(layer_trace(&overlay), vec![1]);
    assert!(h.tiles.lock().images_drawn() > 0);
}

#[tokio::test]
async fn test_unread_events_stay_bounded() {
    let mut config = EngineConfig::for_testing().render;
    config.event_capacity = 8;
    let mut h = harness_with(FakeFetcher::default(), layered_network(&[1, 2]), config);

    for _ in 0..50 {
        h.renderer.render(&origin_view(3)).await.unwrap();
        h.renderer.wait_for_idle().await;
    }

    let events = h.renderer.take_events().unwrap();
    assert_eq!(events.len(), 8);
    assert!(h.renderer.take_events().is_none());

    // Nobody listening at all is fine too
    drop(events);
    let pass = h.renderer.render(&origin_view(3)).await.unwrap();
    h.renderer.wait_for_idle().await;
    assert_eq!(pass, 51);
    assert_eq!(layer_trace(&last_picture(&h.overlay)), vec![1, 2]);
}
