use hvmap::{
    data::network::NetworkData, Canvas, Coordinate, EngineConfig, LayeredIndex, MapRenderer,
    RecordingContext, RenderEvent, SharedNetworkIndex, Viewport,
};

const NETWORK: &str = r##"{
    "substations": [
        { "id": "VLERY", "color": "#ff0000", "position": { "lon": 2.3522, "lat": 48.8566 }, "draw_order": 3 },
        { "id": "CERGY", "color": "#ff0000", "position": { "lon": 2.0761, "lat": 49.0364 }, "draw_order": 3 },
        { "id": "MELUN", "color": "#22aa22", "position": { "lon": 2.6554, "lat": 48.5421 }, "draw_order": 2 }
    ],
    "lines": [
        { "id": "VLERY-CERGY-400", "draw_order": 1, "color": "#ff0000",
          "pylons": [{ "lon": 2.3522, "lat": 48.8566 }, { "lon": 2.2100, "lat": 48.9500 }, { "lon": 2.0761, "lat": 49.0364 }] },
        { "id": "VLERY-MELUN-225", "draw_order": 0, "color": "#22aa22",
          "pylons": [{ "lon": 2.3522, "lat": 48.8566 }, { "lon": 2.5000, "lat": 48.7000 }, { "lon": 2.6554, "lat": 48.5421 }] }
    ]
}"##;

/// Example of driving the engine without any UI: tiles and network are
/// painted into a recording canvas and the result is printed.
#[tokio::main]
async fn main() -> hvmap::Result<()> {
    hvmap::init_logger();

    println!("🗺️ hvmap Headless Example");
    println!("==========================");

    let graphics = NetworkData::from_json_str(NETWORK)?.into_graphics()?;
    let network = SharedNetworkIndex::new(LayeredIndex::build(graphics)?);
    println!(
        "✅ Network indexed: {} graphics in {} layers",
        network.snapshot().len(),
        network.snapshot().layer_count()
    );

    let mut config = EngineConfig::default();
    config.cache.root = Some(std::env::temp_dir().join("hvmap-headless-tiles"));
    config.render.keep_buffer = 0;

    let tiles = Canvas::new(RecordingContext::new(800.0, 600.0));
    let overlay = Canvas::new(RecordingContext::new(800.0, 600.0));
    let mut renderer =
        MapRenderer::from_config(&config, network, tiles.clone(), overlay.clone())?;
    let events = renderer
        .take_events()
        .ok_or_else(|| hvmap::MapError::Render("event receiver already taken".into()))?;

    let views = [
        ("Paris", Coordinate::new(2.3522, 48.8566), 9),
        ("Ile-de-France", Coordinate::new(2.35, 48.8), 7),
    ];

    for (name, center, zoom) in views {
        let viewport = Viewport::new(center, zoom, 800.0, 600.0);
        let pass = renderer.render(&viewport).await?;
        renderer.wait_for_idle().await;

        println!("\n🎯 Pass {} - {} at zoom {}", pass, name, zoom);
        println!("   Layers: {:?}", renderer.layer_states());
        println!("   Tiles painted: {}", tiles.lock().images_drawn());
        println!("   Network layer trace: {:?}", overlay.lock().layer_trace());
    }

    println!("\n📨 Events:");
    for event in events.try_iter() {
        match event {
            RenderEvent::TileFailed { tile, error, .. } => {
                println!("   ⚠️ tile {}: {}", tile, error)
            }
            other => println!("   {:?}", other),
        }
    }

    let stats = renderer.loader().cache().stats();
    println!(
        "\n💾 Cache: {} memory hits, {} disk hits, {} misses, {} writes",
        stats.memory_hits(),
        stats.disk_hits(),
        stats.misses(),
        stats.writes()
    );

    Ok(())
}
