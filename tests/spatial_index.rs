use hvmap::prelude::*;

/// Small deterministic generator so the data sets are reproducible
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn coordinate(&mut self) -> Coordinate {
        Coordinate::new(self.range(-10.0, 10.0), self.range(40.0, 55.0))
    }
}

fn random_network(rng: &mut Lcg, substations: usize, lines: usize) -> Vec<NetworkGraphic> {
    let mut graphics = Vec::new();
    for i in 0..substations {
        graphics.push(
            SubstationGraphic::new(format!("S{}", i), Color::BLACK, rng.coordinate())
                .with_draw_order((i % 3) as i32)
                .into(),
        );
    }
    for i in 0..lines {
        let start = rng.coordinate();
        let pylons: Vec<Coordinate> = (0..1 + i % 6)
            .map(|_| {
                Coordinate::new(
                    start.lon + rng.range(-0.8, 0.8),
                    start.lat + rng.range(-0.8, 0.8),
                )
            })
            .collect();
        let line = LineGraphic::new(format!("L{}", i), (i % 4) as i32, Color::WHITE);
        graphics.push(BranchGraphic::new(pylons, line).unwrap().into());
    }
    graphics
}

fn sorted_ids<'a>(graphics: impl Iterator<Item = &'a NetworkGraphic>) -> Vec<String> {
    let mut ids: Vec<String> = graphics.map(|g| g.id().to_string()).collect();
    ids.sort();
    ids
}

#[test]
fn test_query_has_no_false_negatives() {
    let mut rng = Lcg(42);
    let graphics = random_network(&mut rng, 2_000, 1_500);
    let index = LayeredIndex::build(graphics.clone()).unwrap();
    assert_eq!(index.len(), 3_500);
    assert_eq!(index.draw_orders().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    for _ in 0..50 {
        let lon = rng.range(-12.0, 12.0);
        let lat = rng.range(38.0, 57.0);
        let (width, height) = (rng.range(0.0, 3.0), rng.range(0.0, 2.0));
        let view = Bounds::from_coords(lon, lat, lon + width, lat + height);

        for order in index.draw_orders() {
            let expected = sorted_ids(
                graphics
                    .iter()
                    .filter(|g| g.draw_order() == order && g.bounds().intersects(&view)),
            );
            let found = sorted_ids(index.query_layer(order, &view));
            assert_eq!(found, expected, "layer {} view {:?}", order, view);
        }
    }
}

#[test]
fn test_query_outside_the_data_is_empty() {
    let mut rng = Lcg(7);
    let index = LayeredIndex::build(random_network(&mut rng, 200, 200)).unwrap();
    let antipodes = Bounds::from_coords(170.0, -50.0, 175.0, -45.0);
    assert!(index.query(&antipodes).iter().all(|(_, hits)| hits.is_empty()));
}

#[test]
fn test_whole_world_query_returns_everything() {
    let mut rng = Lcg(99);
    let graphics = random_network(&mut rng, 300, 100);
    let index = LayeredIndex::build(graphics).unwrap();

    let world = Bounds::from_coords(-180.0, -85.0, 180.0, 85.0);
    let total: usize = index.query(&world).iter().map(|(_, hits)| hits.len()).sum();
    assert_eq!(total, 400);
}

#[test]
fn test_one_bad_graphic_rejects_the_whole_build() {
    let mut rng = Lcg(3);
    let mut graphics = random_network(&mut rng, 10, 10);
    graphics.push(
        SubstationGraphic::new("off-globe", Color::BLACK, Coordinate::new(0.0, 120.0)).into(),
    );

    match LayeredIndex::build(graphics) {
        Err(MapError::InvalidGeometry(message)) => assert!(message.contains("off-globe")),
        other => panic!("expected an invalid geometry error, got {:?}", other.map(|i| i.len())),
    }
}

#[test]
fn test_network_json_without_pylons_never_reaches_the_index() {
    let json = r##"{
        "substations": [{ "id": "S1", "color": "#ff0000", "position": { "lon": 2.0, "lat": 48.0 } }],
        "lines": [{ "id": "EMPTY", "draw_order": 1, "color": "#00ff00", "pylons": [] }]
    }"##;

    let err = NetworkData::from_json_str(json).unwrap().into_graphics().unwrap_err();
    assert!(matches!(err, MapError::InvalidGeometry(_)));
}
