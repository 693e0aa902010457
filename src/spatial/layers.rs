use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::core::bounds::Bounds;
use crate::data::network::NetworkGraphic;
use crate::spatial::index::{SpatialIndex, SpatialItem};
use crate::Result;

/// One spatial index per draw order, iterated lowest first.
#[derive(Debug, Default)]
pub struct LayeredIndex {
    layers: BTreeMap<i32, SpatialIndex<NetworkGraphic>>,
}

impl LayeredIndex {
    /// Validates every graphic, then buckets them by draw order and bulk-loads
    /// one tree per bucket.
    ///
    /// Invalid geometry (a branch without pylons, a coordinate outside the
    /// globe) fails the whole build; nothing is indexed.
    pub fn build(graphics: impl IntoIterator<Item = NetworkGraphic>) -> Result<Self> {
        let mut buckets: BTreeMap<i32, Vec<SpatialItem<NetworkGraphic>>> = BTreeMap::new();
        for graphic in graphics {
            graphic.validate()?;
            buckets
                .entry(graphic.draw_order())
                .or_default()
                .push(SpatialItem::new(graphic.bounds(), graphic));
        }

        let layers: BTreeMap<_, _> = buckets
            .into_iter()
            .map(|(order, items)| (order, SpatialIndex::build(items)))
            .collect();

        log::debug!(
            "built {} network layers holding {} graphics",
            layers.len(),
            layers.values().map(SpatialIndex::len).sum::<usize>()
        );
        Ok(Self { layers })
    }

    /// Draw orders present, ascending
    pub fn draw_orders(&self) -> impl Iterator<Item = i32> + '_ {
        self.layers.keys().copied()
    }

    /// Layers in painting order
    pub fn layers(&self) -> impl Iterator<Item = (i32, &SpatialIndex<NetworkGraphic>)> {
        self.layers.iter().map(|(order, index)| (*order, index))
    }

    pub fn layer(&self, draw_order: i32) -> Option<&SpatialIndex<NetworkGraphic>> {
        self.layers.get(&draw_order)
    }

    /// Graphics of one layer whose box touches `bounds`
    pub fn query_layer<'a>(
        &'a self,
        draw_order: i32,
        bounds: &Bounds,
    ) -> impl Iterator<Item = &'a NetworkGraphic> + 'a {
        let bounds = *bounds;
        self.layers
            .get(&draw_order)
            .into_iter()
            .flat_map(move |index| index.query(&bounds).map(|item| &item.data))
    }

    /// Candidates of every layer, grouped by layer in painting order
    pub fn query(&self, bounds: &Bounds) -> Vec<(i32, Vec<&NetworkGraphic>)> {
        self.layers
            .iter()
            .map(|(order, index)| (*order, index.query(bounds).map(|item| &item.data).collect()))
            .collect()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn len(&self) -> usize {
        self.layers.values().map(SpatialIndex::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The current network index, replaced wholesale when the data changes.
///
/// Readers take a [`snapshot`](Self::snapshot) and keep querying it while a
/// replacement is built; the swap itself only holds the lock for a pointer
/// store.
#[derive(Debug, Clone, Default)]
pub struct SharedNetworkIndex {
    current: Arc<RwLock<Arc<LayeredIndex>>>,
}

impl SharedNetworkIndex {
    pub fn new(index: LayeredIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    pub fn snapshot(&self) -> Arc<LayeredIndex> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Installs an already built index
    pub fn replace(&self, index: LayeredIndex) {
        let index = Arc::new(index);
        match self.current.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
    }

    /// Builds a new index from `graphics` and swaps it in. On invalid input
    /// the previous index stays in place.
    pub fn rebuild(&self, graphics: impl IntoIterator<Item = NetworkGraphic>) -> Result<()> {
        let index = LayeredIndex::build(graphics)?;
        log::info!(
            "network index rebuilt: {} graphics in {} layers",
            index.len(),
            index.layer_count()
        );
        self.replace(index);
        Ok(())
    }
}
