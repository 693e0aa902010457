use crate::core::bounds::Bounds;

use rstar::{RStarInsertionStrategy, RTree, RTreeObject, RTreeParams, AABB};

/// A value stored in the index together with its bounding rectangle
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialItem<T> {
    pub bounds: Bounds,
    pub data: T,
}

impl<T> SpatialItem<T> {
    pub fn new(bounds: Bounds, data: T) -> Self {
        Self { bounds, data }
    }
}

// --- rstar integration -------------------------------------------------------------------------

impl<T> RTreeObject for SpatialItem<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds.envelope()
    }
}

/// Node layout used for network layers: at most 6 children per node.
#[derive(Debug, Clone, Copy)]
pub struct BranchingParams;

impl RTreeParams for BranchingParams {
    const MIN_SIZE: usize = 3;
    const MAX_SIZE: usize = crate::core::constants::RTREE_BRANCHING_FACTOR;
    const REINSERTION_COUNT: usize = 2;
    type DefaultInsertionStrategy = RStarInsertionStrategy;
}

/// Read-only R-tree over bounding rectangles.
///
/// Built once from a batch with a bulk load and never mutated afterwards, so
/// it can be shared between threads and queried without locking. A data
/// change means building a new index.
pub struct SpatialIndex<T, P = BranchingParams>
where
    P: RTreeParams,
{
    rtree: RTree<SpatialItem<T>, P>,
    bounds: Option<Bounds>,
}

impl<T, P: RTreeParams> SpatialIndex<T, P> {
    /// Bulk-loads every item
    pub fn build(items: Vec<SpatialItem<T>>) -> Self {
        let bounds = items.iter().fold(None, |acc: Option<Bounds>, item| {
            Some(match acc {
                Some(mut b) => {
                    b.extend_bounds(&item.bounds);
                    b
                }
                None => item.bounds,
            })
        });

        Self {
            rtree: RTree::bulk_load_with_params(items),
            bounds,
        }
    }

    /// Builds from values, deriving each rectangle with `bounds_of`
    pub fn build_with(
        values: impl IntoIterator<Item = T>,
        bounds_of: impl Fn(&T) -> Bounds,
    ) -> Self {
        let items = values
            .into_iter()
            .map(|value| SpatialItem::new(bounds_of(&value), value))
            .collect();
        Self::build(items)
    }

    /// Every item whose rectangle intersects `bounds` (edges touching count).
    ///
    /// Only rectangles are compared, so a long diagonal line is returned for
    /// any viewport crossing its box even if the line itself misses it.
    pub fn query<'a>(&'a self, bounds: &Bounds) -> impl Iterator<Item = &'a SpatialItem<T>> + 'a {
        self.rtree.locate_in_envelope_intersecting(&bounds.envelope())
    }

    pub fn query_vec(&self, bounds: &Bounds) -> Vec<&SpatialItem<T>> {
        self.query(bounds).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpatialItem<T>> {
        self.rtree.iter()
    }

    /// Union of all rectangles, `None` when empty
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }
}

impl<T, P: RTreeParams> Default for SpatialIndex<T, P> {
    fn default() -> Self {
        Self::build(Vec::new())
    }
}

impl<T, P: RTreeParams> std::fmt::Debug for SpatialIndex<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.len())
            .field("bounds", &self.bounds)
            .finish()
    }
}
