pub mod index;
pub mod layers;

pub use index::{BranchingParams, SpatialIndex, SpatialItem};
pub use layers::{LayeredIndex, SharedNetworkIndex};
