pub mod network;

pub use network::{
    BranchGraphic, Color, LineData, LineGraphic, NetworkData, NetworkGraphic, SegmentGraphic,
    SubstationGraphic,
};
