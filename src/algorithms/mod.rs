//! Localization algorithms over a network snapshot

pub mod classification;
pub mod flood;
pub mod multilateration;
pub mod pruning;
pub mod refinement;
pub mod terrain;

pub use classification::classify_undetermined;
pub use flood::HopTable;
pub use multilateration::{
    hop_triangulate, savvides_min_max, triangulate, Estimator, Fix, HopFix, MultilaterationError,
    Sample,
};
pub use pruning::{collapse_twins, find_bad_nodes, prune_loose_nodes};
pub use refinement::{
    NodeKind, Refinement, RefinementState, RefinementSummary, SchedulingPolicy,
};
pub use terrain::{initialize_positions, TerrainOutcome, TerrainRanging};
