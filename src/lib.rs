//! Multi-hop sensor network localization
//!
//! Central engine run over a snapshot of neighbor-discovery data: anchors
//! know their position, every other node is located by hop-count terrain
//! initialisation followed by iterative multilateration refinement.
//! Topology analysis flags the nodes ranging data cannot pin down.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{Dimensions, Network, Point};
pub use algorithms::{Estimator, SchedulingPolicy, TerrainRanging};
pub use processing::{DeploymentGenerator, ScenarioParser};
pub use validation::LocalizationError;
pub use utils::{DeploymentConfig, JsonConfig, LocalizationConfig};
pub use api::{Localizer, SessionOutcome, SessionReport};
