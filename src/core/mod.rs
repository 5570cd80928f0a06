//! Core types and constants for the localization engine

pub mod types;
pub mod constants;
pub mod network;

pub use types::*;
pub use constants::*;
pub use network::{Network, Node, NeighborEdge, NodeCounters};
