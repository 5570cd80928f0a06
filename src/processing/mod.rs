//! Scenario input: parsing and synthetic generation

pub mod generator;
pub mod parser;

pub use generator::DeploymentGenerator;
pub use parser::{ParseError, ScenarioParser};
