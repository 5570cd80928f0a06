//! Configuration and logging utilities

pub mod config;
pub mod logging;

pub use config::{ConfigError, DeploymentConfig, JsonConfig, LocalizationConfig};
pub use logging::init_logging;
