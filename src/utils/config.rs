use crate::algorithms::multilateration::Estimator;
use crate::algorithms::refinement::SchedulingPolicy;
use crate::algorithms::terrain::TerrainRanging;
use crate::core::{Dimensions, LOW_CONFIDENCE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Parameters of one localization session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Weight multilateration samples by neighbor confidence
    pub use_confidences: bool,
    /// Derive initial positions from anchor hop counts
    pub terrain: bool,
    /// Hop-count to distance conversion used by terrain
    pub terrain_ranging: TerrainRanging,
    /// Commit order of the refinement scheduler
    pub policy: SchedulingPolicy,
    /// Position estimator used during refinement
    pub estimator: Estimator,
    /// Confidence of an unknown node before refinement, in (0, 1]
    pub low_confidence: f64,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            use_confidences: true,
            terrain: true,
            terrain_ranging: TerrainRanging::RadioRange,
            policy: SchedulingPolicy::ClosestTrueMove,
            estimator: Estimator::LeastSquares,
            low_confidence: LOW_CONFIDENCE,
        }
    }
}

/// Parameters of a synthetic deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub num_nodes: usize,
    /// Share of nodes that are anchors, in [0, 1]
    pub anchor_fraction: f64,
    pub dimensions: Dimensions,
    /// Side of the deployment area
    pub bound: f64,
    /// Maximum radio range
    pub range: f64,
    /// Range noise standard deviation as a fraction of the true distance
    pub range_variance: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            num_nodes: 225,
            anchor_fraction: 0.05,
            dimensions: Dimensions::Two,
            bound: 100.0,
            range: 10.0,
            range_variance: 0.05,
            seed: 1,
        }
    }
}

impl DeploymentConfig {
    /// Anchor count: the configured share of the nodes, but never fewer than
    /// `dims + 1`
    pub fn num_anchors(&self) -> usize {
        let share = (self.num_nodes as f64 * self.anchor_fraction).floor() as usize;
        share.max(self.dimensions.count() + 1)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("failed to access config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A configuration stored as a JSON file
pub trait JsonConfig: Serialize + DeserializeOwned + Sized {
    /// Reject parameter combinations the engine cannot run with
    fn validate(&self) -> Result<(), ConfigError>;

    /// Load and validate a configuration from a JSON file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl JsonConfig for LocalizationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.low_confidence > 0.0 && self.low_confidence <= 1.0) {
            return Err(ConfigError::invalid(
                "low_confidence",
                format!("{} is outside (0, 1]", self.low_confidence),
            ));
        }
        Ok(())
    }
}

impl JsonConfig for DeploymentConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.range > 0.0 && self.range.is_finite()) {
            return Err(ConfigError::invalid("range", "must be positive"));
        }
        if !(self.bound > 0.0 && self.bound.is_finite()) {
            return Err(ConfigError::invalid("bound", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.anchor_fraction) {
            return Err(ConfigError::invalid(
                "anchor_fraction",
                format!("{} is outside [0, 1]", self.anchor_fraction),
            ));
        }
        if !(self.range_variance >= 0.0 && self.range_variance.is_finite()) {
            return Err(ConfigError::invalid("range_variance", "must be non-negative"));
        }
        if self.num_nodes < self.num_anchors() {
            return Err(ConfigError::invalid(
                "num_nodes",
                format!(
                    "{} nodes cannot hold {} anchors",
                    self.num_nodes,
                    self.num_anchors()
                ),
            ));
        }
        Ok(())
    }
}
