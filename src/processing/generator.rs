//! Synthetic deployments standing in for the neighbor-discovery layer
//!
//! Places nodes uniformly in the bounding box, picks anchors at random and
//! records a noisy range measurement for every ordered pair within radio
//! range.

use crate::core::Network;
use crate::utils::config::{ConfigError, DeploymentConfig, JsonConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::collections::HashSet;
use tracing::info;

/// Seeded deployment generator
pub struct DeploymentGenerator {
    config: DeploymentConfig,
    rng: StdRng,
}

impl DeploymentGenerator {
    pub fn new(config: DeploymentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Build one network snapshot. Successive calls draw new deployments
    /// from the same seeded stream.
    pub fn generate(&mut self) -> Result<Network, ConfigError> {
        let dims = self.config.dimensions;
        let range = self.config.range;
        let num_nodes = self.config.num_nodes;
        let num_anchors = self.config.num_anchors();

        let anchors: HashSet<usize> =
            rand::seq::index::sample(&mut self.rng, num_nodes, num_anchors)
                .into_iter()
                .collect();

        let mut network = Network::new(dims, range, self.config.bound);
        for n in 0..num_nodes {
            let coords: Vec<f64> = (0..dims.count())
                .map(|_| self.rng.gen_range(0.0..=self.config.bound))
                .collect();
            network.add_node(n as u32, anchors.contains(&n), dims.point(&coords));
        }

        let mut edges = 0;
        for node in 0..num_nodes {
            for source in 0..num_nodes {
                if node == source {
                    continue;
                }
                let distance = network.true_distance(node, source);
                if distance > range {
                    continue;
                }
                let measured = self.measure(distance)?;
                if network.add_neighbor(node, source, distance, measured) {
                    network.record_reception(node);
                    network.counters_mut(source).broadcasts += 1;
                    edges += 1;
                }
            }
        }
        for n in 0..num_nodes {
            let counters = network.counters_mut(n);
            counters.unique_broadcasts = u64::from(counters.broadcasts > 0);
        }

        info!(
            nodes = num_nodes,
            anchors = num_anchors,
            edges,
            "generated deployment"
        );
        Ok(network)
    }

    /// Noisy range measurement, `Normal(d, d * variance)` clamped at zero
    fn measure(&mut self, distance: f64) -> Result<f64, ConfigError> {
        let noise = Normal::new(distance, distance * self.config.range_variance).map_err(|e| {
            ConfigError::InvalidParameter {
                name: "range_variance".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(noise.sample(&mut self.rng).max(0.0))
    }
}
