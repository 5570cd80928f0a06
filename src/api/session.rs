//! Localization sessions: topology analysis followed by refinement

use crate::algorithms::classification::classify_undetermined;
use crate::algorithms::flood::HopTable;
use crate::algorithms::pruning::{find_bad_nodes, prune_loose_nodes};
use crate::algorithms::refinement::{
    NodeKind, Refinement, RefinementState, RefinementSummary,
};
use crate::algorithms::terrain::{initialize_positions, TerrainOutcome};
use crate::core::{Network, ZERO_CONFIDENCE};
use crate::utils::config::{JsonConfig, LocalizationConfig};
use crate::validation::{validate_network, LocalizationError};
use tracing::{debug, info};

/// Everything learned about the topology before refinement starts
#[derive(Debug, Clone)]
pub struct TopologyAnalysis {
    /// Nodes pruned for lack of neighbors
    pub loose: Vec<bool>,
    /// Nodes without enough independent anchor paths
    pub undetermined: Vec<bool>,
    pub twins: Vec<Option<usize>>,
    /// Undetermined, twin or dependent on such nodes
    pub bad: Vec<bool>,
    pub hops: HopTable,
    pub terrain: Option<TerrainOutcome>,
    /// Initial refinement states
    pub states: Vec<RefinementState>,
}

impl TopologyAnalysis {
    pub fn loose_count(&self) -> usize {
        self.loose.iter().filter(|flag| **flag).count()
    }

    pub fn undetermined_count(&self) -> usize {
        self.undetermined.iter().filter(|flag| **flag).count()
    }

    /// Unknown nodes flagged bad
    pub fn bad_count(&self) -> usize {
        self.states.iter().filter(|state| state.bad).count()
    }
}

/// Result of a full localization session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub analysis: TopologyAnalysis,
    /// Final refinement states, `current.position` is the estimate
    pub states: Vec<RefinementState>,
    pub summary: RefinementSummary,
}

/// Central localization engine run over a collected network snapshot
#[derive(Debug, Clone, Default)]
pub struct Localizer {
    config: LocalizationConfig,
}

impl Localizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LocalizationConfig) -> Result<Self, LocalizationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LocalizationConfig {
        &self.config
    }

    /// Prune, flood, classify and initialise the network
    pub fn analyze_topology(&self, network: &Network) -> TopologyAnalysis {
        let n = network.len();

        let mut loose = vec![false; n];
        let pruned = prune_loose_nodes(network, &mut loose);

        let mut states: Vec<RefinementState> = network
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| {
                if node.anchor {
                    RefinementState::anchor(node.true_position)
                } else if loose[i] {
                    RefinementState::skipped(node.init_position)
                } else {
                    RefinementState::unknown(node.init_position, self.config.low_confidence)
                }
            })
            .collect();

        let hops = HopTable::flood(network);
        let undetermined = classify_undetermined(network, &hops);

        let terrain = self.config.terrain.then(|| {
            initialize_positions(network, &hops, &mut states, self.config.terrain_ranging)
        });

        let mut bad = undetermined.clone();
        let mut twins = vec![None; n];
        find_bad_nodes(network, &mut bad, &mut twins);

        for (i, state) in states.iter_mut().enumerate() {
            state.twin = twins[i];
            if state.kind == NodeKind::Unknown && bad[i] {
                state.bad = true;
                state.base_confidence = ZERO_CONFIDENCE;
                debug!(node = network.node(i).id, "bad node");
            }
        }

        let analysis = TopologyAnalysis {
            loose,
            undetermined,
            twins,
            bad,
            hops,
            terrain,
            states,
        };
        info!(
            nodes = n,
            anchors = network.anchor_count(),
            pruned,
            undetermined = analysis.undetermined_count(),
            bad = analysis.bad_count(),
            "topology analysis"
        );
        analysis
    }

    /// Validate the snapshot, analyse it and run refinement.
    ///
    /// Only structural defects of the snapshot are errors; nodes that cannot
    /// be located end up Skip or Stuck.
    pub fn localize(&self, network: &Network) -> Result<SessionOutcome, LocalizationError> {
        let validation = validate_network(network);
        if !validation.is_valid() {
            return Err(LocalizationError::InvalidNetwork(validation.errors));
        }

        let analysis = self.analyze_topology(network);
        let mut refinement = Refinement::new(
            network,
            analysis.states.clone(),
            self.config.estimator,
            self.config.use_confidences,
        );
        let summary = refinement.run(self.config.policy);

        Ok(SessionOutcome {
            analysis,
            states: refinement.into_states(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dimensions, Point};

    fn link(net: &mut Network, a: usize, b: usize) {
        let d = net.true_distance(a, b);
        net.add_neighbor(a, b, d, d);
        net.record_reception(a);
        net.add_neighbor(b, a, d, d);
        net.record_reception(b);
    }

    fn square_with_tail() -> Network {
        let mut net = Network::new(Dimensions::Two, 10.0, 10.0);
        for (i, (x, y)) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .into_iter()
            .enumerate()
        {
            net.add_node(i as u32, true, Point::new(x, y, 0.0));
        }
        let centre = net.add_node(4, false, Point::new(5.0, 5.0, 0.0));
        for a in 0..4 {
            link(&mut net, a, centre);
        }
        // hears only the centre
        let tail = net.add_node(5, false, Point::new(6.0, 6.0, 0.0));
        link(&mut net, centre, tail);
        net
    }

    #[test]
    fn test_analysis_flags() {
        let net = square_with_tail();
        let analysis = Localizer::new().analyze_topology(&net);
        assert_eq!(analysis.loose_count(), 1);
        assert!(analysis.loose[5]);
        assert_eq!(analysis.states[5].kind, NodeKind::Skip);
        assert_eq!(analysis.states[4].kind, NodeKind::Unknown);
        assert!(!analysis.undetermined[4]);
        assert!(analysis.undetermined[5]);
        assert!(!analysis.states[4].bad);
        assert_eq!(analysis.states[0].kind, NodeKind::Anchor);
        assert_eq!(analysis.terrain.map(|t| t.located), Some(2));
    }

    #[test]
    fn test_localize_square() {
        let net = square_with_tail();
        let outcome = Localizer::new().localize(&net).unwrap();
        let centre = &outcome.states[4];
        assert_eq!(centre.kind, NodeKind::Unknown);
        assert!((centre.current.position - Point::new(5.0, 5.0, 0.0)).norm() < 0.01);
        assert_eq!(outcome.summary.skipped, 1);
        assert_eq!(outcome.summary.nodes, 1);
    }

    #[test]
    fn test_invalid_network_is_rejected() {
        let mut net = square_with_tail();
        net.add_neighbor(0, 0, 0.0, 0.0);
        let err = Localizer::new().localize(&net).unwrap_err();
        assert!(matches!(err, LocalizationError::InvalidNetwork(ref issues) if issues.len() == 1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = LocalizationConfig {
            low_confidence: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            Localizer::with_config(config),
            Err(LocalizationError::Config(_))
        ));
    }
}
