use crate::core::Network;
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

/// Structural problems of a network snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkIssue {
    #[error("node {id}: neighbor index {target} out of range")]
    DanglingEdge { id: u32, target: usize },

    #[error("node {id} lists itself as a neighbor")]
    SelfLoop { id: u32 },

    #[error("node {id}: invalid range {range} to neighbor index {target}")]
    InvalidRange { id: u32, target: usize, range: f64 },

    #[error("node {id}: non-finite position")]
    NonFinitePosition { id: u32 },

    #[error("duplicate node ID {id}")]
    DuplicateId { id: u32 },

    #[error("only {available} anchors, at least {required} needed")]
    InsufficientAnchors { available: usize, required: usize },
}

/// Outcome of validating a network snapshot
#[derive(Debug, Clone, Default)]
pub struct NetworkValidation {
    /// Problems that make the snapshot unusable
    pub errors: Vec<NetworkIssue>,
    /// Problems that only degrade the result
    pub warnings: Vec<NetworkIssue>,
}

impl NetworkValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check edge targets, ranges, positions and IDs of a snapshot
pub fn validate_network(network: &Network) -> NetworkValidation {
    let mut result = NetworkValidation::default();
    let mut ids = HashSet::with_capacity(network.len());

    for (n, node) in network.nodes().iter().enumerate() {
        if !ids.insert(node.id) {
            result.errors.push(NetworkIssue::DuplicateId { id: node.id });
        }
        if !node.true_position.iter().all(|c| c.is_finite()) {
            result.errors.push(NetworkIssue::NonFinitePosition { id: node.id });
        }
        for edge in node.neighbors() {
            if edge.target >= network.len() {
                result.errors.push(NetworkIssue::DanglingEdge {
                    id: node.id,
                    target: edge.target,
                });
            } else if edge.target == n {
                result.errors.push(NetworkIssue::SelfLoop { id: node.id });
            }
            if !(edge.estimated_distance.is_finite() && edge.estimated_distance >= 0.0) {
                result.errors.push(NetworkIssue::InvalidRange {
                    id: node.id,
                    target: edge.target,
                    range: edge.estimated_distance,
                });
            }
        }
    }

    let required = network.dims().count() + 1;
    let available = network.anchor_count();
    if available < required {
        result
            .warnings
            .push(NetworkIssue::InsufficientAnchors { available, required });
    }

    for issue in &result.warnings {
        warn!(%issue, "network validation");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dimensions, Point};

    fn three_anchors() -> Network {
        let mut net = Network::new(Dimensions::Two, 10.0, 10.0);
        net.add_node(1, true, Point::new(0.0, 0.0, 0.0));
        net.add_node(2, true, Point::new(5.0, 0.0, 0.0));
        net.add_node(3, true, Point::new(0.0, 5.0, 0.0));
        net
    }

    #[test]
    fn test_clean_network() {
        let mut net = three_anchors();
        net.add_neighbor(0, 1, 5.0, 5.0);
        let result = validate_network(&net);
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_structural_errors() {
        let mut net = three_anchors();
        net.add_node(2, false, Point::new(1.0, 1.0, 0.0));
        net.add_neighbor(0, 0, 0.0, 0.0);
        net.add_neighbor(1, 9, 1.0, 1.0);
        net.add_neighbor(2, 1, 5.0, -1.0);

        let result = validate_network(&net);
        assert!(!result.is_valid());
        assert!(result.errors.contains(&NetworkIssue::DuplicateId { id: 2 }));
        assert!(result.errors.contains(&NetworkIssue::SelfLoop { id: 1 }));
        assert!(result
            .errors
            .contains(&NetworkIssue::DanglingEdge { id: 2, target: 9 }));
        assert_eq!(result.errors.len(), 4);
    }

    #[test]
    fn test_too_few_anchors_is_a_warning() {
        let mut net = Network::new(Dimensions::Three, 10.0, 10.0);
        net.add_node(1, true, Point::zeros());
        let result = validate_network(&net);
        assert!(result.is_valid());
        assert_eq!(
            result.warnings,
            vec![NetworkIssue::InsufficientAnchors {
                available: 1,
                required: 4
            }]
        );
    }
}
