//! Iterative refinement of the initial position estimates
//!
//! Every node carries a committed estimate (`current`) and a proposal
//! (`candidate`) computed from its neighbors' committed estimates. The
//! scheduler in [`scheduler`] decides which proposals get committed and in
//! which order.

pub mod queue;
pub mod scheduler;

pub use queue::{RefinementQueue, SchedulingPolicy};
pub use scheduler::RefinementSummary;

use crate::algorithms::multilateration::{Estimator, MultilaterationError, Sample};
use crate::core::{Network, Point, ANCHOR_CONFIDENCE, CONVERGENCE_DIVISOR, ZERO_CONFIDENCE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Role of a node during refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Anchor,
    /// Eligible and actively refined
    Unknown,
    /// Last triangulation attempt failed or landed out of range
    Stuck,
    /// Excluded: too few reliable neighbors
    Skip,
}

/// A position estimate together with its distance to the true position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub position: Point,
    /// Distance to ground truth, for analysis and oracle scheduling only
    pub error: f64,
    pub confidence: f64,
}

/// Refinement bookkeeping of one node
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementState {
    pub kind: NodeKind,
    /// Starting point of every run
    pub init_position: Point,
    /// Confidence assigned to the initial position
    pub base_confidence: f64,
    pub current: Estimate,
    pub candidate: Estimate,
    /// `current.error - candidate.error`, negative when the proposal is worse
    pub gain: f64,
    /// Indistinguishable sibling, if any
    pub twin: Option<usize>,
    /// Unreliable after twin and dependency analysis
    pub bad: bool,
    /// Number of `glob_triangulate` calls made on this node
    pub attempts: u32,
}

impl RefinementState {
    pub fn anchor(position: Point) -> Self {
        Self::with_kind(NodeKind::Anchor, position, ANCHOR_CONFIDENCE)
    }

    pub fn unknown(init_position: Point, confidence: f64) -> Self {
        Self::with_kind(NodeKind::Unknown, init_position, confidence)
    }

    pub fn skipped(init_position: Point) -> Self {
        Self::with_kind(NodeKind::Skip, init_position, ZERO_CONFIDENCE)
    }

    fn with_kind(kind: NodeKind, init_position: Point, base_confidence: f64) -> Self {
        let estimate = Estimate {
            position: init_position,
            error: 0.0,
            confidence: base_confidence,
        };
        Self {
            kind,
            init_position,
            base_confidence,
            current: estimate,
            candidate: estimate,
            gain: 0.0,
            twin: None,
            bad: false,
            attempts: 0,
        }
    }

    /// Unknown or Stuck: a node the scheduler may move
    pub fn is_active(&self) -> bool {
        matches!(self.kind, NodeKind::Unknown | NodeKind::Stuck)
    }
}

/// Refinement engine over one network snapshot
pub struct Refinement<'a> {
    network: &'a Network,
    states: Vec<RefinementState>,
    estimator: Estimator,
    use_confidences: bool,
    tolerance: f64,
}

impl<'a> Refinement<'a> {
    /// Wrap per-node states; `states` must have one entry per network node
    pub fn new(
        network: &'a Network,
        states: Vec<RefinementState>,
        estimator: Estimator,
        use_confidences: bool,
    ) -> Self {
        debug_assert_eq!(network.len(), states.len());
        Self {
            network,
            states,
            estimator,
            use_confidences,
            tolerance: network.range() / CONVERGENCE_DIVISOR,
        }
    }

    pub fn states(&self) -> &[RefinementState] {
        &self.states
    }

    pub fn state(&self, node: usize) -> &RefinementState {
        &self.states[node]
    }

    pub fn into_states(self) -> Vec<RefinementState> {
        self.states
    }

    /// Convergence threshold τ: gains at or below it count as no gain
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Restore every node to its initial estimate; Stuck nodes become Unknown
    pub fn reset(&mut self) {
        let dims = self.network.dims();
        for (n, state) in self.states.iter_mut().enumerate() {
            if state.kind == NodeKind::Stuck {
                state.kind = NodeKind::Unknown;
            }
            state.current = Estimate {
                position: state.init_position,
                error: dims.distance(&self.network.node(n).true_position, &state.init_position),
                confidence: state.base_confidence,
            };
            state.candidate = state.current;
            state.gain = 0.0;
        }
    }

    /// Recompute the candidate of `node` from its neighbors' committed
    /// estimates.
    ///
    /// Neighbors that are Skip or carry no confidence are ignored. A failed
    /// or out-of-range estimate leaves the node Stuck with no movement and
    /// no gain.
    pub fn glob_triangulate(&mut self, node: usize) {
        let dims = self.network.dims();
        let samples: Vec<Sample> = self
            .network
            .neighbors(node)
            .iter()
            .filter_map(|edge| {
                let neighbor = &self.states[edge.target];
                (neighbor.kind != NodeKind::Skip && neighbor.current.confidence > ZERO_CONFIDENCE)
                    .then(|| {
                        Sample::new(neighbor.current.position, edge.estimated_distance)
                            .with_confidence(neighbor.current.confidence)
                    })
            })
            .collect();

        let result = if samples.len() <= dims.count() {
            Err(MultilaterationError::Underdetermined {
                samples: samples.len(),
                required: dims.count() + 1,
            })
        } else {
            self.estimator.estimate(dims, &samples, self.use_confidences)
        };
        let truth = self.network.node(node).true_position;
        let range = self.network.range();
        let state = &mut self.states[node];
        state.attempts += 1;

        match result {
            Ok(fix) if fix.residual <= range => {
                state.kind = NodeKind::Unknown;
                let confidence =
                    samples.iter().map(|s| s.confidence).sum::<f64>() / samples.len() as f64;
                state.candidate = Estimate {
                    position: fix.position,
                    error: dims.distance(&fix.position, &truth),
                    confidence,
                };
                state.gain = state.current.error - state.candidate.error;
            }
            outcome => {
                match outcome {
                    Ok(fix) => debug!(
                        node = self.network.node(node).id,
                        residual = fix.residual,
                        "stuck: residual exceeds range"
                    ),
                    Err(err) => debug!(node = self.network.node(node).id, %err, "stuck"),
                }
                state.kind = NodeKind::Stuck;
                state.candidate = state.current;
                state.candidate.confidence = ZERO_CONFIDENCE;
                state.gain = 0.0;
            }
        }
    }

    /// Commit the candidate of `node` as its current estimate
    pub fn commit(&mut self, node: usize) {
        let state = &mut self.states[node];
        state.current = state.candidate;
        state.gain = 0.0;
    }
}
