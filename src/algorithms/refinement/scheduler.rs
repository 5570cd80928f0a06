//! Commit scheduling: which candidate moves next, and when to stop

use super::{NodeKind, Refinement, RefinementQueue, SchedulingPolicy};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of one refinement run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementSummary {
    pub policy: SchedulingPolicy,
    /// Candidates committed
    pub commits: usize,
    /// Synchronous rounds run, zero for the queue-based policies
    pub rounds: usize,
    pub skipped: usize,
    pub stuck: usize,
    /// Unknown nodes left with an estimate
    pub nodes: usize,
    pub bad: usize,
    /// Mean error of the Unknown nodes
    pub mean_error: f64,
    /// Mean error of the Unknown nodes not flagged bad
    pub clean_mean_error: f64,
}

impl Refinement<'_> {
    /// Reset every node and run the scheduler until no candidate improves
    /// by more than the tolerance.
    pub fn run(&mut self, policy: SchedulingPolicy) -> RefinementSummary {
        self.reset();
        let (commits, rounds) = match policy {
            SchedulingPolicy::ClosestTrueMove | SchedulingPolicy::LargestGain => {
                (self.run_queue(policy), 0)
            }
            SchedulingPolicy::SynchronousRounds => self.run_rounds(),
        };
        let summary = self.summarize(policy, commits, rounds);
        info!(
            policy = policy.name(),
            commits,
            stuck = summary.stuck,
            mean_error = summary.mean_error,
            "refinement converged"
        );
        summary
    }

    /// Active nodes that received more messages than there are dimensions
    fn eligible(&self, node: usize) -> bool {
        self.states[node].is_active()
            && self.network.node(node).received_count() as usize > self.network.dims().count()
    }

    fn enqueue(&self, queue: &mut RefinementQueue, node: usize, policy: SchedulingPolicy) {
        let state = &self.states[node];
        let done = state.gain <= self.tolerance;
        let score = match policy {
            SchedulingPolicy::LargestGain => -state.gain,
            _ => state.candidate.error,
        };
        queue.push(node, done, score);
    }

    fn run_queue(&mut self, policy: SchedulingPolicy) -> usize {
        let network = self.network;
        let mut queue = RefinementQueue::new(network.len());
        for n in 0..network.len() {
            if self.eligible(n) {
                self.glob_triangulate(n);
                self.enqueue(&mut queue, n, policy);
            }
        }
        if queue.is_empty() {
            debug!("no eligible nodes to refine");
            return 0;
        }
        debug!(queued = queue.len(), policy = policy.name(), "refinement queue seeded");

        let mut commits = 0;
        while let Some(head) = queue.pop() {
            if self.states[head].gain <= self.tolerance {
                debug!(remaining = queue.len(), "head gain within tolerance");
                break;
            }
            self.commit(head);
            commits += 1;
            self.enqueue(&mut queue, head, policy);

            for edge in network.neighbors(head) {
                let m = edge.target;
                if self.states[m].is_active() {
                    self.glob_triangulate(m);
                    self.enqueue(&mut queue, m, policy);
                }
            }
        }
        commits
    }

    fn run_rounds(&mut self) -> (usize, usize) {
        let mut commits = 0;
        let mut rounds = 0;
        loop {
            rounds += 1;
            for n in 0..self.network.len() {
                if self.eligible(n) {
                    self.glob_triangulate(n);
                }
            }
            let mut committed = 0;
            for n in 0..self.network.len() {
                let state = &self.states[n];
                if state.kind == NodeKind::Unknown && state.gain > self.tolerance {
                    self.commit(n);
                    committed += 1;
                }
            }
            commits += committed;
            if committed == 0 {
                break;
            }
        }
        (commits, rounds)
    }

    fn summarize(&self, policy: SchedulingPolicy, commits: usize, rounds: usize) -> RefinementSummary {
        let mut summary = RefinementSummary {
            policy,
            commits,
            rounds,
            skipped: 0,
            stuck: 0,
            nodes: 0,
            bad: 0,
            mean_error: 0.0,
            clean_mean_error: 0.0,
        };
        let mut clean = 0;
        for state in &self.states {
            match state.kind {
                NodeKind::Anchor => {}
                NodeKind::Skip => summary.skipped += 1,
                NodeKind::Stuck => summary.stuck += 1,
                NodeKind::Unknown => {
                    summary.nodes += 1;
                    summary.mean_error += state.current.error;
                    if state.bad {
                        summary.bad += 1;
                    } else {
                        clean += 1;
                        summary.clean_mean_error += state.current.error;
                    }
                }
            }
        }
        if summary.nodes > 0 {
            summary.mean_error /= summary.nodes as f64;
        }
        if clean > 0 {
            summary.clean_mean_error /= clean as f64;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::square;
    use super::super::RefinementState;
    use super::*;
    use crate::algorithms::multilateration::Estimator;
    use crate::core::{Dimensions, Network, Point, LOW_CONFIDENCE};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_square_converges_to_centre() {
        for policy in [
            SchedulingPolicy::ClosestTrueMove,
            SchedulingPolicy::LargestGain,
            SchedulingPolicy::SynchronousRounds,
        ] {
            let (net, states) = square();
            let mut engine = Refinement::new(&net, states, Estimator::LeastSquares, true);
            let summary = engine.run(policy);
            assert_eq!(summary.commits, 1);
            assert_eq!(summary.nodes, 1);
            assert_eq!(summary.stuck, 0);
            let state = engine.state(4);
            assert_abs_diff_eq!(state.current.position.x, 5.0, epsilon = 0.01);
            assert_abs_diff_eq!(state.current.position.y, 5.0, epsilon = 0.01);
            assert!(summary.mean_error < 0.01);
        }
    }

    /// A grid of unknowns around four corner anchors, ranges exact
    fn grid() -> (Network, Vec<RefinementState>) {
        let mut net = Network::new(Dimensions::Two, 6.0, 12.0);
        let mut states = Vec::new();
        let mut id = 0;
        for i in 0..4 {
            for j in 0..4 {
                let anchor = matches!((i, j), (0, 0) | (0, 3) | (3, 0) | (3, 3));
                let p = Point::new(i as f64 * 4.0, j as f64 * 4.0, 0.0);
                net.add_node(id, anchor, p);
                id += 1;
                states.push(if anchor {
                    RefinementState::anchor(p)
                } else {
                    // deliberately poor start
                    RefinementState::unknown(p + Point::new(1.5, -1.0, 0.0), LOW_CONFIDENCE)
                });
            }
        }
        for a in 0..net.len() {
            for b in 0..net.len() {
                let d = net.true_distance(a, b);
                if a != b && d <= net.range() {
                    net.add_neighbor(a, b, d, d);
                    net.record_reception(a);
                }
            }
        }
        (net, states)
    }

    #[test]
    fn test_commits_never_increase_error() {
        let (net, states) = grid();
        let initial: Vec<f64> = (0..net.len())
            .map(|n| {
                net.dims()
                    .distance(&states[n].init_position, &net.node(n).true_position)
            })
            .collect();
        let mut engine = Refinement::new(&net, states, Estimator::LeastSquares, true);
        let summary = engine.run(SchedulingPolicy::ClosestTrueMove);
        assert_eq!(summary.nodes + summary.stuck, 12);
        for (n, state) in engine.states().iter().enumerate() {
            if state.kind == NodeKind::Unknown {
                assert!(state.current.error <= initial[n] + 1e-12);
            }
        }
    }

    #[test]
    fn test_empty_active_set_exits_immediately() {
        let mut net = Network::new(Dimensions::Two, 10.0, 10.0);
        net.add_node(0, true, Point::zeros());
        let states = vec![RefinementState::anchor(Point::zeros())];
        let mut engine = Refinement::new(&net, states, Estimator::LeastSquares, true);
        let summary = engine.run(SchedulingPolicy::ClosestTrueMove);
        assert_eq!(summary.commits, 0);
        assert_eq!(summary.nodes, 0);
        assert_eq!(summary.mean_error, 0.0);
    }

    #[test]
    fn test_all_stuck_exits_immediately() {
        let (net, mut states) = square();
        for anchor in states.iter_mut().take(4) {
            anchor.kind = NodeKind::Skip;
        }
        let mut engine = Refinement::new(&net, states, Estimator::LeastSquares, true);
        let summary = engine.run(SchedulingPolicy::SynchronousRounds);
        assert_eq!(summary.commits, 0);
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.stuck, 1);
        assert_eq!(summary.skipped, 4);
    }
}
