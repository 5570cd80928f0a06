//! Session report: per-node status and aggregate statistics

use crate::algorithms::refinement::{NodeKind, RefinementSummary};
use crate::api::session::SessionOutcome;
use crate::core::{Network, Point};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;

/// Streaming mean and standard deviation (Welford)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation, zero for fewer than two values
    pub fn stddev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

impl Serialize for RunningStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RunningStats", 3)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("mean", &self.mean())?;
        state.serialize_field("stddev", &self.stddev())?;
        state.end()
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        for value in iter {
            stats.push(value);
        }
        stats
    }
}

impl fmt::Display for RunningStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} +/- {:.3}", self.mean(), self.stddev())
    }
}

/// Final status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Anchor,
    /// Excluded or stuck, no usable estimate
    Unknown,
    Positioned,
    Bad,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Anchor => "ANCHOR",
            NodeStatus::Unknown => "UNKNOWN",
            NodeStatus::Positioned => "POSITIONED",
            NodeStatus::Bad => "BAD",
        };
        f.write_str(name)
    }
}

/// Per-node line of the report
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub id: u32,
    pub status: NodeStatus,
    pub position: Vec<f64>,
    pub true_position: Vec<f64>,
    /// Error as a percentage of the radio range
    pub error_pct: f64,
    pub confidence: f64,
    pub flops: u64,
    pub broadcasts: u64,
}

/// Count of nodes per final status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub anchors: usize,
    pub positioned: usize,
    pub unknown: usize,
    pub bad: usize,
}

/// Human-readable and JSON session report
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub dimensions: usize,
    pub range: f64,
    pub nodes: Vec<NodeReport>,
    pub counts: StatusCounts,
    /// Error of positioned nodes, % of range
    pub position_error: RunningStats,
    /// Error of bad nodes, % of range
    pub bad_error: RunningStats,
    /// Confidence of positioned nodes
    pub confidence: RunningStats,
    /// Per-node flop counters as supplied with the network. The engine does
    /// not count its own work, so these stay zero for parsed or generated
    /// scenarios.
    pub flops: RunningStats,
    pub broadcasts: RunningStats,
    pub unique_broadcasts: RunningStats,
    pub refinement: RefinementSummary,
}

impl SessionReport {
    pub fn new(network: &Network, outcome: &SessionOutcome) -> Self {
        let dims = network.dims();
        let range = network.range();
        let coords = |p: &Point| -> Vec<f64> { p.iter().take(dims.count()).copied().collect() };

        let mut counts = StatusCounts::default();
        let mut position_error = RunningStats::new();
        let mut bad_error = RunningStats::new();
        let mut confidence = RunningStats::new();
        let mut nodes = Vec::with_capacity(network.len());

        for (node, state) in network.nodes().iter().zip(&outcome.states) {
            let status = match state.kind {
                NodeKind::Anchor => NodeStatus::Anchor,
                NodeKind::Unknown if state.bad => NodeStatus::Bad,
                NodeKind::Unknown => NodeStatus::Positioned,
                NodeKind::Stuck | NodeKind::Skip => NodeStatus::Unknown,
            };
            let error_pct = 100.0 * state.current.error / range;
            match status {
                NodeStatus::Anchor => counts.anchors += 1,
                NodeStatus::Positioned => {
                    counts.positioned += 1;
                    position_error.push(error_pct);
                    confidence.push(state.current.confidence);
                }
                NodeStatus::Bad => {
                    counts.bad += 1;
                    bad_error.push(error_pct);
                }
                NodeStatus::Unknown => counts.unknown += 1,
            }
            nodes.push(NodeReport {
                id: node.id,
                status,
                position: coords(&state.current.position),
                true_position: coords(&node.true_position),
                error_pct,
                confidence: state.current.confidence,
                flops: node.counters.flops,
                broadcasts: node.counters.broadcasts,
            });
        }

        let counters = network.nodes().iter().map(|node| node.counters);
        Self {
            dimensions: dims.count(),
            range,
            nodes,
            counts,
            position_error,
            bad_error,
            confidence,
            flops: counters.clone().map(|c| c.flops as f64).collect(),
            broadcasts: counters.clone().map(|c| c.broadcasts as f64).collect(),
            unique_broadcasts: counters.map(|c| c.unique_broadcasts as f64).collect(),
            refinement: outcome.summary.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn format_coords(coords: &[f64]) -> String {
    let parts: Vec<String> = coords.iter().map(|c| format!("{c:.2}")).collect();
    format!("<{}>", parts.join(","))
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{:>5} {:<10}", node.id, node.status.to_string())?;
            if node.status == NodeStatus::Anchor {
                writeln!(f, " {}", format_coords(&node.position))?;
            } else {
                writeln!(
                    f,
                    " {} true {} err {:.0}% conf {:.2}",
                    format_coords(&node.position),
                    format_coords(&node.true_position),
                    node.error_pct,
                    node.confidence
                )?;
            }
        }
        writeln!(
            f,
            "anchors {}, positioned {}, unknown {}, bad {}",
            self.counts.anchors, self.counts.positioned, self.counts.unknown, self.counts.bad
        )?;
        writeln!(f, "position error (% range): {}", self.position_error)?;
        writeln!(f, "bad error (% range): {}", self.bad_error)?;
        writeln!(f, "confidence: {}", self.confidence)?;
        writeln!(f, "flops (input counters): {}", self.flops)?;
        writeln!(f, "broadcasts: {} (unique {})", self.broadcasts, self.unique_broadcasts)?;
        let r = &self.refinement;
        write!(
            f,
            "refinement ({}): {} commits, skip {}, stuck {}, nodes {}, bad {}, err {:.3}, clean err {:.3}",
            r.policy.name(),
            r.commits,
            r.skipped,
            r.stuck,
            r.nodes,
            r.bad,
            r.mean_error,
            r.clean_mean_error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::session::Localizer;
    use crate::core::Dimensions;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_running_stats() {
        let stats: RunningStats = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().collect();
        assert_eq!(stats.count(), 8);
        assert_abs_diff_eq!(stats.mean(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.stddev(), 2.0, epsilon = 1e-12);
        assert_eq!(RunningStats::new().stddev(), 0.0);
    }

    #[test]
    fn test_report_for_square() {
        let mut net = Network::new(Dimensions::Two, 10.0, 10.0);
        for (i, (x, y)) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .into_iter()
            .enumerate()
        {
            net.add_node(i as u32, true, Point::new(x, y, 0.0));
        }
        let u = net.add_node(4, false, Point::new(5.0, 5.0, 0.0));
        for a in 0..4 {
            let d = net.true_distance(a, u);
            net.add_neighbor(u, a, d, d);
            net.record_reception(u);
            net.add_neighbor(a, u, d, d);
            net.counters_mut(a).broadcasts = 2;
        }

        let outcome = Localizer::new().localize(&net).unwrap();
        let report = SessionReport::new(&net, &outcome);
        assert_eq!(report.counts.anchors, 4);
        assert_eq!(report.counts.positioned, 1);
        assert_eq!(report.nodes[4].status, NodeStatus::Positioned);
        assert_eq!(report.nodes[4].position.len(), 2);
        assert!(report.position_error.mean() < 0.1);
        assert_abs_diff_eq!(report.broadcasts.mean(), 8.0 / 5.0, epsilon = 1e-12);

        let text = report.to_string();
        assert!(text.contains("POSITIONED"));
        assert!(text.contains("closest true move"));
        assert!(text.contains("flops (input counters): 0.000 +/- 0.000"));
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["nodes"][4]["status"], "POSITIONED");
        assert_eq!(json["counts"]["anchors"], 4);
        assert!(json["position_error"]["stddev"].is_number());
    }
}
