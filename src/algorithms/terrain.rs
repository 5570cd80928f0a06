//! Terrain: initial position estimates from anchor hop counts
//!
//! Each node multilaterates against its closest anchors (in hops), turning
//! hop counts into distances either with the radio range or with a scale
//! fitted by [`hop_triangulate`].

use crate::algorithms::flood::HopTable;
use crate::algorithms::multilateration::{
    hop_triangulate, triangulate, weighted_residual, Fix, Sample,
};
use crate::algorithms::refinement::{NodeKind, RefinementState};
use crate::core::{Network, ZERO_CONFIDENCE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How hop counts are converted into distances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainRanging {
    /// One hop equals the maximum radio range
    #[default]
    RadioRange,
    /// Fit the hop scale per node; falls back to `RadioRange` when rejected
    Calibrated,
}

/// Result of a terrain pass
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TerrainOutcome {
    /// Nodes whose initial estimate passed the residual check
    pub located: usize,
    /// Nodes turned into Skip for lack of reachable anchors
    pub skipped: usize,
    /// Mean initial error of the Unknown nodes
    pub mean_error: f64,
}

/// Pick at most `dims + 2` anchors with the fewest hops.
///
/// Anchors are visited in flood order; once the window is full a newcomer
/// replaces the current worst entry only if it is strictly closer. Among
/// equally distant worst entries the earliest one is replaced.
pub fn closest_anchors(network: &Network, table: &HopTable, node: usize) -> Vec<(usize, usize)> {
    let limit = network.dims().count() + 2;
    let mut window: Vec<(usize, usize)> = Vec::with_capacity(limit);
    for (anchor, hops) in table.reachable(node) {
        if window.len() < limit {
            window.push((anchor, hops));
            continue;
        }
        let worst = (1..window.len()).fold(0, |worst, i| {
            if window[i].1 > window[worst].1 {
                i
            } else {
                worst
            }
        });
        if hops < window[worst].1 {
            window[worst] = (anchor, hops);
        }
    }
    window
}

/// Set the initial position and base confidence of every non-anchor node
pub fn initialize_positions(
    network: &Network,
    table: &HopTable,
    states: &mut [RefinementState],
    ranging: TerrainRanging,
) -> TerrainOutcome {
    let dims = network.dims();
    let range = network.range();
    let mut outcome = TerrainOutcome::default();
    let mut error_sum = 0.0;
    let mut unknowns = 0;

    for n in 0..network.len() {
        if states[n].kind == NodeKind::Anchor {
            continue;
        }

        let window = closest_anchors(network, table, n);
        if window.len() <= dims.count() {
            states[n].kind = NodeKind::Skip;
            outcome.skipped += 1;
            let (reachable, min, mean, max) = table.summary(n);
            debug!(
                node = network.node(n).id,
                reachable,
                min,
                mean,
                max,
                "terrain: too few anchors"
            );
            continue;
        }

        let fix = match ranging {
            TerrainRanging::Calibrated => {
                calibrated_fix(network, &window).or_else(|| radio_range_fix(network, &window))
            }
            TerrainRanging::RadioRange => radio_range_fix(network, &window),
        };

        let Some(fix) = fix else {
            states[n].base_confidence = ZERO_CONFIDENCE;
            continue;
        };

        debug!(
            node = network.node(n).id,
            position = %dims.format_point(&fix.position),
            residual = fix.residual,
            "terrain estimate"
        );
        states[n].init_position = fix.position;
        if !(0.0..=range).contains(&fix.residual) {
            states[n].base_confidence = ZERO_CONFIDENCE;
            continue;
        }
        outcome.located += 1;

        // an identical estimate to an earlier neighbor carries no information
        let duplicate = network.neighbors(n).iter().any(|edge| {
            let m = edge.target;
            m < n
                && states[m].kind == NodeKind::Unknown
                && dims.distance(&states[m].init_position, &fix.position) == 0.0
        });
        if duplicate {
            states[n].base_confidence = ZERO_CONFIDENCE;
        }

        if states[n].kind == NodeKind::Unknown {
            error_sum += dims.distance(&fix.position, &network.node(n).true_position);
            unknowns += 1;
        }
    }

    if unknowns > 0 {
        outcome.mean_error = error_sum / unknowns as f64;
    }
    info!(
        located = outcome.located,
        skipped = outcome.skipped,
        mean_error = outcome.mean_error,
        "terrain initialisation"
    );
    outcome
}

fn radio_range_fix(network: &Network, window: &[(usize, usize)]) -> Option<Fix> {
    let samples: Vec<Sample> = window
        .iter()
        .map(|&(anchor, hops)| {
            Sample::new(network.node(anchor).true_position, hops as f64 * network.range())
        })
        .collect();
    triangulate(network.dims(), &samples, false).ok()
}

fn calibrated_fix(network: &Network, window: &[(usize, usize)]) -> Option<Fix> {
    let hop_samples: Vec<Sample> = window
        .iter()
        .map(|&(anchor, hops)| Sample::new(network.node(anchor).true_position, hops as f64))
        .collect();
    let hop_fix = hop_triangulate(network.dims(), &hop_samples).ok()?;
    let scaled: Vec<Sample> = hop_samples
        .iter()
        .map(|s| Sample::new(s.position, s.range * hop_fix.scale))
        .collect();
    Some(Fix {
        position: hop_fix.position,
        residual: weighted_residual(network.dims(), &scaled, &hop_fix.position, false),
    })
}
