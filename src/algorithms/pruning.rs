//! Fixpoint pruning of nodes that ranging data cannot pin down
//!
//! All procedures only ever set flags in the `skip` mask, never clear them,
//! so each loop runs at most once per node before it stabilises.

use crate::core::Network;
use tracing::debug;

/// Count, for every node, the non-skipped nodes that list it as a neighbor
fn live_in_degree(network: &Network, skip: &[bool]) -> Vec<usize> {
    let mut counts = vec![0; network.len()];
    for (n, node) in network.nodes().iter().enumerate() {
        if skip[n] {
            continue;
        }
        for edge in node.neighbors() {
            counts[edge.target] += 1;
        }
    }
    counts
}

/// Repeatedly skip every non-anchor node with at most `dims` live in-neighbors.
///
/// Returns the number of nodes pruned. A second call on the same mask
/// prunes nothing.
pub fn prune_loose_nodes(network: &Network, skip: &mut [bool]) -> usize {
    let dims = network.dims().count();
    let mut pruned = 0;

    loop {
        let counts = live_in_degree(network, skip);
        let mut changed = false;
        for n in 0..network.len() {
            if !network.is_anchor(n) && !skip[n] && counts[n] <= dims {
                skip[n] = true;
                changed = true;
                pruned += 1;
                debug!(
                    node = network.node(n).id,
                    neighbors = counts[n],
                    received = network.node(n).received_count(),
                    "prune loose node"
                );
            }
        }
        if !changed {
            break;
        }
    }

    pruned
}

/// Collapse "identical twins": neighboring nodes whose live neighbor sets
/// coincide apart from each other. The higher-indexed twin is skipped and
/// both get a back-reference. A node left with at most `dims` live
/// neighbors after losing its twins is skipped too.
///
/// Returns whether any pair was collapsed.
pub fn collapse_twins(network: &Network, skip: &mut [bool], twins: &mut [Option<usize>]) -> bool {
    let dims = network.dims().count();
    let mut collapsed = false;

    for n in 0..network.len() {
        if skip[n] || network.is_anchor(n) {
            continue;
        }

        let mut neighbor_of_n = vec![false; network.len()];
        let mut count_n = 0;
        for edge in network.neighbors(n) {
            if !skip[edge.target] {
                neighbor_of_n[edge.target] = true;
                count_n += 1;
            }
        }

        if count_n <= dims {
            skip[n] = true;
            debug!(node = network.node(n).id, neighbors = count_n, "prune loose node");
            continue;
        }

        for edge in network.neighbors(n) {
            let m = edge.target;
            // each pair is examined once, from its lower index
            if skip[m] || network.is_anchor(m) || m < n {
                continue;
            }

            let mut identical = true;
            let mut count_m = 0;
            for other in network.neighbors(m) {
                let k = other.target;
                if skip[k] {
                    continue;
                }
                if k != n && !neighbor_of_n[k] {
                    identical = false;
                    break;
                }
                count_m += 1;
            }

            // a strict subset is not a twin
            if identical && count_m == count_n {
                twins[n] = Some(m);
                twins[m] = Some(n);
                skip[m] = true;
                collapsed = true;
                count_n -= 1;
                debug!(
                    node = network.node(n).id,
                    twin = network.node(m).id,
                    "identical twins"
                );
            }
        }

        if count_n <= dims {
            skip[n] = true;
            debug!(node = network.node(n).id, "twin short on neighbors");
        }
    }

    collapsed
}

/// Alternate twin collapsing and loose-node pruning until a twin pass
/// collapses nothing.
pub fn find_bad_nodes(network: &Network, bad: &mut [bool], twins: &mut [Option<usize>]) {
    while collapse_twins(network, bad, twins) {
        prune_loose_nodes(network, bad);
    }
}
