//! Undetermined-node classification over the hop table
//!
//! A node can only be located reliably when enough anchors reach it over
//! paths that do not overlap. Anchors are always determined; a node is
//! determined up front when its independent entry count exceeds `dims`.

use crate::algorithms::flood::HopTable;
use crate::core::Network;
use tracing::info;

/// Classify every node, returning `true` for undetermined ones.
///
/// Runs the optimistic promotion to its fixpoint, then the pessimistic
/// demotion to its fixpoint.
pub fn classify_undetermined(network: &Network, table: &HopTable) -> Vec<bool> {
    let dims = network.dims().count();
    let mut undetermined: Vec<bool> = (0..network.len())
        .map(|n| !network.is_anchor(n) && table.entries(n) <= dims)
        .collect();

    let promoted = promote_determined(network, table, &mut undetermined);
    let demoted = demote_unsupported(network, &mut undetermined);

    let ids: Vec<u32> = undetermined
        .iter()
        .enumerate()
        .filter(|(_, flag)| **flag)
        .map(|(n, _)| network.node(n).id)
        .collect();
    info!(promoted, demoted, undetermined = ?ids, "classified undetermined nodes");

    undetermined
}

/// Phase 1: assume entry points are reachable through determined nodes.
///
/// An undetermined node gains one link for every determined node listing it
/// that is not already the predecessor of one of its anchor paths. Once its
/// entries plus links exceed `dims` it becomes determined.
pub fn promote_determined(network: &Network, table: &HopTable, undetermined: &mut [bool]) -> usize {
    let dims = network.dims().count();
    let mut promoted = 0;

    loop {
        let mut links: Vec<usize> = (0..network.len()).map(|n| table.entries(n)).collect();
        let mut changed = false;

        for n in 0..network.len() {
            if undetermined[n] {
                continue;
            }
            for edge in network.neighbors(n) {
                let m = edge.target;
                if undetermined[m] && !table.enters_through(m, n) {
                    links[m] += 1;
                    if links[m] > dims {
                        undetermined[m] = false;
                        changed = true;
                        promoted += 1;
                    }
                }
            }
        }

        if !changed {
            break;
        }
    }

    promoted
}

/// Phase 2: demote every non-anchor determined node listed by at most `dims`
/// determined nodes, until nothing changes.
pub fn demote_unsupported(network: &Network, undetermined: &mut [bool]) -> usize {
    let dims = network.dims().count();
    let mut demoted = 0;

    loop {
        let mut support = vec![0; network.len()];
        for n in 0..network.len() {
            if undetermined[n] {
                continue;
            }
            for edge in network.neighbors(n) {
                support[edge.target] += 1;
            }
        }

        let mut changed = false;
        for n in 0..network.len() {
            if !undetermined[n] && !network.is_anchor(n) && support[n] <= dims {
                undetermined[n] = true;
                changed = true;
                demoted += 1;
            }
        }

        if !changed {
            break;
        }
    }

    demoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dimensions, Point};

    fn anchors3() -> Network {
        let mut net = Network::new(Dimensions::Two, 20.0, 20.0);
        net.add_node(0, true, Point::new(0.0, 0.0, 0.0));
        net.add_node(1, true, Point::new(10.0, 0.0, 0.0));
        net.add_node(2, true, Point::new(0.0, 10.0, 0.0));
        net
    }

    fn edge(net: &mut Network, from: usize, to: usize) {
        let d = net.true_distance(from, to);
        net.add_neighbor(from, to, d, d);
    }

    #[test]
    fn test_node_with_independent_anchor_paths_is_determined() {
        let mut net = anchors3();
        net.add_node(3, true, Point::new(10.0, 10.0, 0.0));
        let u = net.add_node(4, false, Point::new(5.0, 5.0, 0.0));
        for a in 0..4 {
            edge(&mut net, a, u);
            edge(&mut net, u, a);
        }
        let table = HopTable::flood(&net);
        assert_eq!(table.entries(u), 4);
        let undetermined = classify_undetermined(&net, &table);
        assert!(!undetermined[u]);
        assert!(undetermined.iter().all(|flag| !flag));
    }

    #[test]
    fn test_promotion_through_determined_neighbor() {
        let mut net = anchors3();
        let x = net.add_node(3, false, Point::new(6.0, 6.0, 0.0));
        let w = net.add_node(4, false, Point::new(7.0, 3.0, 0.0));
        let v = net.add_node(5, false, Point::new(3.0, 3.0, 0.0));
        edge(&mut net, 0, v);
        for a in [1, 2] {
            edge(&mut net, a, x);
            edge(&mut net, a, w);
        }
        edge(&mut net, x, v);
        edge(&mut net, w, v);
        edge(&mut net, v, x);
        edge(&mut net, v, w);

        let table = HopTable::flood(&net);
        assert_eq!(table.entries(v), 2);
        assert_eq!(table.entries(x), 3);
        assert_eq!(table.entries(w), 3);

        let undetermined = classify_undetermined(&net, &table);
        assert!(!undetermined[v]);
        assert!(!undetermined[x]);
        assert!(!undetermined[w]);
    }

    #[test]
    fn test_demotion_without_determined_support() {
        let mut net = anchors3();
        let relays: Vec<usize> = (0..3)
            .map(|i| net.add_node(10 + i, false, Point::new(2.0 + i as f64, 2.0, 0.0)))
            .collect();
        let u = net.add_node(20, false, Point::new(4.0, 4.0, 0.0));
        for (a, &relay) in relays.iter().enumerate() {
            edge(&mut net, a, relay);
            edge(&mut net, relay, u);
        }

        let table = HopTable::flood(&net);
        assert_eq!(table.entries(u), 3);
        let mut undetermined: Vec<bool> = (0..net.len())
            .map(|n| !net.is_anchor(n) && table.entries(n) <= 2)
            .collect();
        assert!(!undetermined[u]);
        assert_eq!(promote_determined(&net, &table, &mut undetermined), 0);
        assert_eq!(demote_unsupported(&net, &mut undetermined), 1);
        assert!(undetermined[u]);
        assert!(relays.iter().all(|&r| undetermined[r]));
    }
}
