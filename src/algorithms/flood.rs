//! Multi-source hop-count flooding from the anchors
//!
//! Each anchor floods the directed neighbor graph breadth first, following
//! the edges of each wavefront node to its neighbors. For every
//! (node, anchor) pair the table keeps the hop count and the node through
//! which the wave arrived.

use crate::core::Network;

/// Hop counts and path predecessors for every (node, anchor) pair
#[derive(Debug, Clone)]
pub struct HopTable {
    anchors: Vec<usize>,
    /// `hops[node][a]`, equal to `unreachable` when the wave never arrived
    hops: Vec<Vec<usize>>,
    /// `via[node][a]`: predecessor on the discovered shortest path
    via: Vec<Vec<Option<usize>>>,
    unreachable: usize,
    entries: Vec<usize>,
}

impl HopTable {
    /// Flood from every anchor of the network.
    ///
    /// Cost is O(anchors × (nodes + edges)).
    pub fn flood(network: &Network) -> Self {
        let n = network.len();
        let anchors: Vec<usize> = network.anchors().collect();
        let mut hops = vec![vec![n; anchors.len()]; n];
        let mut via = vec![vec![None; anchors.len()]; n];

        for (a, &anchor) in anchors.iter().enumerate() {
            hops[anchor][a] = 0;
            via[anchor][a] = Some(anchor);
            let mut front = vec![anchor];
            let mut hop = 0;
            while !front.is_empty() {
                front.sort_unstable();
                let mut next = Vec::new();
                for &m in &front {
                    for edge in network.neighbors(m) {
                        if hops[edge.target][a] == n {
                            hops[edge.target][a] = hop + 1;
                            via[edge.target][a] = Some(m);
                            next.push(edge.target);
                        }
                    }
                }
                front = next;
                hop += 1;
            }
        }

        let mut table = Self {
            anchors,
            hops,
            via,
            unreachable: n,
            entries: vec![0; n],
        };
        let entries = (0..n)
            .map(|node| {
                if network.is_anchor(node) {
                    0
                } else {
                    table.count_entries(node)
                }
            })
            .collect();
        table.entries = entries;
        table
    }

    /// Count the anchors reaching `node` through distinct predecessors
    fn count_entries(&self, node: usize) -> usize {
        let mut seen: Vec<usize> = Vec::new();
        for a in 0..self.anchors.len() {
            if let Some(pred) = self.predecessor(node, a) {
                if !seen.contains(&pred) {
                    seen.push(pred);
                }
            }
        }
        seen.len()
    }

    /// Arena indices of the anchors, in flood order
    pub fn anchors(&self) -> &[usize] {
        &self.anchors
    }

    /// Hop count from anchor number `a`, `None` if unreachable
    pub fn hop_count(&self, node: usize, a: usize) -> Option<usize> {
        let hops = self.hops[node][a];
        (hops < self.unreachable).then_some(hops)
    }

    /// Predecessor of `node` on its path from anchor number `a`
    pub fn predecessor(&self, node: usize, a: usize) -> Option<usize> {
        self.via[node][a]
    }

    /// Whether some anchor path enters `node` through `pred`
    pub fn enters_through(&self, node: usize, pred: usize) -> bool {
        self.via[node].iter().any(|p| *p == Some(pred))
    }

    /// Number of anchors reachable through mutually non-overlapping paths
    pub fn entries(&self, node: usize) -> usize {
        self.entries[node]
    }

    /// `(anchor index, hops)` for every anchor reaching `node`
    pub fn reachable(&self, node: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.anchors.len())
            .filter_map(move |a| self.hop_count(node, a).map(|h| (self.anchors[a], h)))
    }

    /// Hop statistics of one node: (reachable anchors, min, mean, max)
    pub fn summary(&self, node: usize) -> (usize, usize, f64, usize) {
        let counts: Vec<usize> = self.reachable(node).map(|(_, h)| h).collect();
        if counts.is_empty() {
            return (0, 0, 0.0, 0);
        }
        let min = counts.iter().copied().min().unwrap_or(0);
        let max = counts.iter().copied().max().unwrap_or(0);
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        (counts.len(), min, mean, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dimensions, Point};

    fn link(net: &mut Network, a: usize, b: usize) {
        let d = net.true_distance(a, b);
        net.add_neighbor(a, b, d, d);
        net.add_neighbor(b, a, d, d);
    }

    /// anchors 0 and 1, chain 0 - 2 - 3 - 1, plus 4 hanging off 3
    fn chain() -> Network {
        let mut net = Network::new(Dimensions::Two, 10.0, 40.0);
        net.add_node(0, true, Point::new(0.0, 0.0, 0.0));
        net.add_node(1, true, Point::new(30.0, 0.0, 0.0));
        net.add_node(2, false, Point::new(10.0, 0.0, 0.0));
        net.add_node(3, false, Point::new(20.0, 0.0, 0.0));
        net.add_node(4, false, Point::new(20.0, 5.0, 0.0));
        link(&mut net, 0, 2);
        link(&mut net, 2, 3);
        link(&mut net, 3, 1);
        link(&mut net, 3, 4);
        net
    }

    #[test]
    fn test_hop_counts() {
        let table = HopTable::flood(&chain());
        assert_eq!(table.anchors(), &[0, 1]);
        assert_eq!(table.hop_count(0, 0), Some(0));
        assert_eq!(table.hop_count(2, 0), Some(1));
        assert_eq!(table.hop_count(3, 0), Some(2));
        assert_eq!(table.hop_count(4, 0), Some(3));
        assert_eq!(table.hop_count(2, 1), Some(2));
        assert_eq!(table.predecessor(3, 0), Some(2));
        assert_eq!(table.predecessor(3, 1), Some(1));
    }

    #[test]
    fn test_entries_collapse_shared_predecessor() {
        let table = HopTable::flood(&chain());
        // node 3 is entered from 2 and from 1: two independent entries
        assert_eq!(table.entries(3), 2);
        // node 4 only hears 3, both anchor paths overlap
        assert_eq!(table.entries(4), 1);
        assert!(table.enters_through(4, 3));
        assert_eq!(table.entries(0), 0);
    }

    #[test]
    fn test_directed_edge_blocks_flood() {
        let mut net = Network::new(Dimensions::Two, 10.0, 40.0);
        net.add_node(0, true, Point::new(0.0, 0.0, 0.0));
        net.add_node(1, false, Point::new(5.0, 0.0, 0.0));
        // only 1 has an edge towards 0
        net.add_neighbor(1, 0, 5.0, 5.0);
        let table = HopTable::flood(&net);
        assert_eq!(table.hop_count(1, 0), None);
        assert_eq!(table.reachable(1).count(), 0);
        assert_eq!(table.summary(1), (0, 0, 0.0, 0));
    }
}
