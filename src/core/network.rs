//! Graph model: the node arena and its directed neighbor edges
//!
//! Nodes live in one contiguous vector and refer to each other by index.
//! Edges are owned by the receiving node: `a.neighbors` holds one record per
//! node `a` has heard from, so an edge a→b does not imply b→a.

use crate::core::types::{Dimensions, Point};
use serde::{Deserialize, Serialize};

/// One directed neighbor record
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEdge {
    /// Index of the neighbor in the network arena
    pub target: usize,
    /// Ground-truth distance between the two nodes
    pub true_distance: f64,
    /// Measured distance, clamped to the radio range
    pub estimated_distance: f64,
}

/// Counters reported by the message layer for each node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCounters {
    pub flops: u64,
    pub broadcasts: u64,
    pub unique_broadcasts: u64,
}

/// A node of the multi-hop network
#[derive(Debug, Clone)]
pub struct Node {
    /// External identifier (may lie outside `0..len`)
    pub id: u32,
    pub anchor: bool,
    /// Ground truth, only used for analysis and the oracle scheduling mode
    pub true_position: Point,
    /// Anchors: the true position. Unknowns: the origin.
    pub init_position: Point,
    received_count: u32,
    neighbors: Vec<NeighborEdge>,
    pub counters: NodeCounters,
}

impl Node {
    /// Number of messages received so far
    pub fn received_count(&self) -> u32 {
        self.received_count
    }

    /// Neighbor records in discovery order
    pub fn neighbors(&self) -> &[NeighborEdge] {
        &self.neighbors
    }
}

/// Snapshot of the network collected by the message layer
#[derive(Debug, Clone)]
pub struct Network {
    dims: Dimensions,
    range: f64,
    bound: f64,
    nodes: Vec<Node>,
}

impl Network {
    /// Create an empty network with the given dimensionality, radio range and area bound
    pub fn new(dims: Dimensions, range: f64, bound: f64) -> Self {
        Self {
            dims,
            range,
            bound,
            nodes: Vec::new(),
        }
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Maximum radio range
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Side of the bounding box containing the deployment
    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node and return its arena index
    pub fn add_node(&mut self, id: u32, anchor: bool, true_position: Point) -> usize {
        let init_position = if anchor { true_position } else { Point::zeros() };
        self.nodes.push(Node {
            id,
            anchor,
            true_position,
            init_position,
            received_count: 0,
            neighbors: Vec::new(),
            counters: NodeCounters::default(),
        });
        self.nodes.len() - 1
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn neighbors(&self, index: usize) -> &[NeighborEdge] {
        &self.nodes[index].neighbors
    }

    pub fn is_anchor(&self, index: usize) -> bool {
        self.nodes[index].anchor
    }

    /// Indices of all anchors in arena order
    pub fn anchors(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.anchor)
            .map(|(index, _)| index)
    }

    pub fn anchor_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.anchor).count()
    }

    /// Whether `node` has not yet recorded a neighbor edge from `source`
    pub fn is_new_neighbor(&self, node: usize, source: usize) -> bool {
        !self.nodes[node].neighbors.iter().any(|edge| edge.target == source)
    }

    /// Record that `node` heard `source` at the given distances.
    ///
    /// Returns false if the edge was already known. The measured distance is
    /// clamped to the radio range.
    pub fn add_neighbor(
        &mut self,
        node: usize,
        source: usize,
        true_distance: f64,
        estimated_distance: f64,
    ) -> bool {
        if !self.is_new_neighbor(node, source) {
            return false;
        }
        let estimated_distance = estimated_distance.min(self.range);
        self.nodes[node].neighbors.push(NeighborEdge {
            target: source,
            true_distance,
            estimated_distance,
        });
        true
    }

    /// Count one more received message at `node`
    pub fn record_reception(&mut self, node: usize) {
        self.nodes[node].received_count += 1;
    }

    pub fn counters_mut(&mut self, node: usize) -> &mut NodeCounters {
        &mut self.nodes[node].counters
    }

    /// Distance between two nodes' true positions
    pub fn true_distance(&self, a: usize, b: usize) -> f64 {
        self.dims
            .distance(&self.nodes[a].true_position, &self.nodes[b].true_position)
    }
}
