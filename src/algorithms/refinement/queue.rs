//! Reinsertion-based priority queue with lazily invalidated entries
//!
//! Ordering keys change every time a node's candidate is recomputed, so the
//! queue never updates an entry in place. A reinsert bumps the node's
//! version and older heap entries are discarded when they surface.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Order in which candidates are committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Commit the candidate closest to ground truth first.
    ///
    /// Oracle mode: the ordering uses true positions and only makes sense
    /// for simulation and reproducing reference results.
    #[default]
    ClosestTrueMove,
    /// Commit the largest gain first
    LargestGain,
    /// Commit every improving candidate at once, round after round
    SynchronousRounds,
}

impl SchedulingPolicy {
    pub fn name(self) -> &'static str {
        match self {
            SchedulingPolicy::ClosestTrueMove => "closest true move",
            SchedulingPolicy::LargestGain => "biggest gain",
            SchedulingPolicy::SynchronousRounds => "synchronous rounds",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Gain at or below the convergence threshold
    done: bool,
    /// Smaller sorts first
    score: f64,
    node: usize,
    version: u64,
}

impl Ord for Entry {
    // BinaryHeap pops the greatest entry: pending before done, then the
    // lowest score, then the lowest index
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .done
            .cmp(&self.done)
            .then_with(|| other.score.total_cmp(&self.score))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// Priority queue of node indices keyed by `(done, score)`
#[derive(Debug, Clone)]
pub struct RefinementQueue {
    heap: BinaryHeap<Entry>,
    versions: Vec<u64>,
    queued: Vec<bool>,
}

impl RefinementQueue {
    /// Queue for node indices in `0..capacity`
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            versions: vec![0; capacity],
            queued: vec![false; capacity],
        }
    }

    /// Insert `node`, replacing any entry it already has
    pub fn push(&mut self, node: usize, done: bool, score: f64) {
        self.versions[node] += 1;
        self.queued[node] = true;
        self.heap.push(Entry {
            done,
            score,
            node,
            version: self.versions[node],
        });
    }

    /// Remove and return the head node
    pub fn pop(&mut self) -> Option<usize> {
        while let Some(entry) = self.heap.pop() {
            if self.queued[entry.node] && entry.version == self.versions[entry.node] {
                self.queued[entry.node] = false;
                return Some(entry.node);
            }
        }
        None
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.queued.iter().filter(|q| **q).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.queued.iter().any(|q| *q)
    }
}
