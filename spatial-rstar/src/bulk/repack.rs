//! Repacking cache of the packed bulk loader.
//!
//! Closed nodes are kept in memory, ordered by the Hilbert value of their
//! box centre. Once enough of them are collected, their entries are pooled
//! and redistributed with the R* split heuristic, which yields tighter
//! nodes than cutting the Hilbert order into consecutive chunks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::hilbert::HilbertGrid;
use crate::constants::REPACK_THRESHOLD;
use crate::rectangle::{Coord, Rectangle};
use crate::rtree::choose_split_axis_and_index;

struct CachedNode<C> {
    hilbert: u64,
    seq: u64,
    entries: Vec<Rectangle<C>>,
}

impl<C> PartialEq for CachedNode<C> {
    fn eq(&self, other: &Self) -> bool {
        self.hilbert == other.hilbert && self.seq == other.seq
    }
}

impl<C> Eq for CachedNode<C> {}

impl<C> PartialOrd for CachedNode<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for CachedNode<C> {
    // Reversed: the heap pops the smallest Hilbert value first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .hilbert
            .cmp(&self.hilbert)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// In-memory nodes waiting to be written, smallest Hilbert value first.
pub struct RepackCache<C> {
    heap: BinaryHeap<CachedNode<C>>,
    next_seq: u64,
    fanout: usize,
    min_fanout: usize,
    rounds: u64,
}

impl<C: Coord> RepackCache<C> {
    pub fn new(fanout: usize, min_fanout: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            fanout,
            min_fanout,
            rounds: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of repacking rounds run so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Caches the entries of a closed node and repacks once
    /// `REPACK_THRESHOLD` nodes are cached.
    pub fn push(&mut self, entries: Vec<Rectangle<C>>, grid: &HilbertGrid) {
        self.cache(entries, grid);
        if self.heap.len() >= REPACK_THRESHOLD {
            self.repack(grid);
        }
    }

    /// Repacks whatever is left at the end of a level so that a small
    /// trailing node is merged into its neighbours.
    pub fn flush(&mut self, grid: &HilbertGrid) {
        if self.heap.len() >= 2 {
            self.repack(grid);
        }
    }

    /// Takes the cached node with the smallest Hilbert value.
    pub fn pop(&mut self) -> Option<Vec<Rectangle<C>>> {
        self.heap.pop().map(|node| node.entries)
    }

    fn cache(&mut self, entries: Vec<Rectangle<C>>, grid: &HilbertGrid) {
        let hilbert = Rectangle::cover_of(0, &entries)
            .map(|cover| grid.hilbert_value(&cover))
            .unwrap_or(0);
        self.heap.push(CachedNode {
            hilbert,
            seq: self.next_seq,
            entries,
        });
        self.next_seq += 1;
    }

    /// Pools all cached entries and cuts them into nodes with fewer than
    /// `fanout` entries. Each cut keeps the split heuristic's first group
    /// and continues with the rest.
    fn repack(&mut self, grid: &HilbertGrid) {
        let cached = self.heap.len();
        let mut pending: Vec<Rectangle<C>> = Vec::new();
        for node in self.heap.drain() {
            pending.extend(node.entries);
        }

        while pending.len() >= self.fanout {
            let (group, rest) =
                choose_split_axis_and_index(&pending, self.fanout, self.min_fanout).into_groups();
            self.cache(group, grid);
            pending = rest;
        }
        if !pending.is_empty() {
            self.cache(pending, grid);
        }

        self.rounds += 1;
        log::trace!("Repacked {} cached nodes into {}", cached, self.heap.len());
    }
}
