//! Per-operation state for forced reinsertion.

use std::collections::VecDeque;

use crate::rectangle::{Coord, Rectangle};

/// One forced reinsertion per level per top-level insert or remove.
#[derive(Debug, Clone)]
pub struct ReinsertBudget {
    used: Vec<bool>,
}

impl ReinsertBudget {
    /// Budget for a tree of the given height (levels `0..=height`).
    pub fn new(height: usize) -> Self {
        Self {
            used: vec![false; height + 1],
        }
    }

    pub fn is_used(&self, level: usize) -> bool {
        self.used.get(level).copied().unwrap_or(false)
    }

    /// Takes the budget of `level`, returning false if it was already spent.
    pub fn try_consume(&mut self, level: usize) -> bool {
        if level >= self.used.len() {
            self.used.resize(level + 1, false);
        }
        !std::mem::replace(&mut self.used[level], true)
    }

    /// Adds a level after the root split.
    pub fn grow(&mut self) {
        self.used.push(false);
    }

    pub fn levels(&self) -> usize {
        self.used.len()
    }
}

/// An entry waiting to be inserted again at `level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reinsertion<C> {
    pub entry: Rectangle<C>,
    pub level: usize,
}

/// State threaded through one top-level insert or remove.
pub struct Operation<C> {
    pub budget: ReinsertBudget,
    pub pending: VecDeque<Reinsertion<C>>,
}

impl<C: Coord> Operation<C> {
    pub fn new(height: usize) -> Self {
        Self {
            budget: ReinsertBudget::new(height),
            pending: VecDeque::new(),
        }
    }

    pub fn defer(&mut self, entry: Rectangle<C>, level: usize) {
        self.pending.push_back(Reinsertion { entry, level });
    }
}
