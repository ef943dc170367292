//! Structural statistics and consistency reports.

use std::fmt::{self, Display};

use crate::rectangle::{Coord, Rectangle};
use crate::storage::BlockId;

/// Summary returned by `RStarTree::stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    pub height: usize,
    pub node_count: u64,
    pub object_count: u64,
    pub fanout: usize,
    /// `(objects + nodes - 1) / (nodes * fanout)`: every node but the root
    /// occupies one slot in its parent.
    pub space_utilization: f64,
}

impl TreeStats {
    pub fn new(height: usize, node_count: u64, object_count: u64, fanout: usize) -> Self {
        let slots = node_count as f64 * fanout as f64;
        let used = (object_count + node_count).saturating_sub(1) as f64;
        let space_utilization = if slots > 0.0 { used / slots } else { 0.0 };
        Self {
            height,
            node_count,
            object_count,
            fanout,
            space_utilization,
        }
    }
}

impl Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Height: {}", self.height)?;
        writeln!(f, "Fanout: {}", self.fanout)?;
        writeln!(f, "Objects: {}", self.object_count)?;
        writeln!(f, "Nodes: {}", self.node_count)?;
        write!(f, "Space utilization: {:.2}%", self.space_utilization * 100.0)
    }
}

/// A single inconsistency found by `RStarTree::check_tree`.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeIssue<C> {
    /// The parent's entry for `node` differs from the union of its entries.
    CoverMismatch {
        node: BlockId,
        stored: Rectangle<C>,
        actual: Option<Rectangle<C>>,
    },
    /// `node` records `found` as parent but is linked from `expected`.
    ParentMismatch {
        node: BlockId,
        expected: BlockId,
        found: BlockId,
    },
    /// Non-root node with too few or too many entries.
    Fanout { node: BlockId, entries: usize },
    /// Internal root with fewer than two children.
    RootUnderfull { node: BlockId, entries: usize },
    /// Leaf reached at the wrong depth, or internal node at leaf depth.
    Depth { node: BlockId, depth: usize },
    /// Root flag set or missing where it should not be.
    RootFlag { node: BlockId },
    /// Counted objects differ from the recorded total.
    ObjectCount { counted: u64, recorded: u64 },
}

impl<C: Coord> Display for TreeIssue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeIssue::CoverMismatch { node, stored, actual } => match actual {
                Some(actual) => write!(f, "Node {}: parent stores {} but entries cover {}", node, stored, actual),
                None => write!(f, "Node {}: parent stores {} but node is empty", node, stored),
            },
            TreeIssue::ParentMismatch { node, expected, found } => {
                write!(f, "Node {}: parent is {} but recorded as {}", node, expected, found)
            }
            TreeIssue::Fanout { node, entries } => {
                write!(f, "Node {}: {} entries out of bounds", node, entries)
            }
            TreeIssue::RootUnderfull { node, entries } => {
                write!(f, "Node {}: internal root with {} children", node, entries)
            }
            TreeIssue::Depth { node, depth } => write!(f, "Node {}: wrong kind at depth {}", node, depth),
            TreeIssue::RootFlag { node } => write!(f, "Node {}: inconsistent root flag", node),
            TreeIssue::ObjectCount { counted, recorded } => {
                write!(f, "Counted {} objects, tree records {}", counted, recorded)
            }
        }
    }
}

/// Result of a full traversal by `RStarTree::check_tree`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeCheck<C> {
    pub objects: u64,
    pub nodes: u64,
    pub issues: Vec<TreeIssue<C>>,
}

impl<C: Coord> TreeCheck<C> {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn cover_mismatches(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, TreeIssue::CoverMismatch { .. }))
            .count()
    }
}

impl<C: Coord> Display for TreeCheck<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} objects in {} nodes", self.objects, self.nodes)?;
        if self.issues.is_empty() {
            return write!(f, ", consistent");
        }
        write!(f, ", {} issues:", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_utilization() {
        // 100 objects, 11 nodes, fanout 10: (100 + 11 - 1) / 110
        let stats = TreeStats::new(1, 11, 100, 10);
        assert!((stats.space_utilization - 1.0).abs() < 1e-9);

        let empty = TreeStats::new(0, 1, 0, 10);
        assert_eq!(empty.space_utilization, 0.0);
    }

    #[test]
    fn test_stats_display() {
        let text = TreeStats::new(2, 4, 30, 10).to_string();
        assert!(text.contains("Height: 2"));
        assert!(text.contains("Objects: 30"));
        assert!(text.contains("Space utilization: 82.50%"));
    }

    #[test]
    fn test_check_display() {
        let check: TreeCheck<f64> = TreeCheck {
            objects: 3,
            nodes: 1,
            issues: vec![TreeIssue::ObjectCount {
                counted: 3,
                recorded: 4,
            }],
        };
        assert!(!check.is_valid());
        assert_eq!(check.cover_mismatches(), 0);
        assert!(check.to_string().contains("Counted 3 objects, tree records 4"));
    }

    #[test]
    fn test_root_underfull_display() {
        let issue: TreeIssue<f64> = TreeIssue::RootUnderfull { node: 5, entries: 1 };
        assert_eq!(issue.to_string(), "Node 5: internal root with 1 children");
    }
}
