//! The R*-tree and its building blocks.

mod metadata;
mod node;
mod node_store;
mod reinsert;
mod split;
mod stats;
mod tree;

pub use metadata::TreeInfo;
pub use node::{Node, NodeFlags};
pub use node_store::{min_fanout_for, NodeGuard, NodeStore};
pub use reinsert::{Operation, ReinsertBudget, Reinsertion};
pub use split::{choose_split_axis_and_index, SplitAxis, SplitChoice};
pub use stats::{TreeCheck, TreeIssue, TreeStats};
pub use tree::RStarTree;

pub(crate) use metadata::side_path;
pub(crate) use node::is_full_at;
