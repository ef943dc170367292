//! Tree nodes.
//!
//! A node occupies one block. Leaf entries are data rectangles; internal
//! entries are child covers whose id is the child's block id.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::split::{choose_split_axis_and_index, SplitChoice};
use crate::rectangle::{Coord, Rectangle};
use crate::storage::BlockId;

// ============================================================================
// Flags
// ============================================================================

/// Kind bits of a node. Bit values are part of the block format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const INTERNAL: NodeFlags = NodeFlags(1);
    pub const LEAF_NODE: NodeFlags = NodeFlags(2);
    pub const ROOT: NodeFlags = NodeFlags(4);
    pub const LEAF: NodeFlags = NodeFlags(8);

    pub const fn empty() -> Self {
        NodeFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        NodeFlags(bits)
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    pub const fn intersects(self, other: NodeFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: NodeFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for NodeFlags {
    type Output = NodeFlags;

    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(NodeFlags::INTERNAL) {
            names.push("INTERNAL");
        }
        if self.contains(NodeFlags::LEAF_NODE) {
            names.push("LEAF_NODE");
        }
        if self.contains(NodeFlags::ROOT) {
            names.push("ROOT");
        }
        if self.contains(NodeFlags::LEAF) {
            names.push("LEAF");
        }
        write!(f, "NodeFlags({})", names.join(" | "))
    }
}

// ============================================================================
// Node
// ============================================================================

/// In-memory image of one block.
#[derive(Debug, Clone)]
pub struct Node<C: Coord = f64> {
    id: BlockId,
    parent: BlockId,
    flags: NodeFlags,
    entries: Vec<Rectangle<C>>,
    /// Cached union of `entries`, valid only while its id equals `id`
    cover: Option<Rectangle<C>>,
    fanout: usize,
    min_fanout: usize,
}

impl<C: Coord> Node<C> {
    /// A fresh, empty node. Its parent points at itself until it is linked.
    pub fn new(id: BlockId, flags: NodeFlags, fanout: usize, min_fanout: usize) -> Self {
        Self {
            id,
            parent: id,
            flags,
            entries: Vec::new(),
            cover: None,
            fanout,
            min_fanout,
        }
    }

    pub(crate) fn from_parts(
        id: BlockId,
        parent: BlockId,
        flags: NodeFlags,
        cover: Option<Rectangle<C>>,
        entries: Vec<Rectangle<C>>,
        fanout: usize,
        min_fanout: usize,
    ) -> Self {
        Self {
            id,
            parent,
            flags,
            entries,
            cover,
            fanout,
            min_fanout,
        }
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    pub fn parent(&self) -> BlockId {
        self.parent
    }

    pub fn set_parent(&mut self, parent: BlockId) {
        self.parent = parent;
    }

    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: NodeFlags) {
        self.flags = flags;
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.intersects(NodeFlags::LEAF | NodeFlags::LEAF_NODE)
    }

    pub fn is_root(&self) -> bool {
        self.flags.contains(NodeFlags::ROOT)
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    pub fn min_fanout(&self) -> usize {
        self.min_fanout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Rectangle<C>] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> &Rectangle<C> {
        &self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, entry: Rectangle<C>) {
        self.entries[index] = entry;
        self.cover = None;
    }

    pub fn set_entries(&mut self, entries: Vec<Rectangle<C>>) {
        self.entries = entries;
        self.cover = None;
    }

    pub fn take_entries(&mut self) -> Vec<Rectangle<C>> {
        self.cover = None;
        std::mem::take(&mut self.entries)
    }

    /// Full means two free slots are no longer available.
    pub fn is_full(&self) -> bool {
        is_full_at(self.entries.len(), self.fanout)
    }

    pub fn is_underfull(&self) -> bool {
        self.entries.len() < self.min_fanout
    }

    pub fn add_child(&mut self, entry: Rectangle<C>) {
        self.entries.push(entry);
        self.cover = None;
    }

    /// Removes the first entry equal to `entry` (same id and corners) by
    /// moving the last entry into its slot.
    pub fn remove_child(&mut self, entry: &Rectangle<C>) -> bool {
        match self.entries.iter().position(|e| e == entry) {
            Some(index) => {
                self.remove_child_at(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_child_at(&mut self, index: usize) -> Rectangle<C> {
        self.cover = None;
        self.entries.swap_remove(index)
    }

    /// Position of the entry pointing at child block `child`.
    pub fn find_child(&self, child: BlockId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == child)
    }

    /// R* ChooseSubtree: the entry needing least enlargement to cover `r`,
    /// ties going to the smaller perimeter. The chosen entry is extended
    /// to cover `r`.
    pub fn route(&mut self, r: &Rectangle<C>) -> Option<usize> {
        let mut best: Option<(usize, f64, f64)> = None;
        for (i, e) in self.entries.iter().enumerate() {
            let enlargement = e.enlargement(r);
            let margin = e.margin();
            let better = match best {
                None => true,
                Some((_, be, bm)) => enlargement < be || (enlargement == be && margin < bm),
            };
            if better {
                best = Some((i, enlargement, margin));
            }
        }

        let (index, _, _) = best?;
        self.entries[index].extend(r);
        self.cover = None;
        Some(index)
    }

    /// Union of the entries tagged with this node's id, recomputed when the
    /// cached value is stale. `None` for an empty node.
    pub fn covering_rectangle(&mut self) -> Option<Rectangle<C>> {
        match self.cover {
            Some(cover) if cover.id() == self.id => Some(cover),
            _ => {
                self.cover = Rectangle::cover_of(self.id, &self.entries);
                self.cover
            }
        }
    }

    /// Installs a precomputed cover. It is ignored unless tagged with this
    /// node's id.
    pub fn set_covering_rectangle(&mut self, cover: Rectangle<C>) {
        self.cover = Some(cover);
    }

    /// Union of the entries, always recomputed.
    pub fn exact_cover(&self) -> Option<Rectangle<C>> {
        Rectangle::cover_of(self.id, &self.entries)
    }

    /// Cached cover as stored, without revalidation.
    pub(crate) fn cached_cover(&self) -> Option<Rectangle<C>> {
        self.cover
    }

    pub fn choose_split_axis_and_index(&self) -> SplitChoice<C> {
        choose_split_axis_and_index(&self.entries, self.fanout, self.min_fanout)
    }
}

pub(crate) fn is_full_at(len: usize, fanout: usize) -> bool {
    len + 2 >= fanout
}
