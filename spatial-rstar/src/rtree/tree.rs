//! Disk-resident R*-tree.
//!
//! Nodes live in blocks of a [`BlockStore`]; the tree itself only keeps the
//! root id, the height and the object count, which are persisted in a
//! `<name>.info` side file. Every node access goes through a
//! [`NodeStore`]; nodes checked out for modification are written back when
//! their guard is released.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use super::metadata::TreeInfo;
use super::node::{Node, NodeFlags};
use super::node_store::{NodeGuard, NodeStore};
use super::reinsert::Operation;
use super::stats::{TreeCheck, TreeIssue, TreeStats};
use crate::config::TreeConfig;
use crate::constants::{MIN_FANOUT, REINSERT_KEEP_PERCENT};
use crate::error::{RTreeError, RTreeResult};
use crate::rectangle::{Coord, Rectangle};
use crate::sequence::ExternalSequence;
use crate::storage::{BlockId, BlockStore, FileBlockStore, MemoryBlockStore, Persistence};

/// Covers of the two nodes a split produced, to be linked into `parent`.
struct SplitResult<C> {
    replaced: BlockId,
    parent: BlockId,
    first: Rectangle<C>,
    second: Rectangle<C>,
}

/// A dynamic R*-tree over rectangles with coordinates of type `C`.
///
/// # Example
///
/// ```no_run
/// use spatial_rstar::{RStarTree, Rectangle};
///
/// let mut tree: RStarTree = RStarTree::open("/tmp/parcels", 50)?;
/// tree.insert(Rectangle::new(1, 0.0, 0.0, 10.0, 10.0))?;
/// let hits = tree.query(&Rectangle::new(0, 5.0, 5.0, 6.0, 6.0), false)?;
/// assert_eq!(hits.len(), 1);
/// tree.close()?;
/// # Ok::<(), spatial_rstar::RTreeError>(())
/// ```
pub struct RStarTree<C: Coord = f64> {
    name: Option<PathBuf>,
    nodes: NodeStore<C>,
    info: TreeInfo,
    persistence: Persistence,
    closed: bool,
}

impl<C: Coord> RStarTree<C> {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Opens the tree stored under `name`, creating an empty one if there is
    /// none. `fanout` only applies to a new tree.
    pub fn open(name: impl AsRef<Path>, fanout: usize) -> RTreeResult<Self> {
        Self::open_with_config(name, &TreeConfig::new().fanout(fanout))
    }

    pub fn open_with_config(name: impl AsRef<Path>, config: &TreeConfig) -> RTreeResult<Self> {
        config.validate_block_size()?;
        let name = name.as_ref().to_path_buf();
        if name.exists() {
            if let Some(info) = TreeInfo::read(&name)? {
                return Self::reopen(name, info, config);
            }
            log::warn!("Block file {:?} has no metadata, creating a new tree", name);
        }

        let fanout = config.resolve_fanout(NodeStore::<C>::capacity_for(config.get_block_size()))?;
        let blocks = FileBlockStore::create(&name, config.get_block_size(), config.get_cache_blocks())?;
        let tree = Self::initialise(Some(name), Box::new(blocks), fanout)?;
        log::info!("Created tree {:?} with fanout {}", tree.name, fanout);
        Ok(tree)
    }

    /// A tree whose blocks live in memory only.
    pub fn in_memory(config: &TreeConfig) -> RTreeResult<Self> {
        config.validate_block_size()?;
        let fanout = config.resolve_fanout(NodeStore::<C>::capacity_for(config.get_block_size()))?;
        let blocks = MemoryBlockStore::new(config.get_block_size())?;
        Self::initialise(None, Box::new(blocks), fanout)
    }

    fn reopen(name: PathBuf, info: TreeInfo, config: &TreeConfig) -> RTreeResult<Self> {
        let blocks = FileBlockStore::open(&name, config.get_cache_blocks())?;
        let capacity = NodeStore::<C>::capacity_for(blocks.capacity());
        let fanout = info.fanout as usize;
        if fanout < MIN_FANOUT || fanout > capacity {
            log::error!("Tree {:?} records fanout {} (capacity {})", name, fanout, capacity);
            return Err(RTreeError::Corrupted(format!(
                "stored fanout {} does not fit block capacity {}",
                fanout, capacity
            )));
        }
        if let Some(requested) = config.requested_fanout() {
            if requested != fanout {
                log::warn!(
                    "Tree {:?} was built with fanout {}, ignoring requested fanout {}",
                    name,
                    fanout,
                    requested
                );
            }
        }

        let nodes = NodeStore::new(Box::new(blocks), fanout);
        let root = nodes.load(info.root)?;
        if !root.is_root() {
            return Err(RTreeError::Corrupted(format!(
                "block {} is not a root node",
                info.root
            )));
        }
        log::info!(
            "Opened tree {:?}: height {}, {} objects",
            name,
            info.height,
            info.total_objects
        );
        Ok(Self::from_parts(Some(name), nodes, info))
    }

    fn initialise(name: Option<PathBuf>, blocks: Box<dyn BlockStore>, fanout: usize) -> RTreeResult<Self> {
        let nodes = NodeStore::new(blocks, fanout);
        let root = nodes.allocate(NodeFlags::ROOT | NodeFlags::LEAF)?;
        let info = TreeInfo {
            root: root.id(),
            height: 0,
            total_objects: 0,
            fanout: fanout as u32,
        };
        root.commit()?;
        let tree = Self::from_parts(name, nodes, info);
        tree.write_info()?;
        Ok(tree)
    }

    /// Wraps blocks already holding a complete tree.
    pub(crate) fn from_parts(name: Option<PathBuf>, nodes: NodeStore<C>, info: TreeInfo) -> Self {
        Self {
            name,
            nodes,
            info,
            persistence: Persistence::Persist,
            closed: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }

    /// Levels above the leaves; 0 while the root is a leaf.
    pub fn height(&self) -> usize {
        self.info.height as usize
    }

    pub fn total_objects(&self) -> u64 {
        self.info.total_objects
    }

    pub fn len(&self) -> u64 {
        self.info.total_objects
    }

    pub fn is_empty(&self) -> bool {
        self.info.total_objects == 0
    }

    pub fn root_id(&self) -> BlockId {
        self.info.root
    }

    pub fn fanout(&self) -> usize {
        self.nodes.fanout()
    }

    pub fn min_fanout(&self) -> usize {
        self.nodes.min_fanout()
    }

    /// Reads a node by block id.
    pub fn node(&self, id: BlockId) -> RTreeResult<Node<C>> {
        self.nodes.load(id)
    }

    /// Decides what happens to the tree's files when it is dropped.
    pub fn set_persistence(&mut self, persistence: Persistence) {
        self.persistence = persistence;
        self.nodes.set_persistence(persistence);
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Inserts a data rectangle. Its id is the caller's object id.
    pub fn insert(&mut self, r: Rectangle<C>) -> RTreeResult<()> {
        let mut op = Operation::new(self.height());
        self.info.total_objects += 1;
        let result = self
            .insert_on_level(&mut op, r, 0)
            .and_then(|_| self.drain(&mut op));
        self.finish(result)
    }

    fn insert_on_level(&mut self, op: &mut Operation<C>, r: Rectangle<C>, level: usize) -> RTreeResult<()> {
        if level > self.height() {
            return Err(RTreeError::Corrupted(format!(
                "entry {} scheduled for level {} above the root",
                r.id(),
                level
            )));
        }

        let mut node = self.choose_node_on_level(&r, level)?;
        if node.is_full() {
            return self.overflow_treatment(op, node, r, level);
        }

        node.add_child(r);
        let node_id = node.id();
        let is_leaf = node.is_leaf();
        node.commit()?;
        if !is_leaf {
            self.nodes.set_parent(r.id(), node_id)?;
        }
        Ok(())
    }

    /// Descends from the root to the node at `level` chosen for `r`,
    /// enlarging the routed entries on the way.
    fn choose_node_on_level(&self, r: &Rectangle<C>, level: usize) -> RTreeResult<NodeGuard<C>> {
        let mut node = self.nodes.checkout(self.info.root)?;
        let mut looking_at = self.height();
        while looking_at > level {
            let index = node.route(r).ok_or_else(|| {
                log::error!("Internal node {} has no entries", node.id());
                RTreeError::Corrupted(format!("internal node {} has no entries", node.id()))
            })?;
            let child = node.entry(index).id();
            node = self.nodes.checkout(child)?;
            looking_at -= 1;
        }
        Ok(node)
    }

    /// Places `r` into a full node: forced reinsertion the first time a
    /// level overflows, a split otherwise.
    fn overflow_treatment(
        &mut self,
        op: &mut Operation<C>,
        mut node: NodeGuard<C>,
        r: Rectangle<C>,
        level: usize,
    ) -> RTreeResult<()> {
        if node.is_root() || !op.budget.try_consume(level) {
            node.add_child(r);
            self.split_and_adjust(op, node, level)
        } else {
            self.reinsert(op, node, r, level)
        }
    }

    /// Keeps the entries closest to the node's centre and schedules the
    /// rest for reinsertion at the same level.
    fn reinsert(
        &mut self,
        op: &mut Operation<C>,
        mut node: NodeGuard<C>,
        r: Rectangle<C>,
        level: usize,
    ) -> RTreeResult<()> {
        let (cx, cy) = match node.exact_cover() {
            Some(cover) => cover.center(),
            None => r.center(),
        };

        let mut candidates: Vec<(bool, Rectangle<C>)> =
            node.take_entries().into_iter().map(|e| (false, e)).collect();
        candidates.push((true, r));
        candidates.sort_by(|a, b| {
            a.1.center_distance_sq(cx, cy)
                .partial_cmp(&b.1.center_distance_sq(cx, cy))
                .unwrap_or(Ordering::Equal)
        });

        let keep = (candidates.len() * REINSERT_KEEP_PERCENT / 100).max(1);
        let far = candidates.split_off(keep);
        let kept_new = candidates.iter().any(|(is_new, _)| *is_new);
        node.set_entries(candidates.into_iter().map(|(_, e)| e).collect());

        let node_id = node.id();
        let is_leaf = node.is_leaf();
        log::trace!(
            "Reinserting {} entries of node {} at level {}",
            far.len(),
            node_id,
            level
        );

        self.tighten_path(node)?;
        if kept_new && !is_leaf {
            self.nodes.set_parent(r.id(), node_id)?;
        }
        for (_, entry) in far {
            op.defer(entry, level);
        }
        Ok(())
    }

    /// Rewrites exact covers from `node` up to the root.
    fn tighten_path(&self, mut node: NodeGuard<C>) -> RTreeResult<()> {
        while !node.is_root() {
            let cover = node.exact_cover().ok_or_else(|| {
                RTreeError::Corrupted(format!("non-root node {} is empty", node.id()))
            })?;
            let mut parent = self.nodes.checkout(node.parent())?;
            let index = parent
                .find_child(node.id())
                .ok_or_else(|| missing_link(parent.id(), node.id()))?;
            parent.set_entry(index, cover);
            node.commit()?;
            node = parent;
        }
        node.commit()
    }

    fn split_and_adjust(&mut self, op: &mut Operation<C>, node: NodeGuard<C>, level: usize) -> RTreeResult<()> {
        match self.split_node(op, node)? {
            Some(split) => self.adjust_tree_on_level(op, split, level + 1),
            None => Ok(()),
        }
    }

    /// Splits an overflowing node into two freshly allocated nodes and
    /// frees its block. Splitting the root grows the tree and needs no
    /// adjustment above.
    fn split_node(&mut self, op: &mut Operation<C>, mut node: NodeGuard<C>) -> RTreeResult<Option<SplitResult<C>>> {
        let (group_a, group_b) = node.choose_split_axis_and_index().into_groups();
        let old_id = node.id();
        let parent = node.parent();
        let was_root = node.is_root();
        let mut flags = node.flags();
        flags.remove(NodeFlags::ROOT);

        let mut first = self.nodes.allocate(flags)?;
        let mut second = self.nodes.allocate(flags)?;
        first.set_entries(group_a);
        second.set_entries(group_b);
        let empty_group = || RTreeError::Corrupted(format!("split of node {} left a group empty", old_id));
        let cover_a = first.covering_rectangle().ok_or_else(empty_group)?;
        let cover_b = second.covering_rectangle().ok_or_else(empty_group)?;

        node.discard();
        node.commit()?;

        if was_root {
            let mut root = self.nodes.allocate(NodeFlags::ROOT | NodeFlags::INTERNAL)?;
            let root_id = root.id();
            root.add_child(cover_a);
            root.add_child(cover_b);
            root.commit()?;

            first.set_parent(root_id);
            second.set_parent(root_id);
            first.update_children_parent()?;
            second.update_children_parent()?;
            first.commit()?;
            second.commit()?;

            self.info.root = root_id;
            self.info.height += 1;
            op.budget.grow();
            log::debug!("Root split, new root {} at height {}", root_id, self.info.height);
            return Ok(None);
        }

        first.set_parent(parent);
        second.set_parent(parent);
        first.update_children_parent()?;
        second.update_children_parent()?;
        first.commit()?;
        second.commit()?;

        Ok(Some(SplitResult {
            replaced: old_id,
            parent,
            first: cover_a,
            second: cover_b,
        }))
    }

    /// Links the two halves of a split into their parent at `level`.
    fn adjust_tree_on_level(&mut self, op: &mut Operation<C>, split: SplitResult<C>, level: usize) -> RTreeResult<()> {
        let mut parent = self.nodes.checkout(split.parent)?;
        let index = parent
            .find_child(split.replaced)
            .ok_or_else(|| missing_link(split.parent, split.replaced))?;
        parent.set_entry(index, split.first);

        if parent.is_full() {
            return self.overflow_treatment(op, parent, split.second, level);
        }
        parent.add_child(split.second);
        parent.commit()
    }

    fn drain(&mut self, op: &mut Operation<C>) -> RTreeResult<()> {
        while let Some(pending) = op.pending.pop_front() {
            if pending.level > self.height() {
                self.dissolve_subtree_root(op, pending.entry, pending.level)?;
                continue;
            }
            self.insert_on_level(op, pending.entry, pending.level)?;
        }
        Ok(())
    }

    /// The root collapsed below `level`, so the subtree `entry` points to
    /// has no parent level left. Its node is freed and its entries are
    /// queued one level down.
    fn dissolve_subtree_root(
        &mut self,
        op: &mut Operation<C>,
        entry: Rectangle<C>,
        level: usize,
    ) -> RTreeResult<()> {
        let mut node = self.nodes.checkout(entry.id())?;
        for child in node.take_entries() {
            op.defer(child, level - 1);
        }
        node.discard();
        log::trace!("Dissolved orphaned node {} from level {}", node.id(), level);
        node.commit()
    }

    /// Surfaces errors deferred by guards released in `Drop`.
    fn finish<T>(&self, result: RTreeResult<T>) -> RTreeResult<T> {
        let deferred = self.nodes.take_deferred();
        let value = result?;
        deferred?;
        Ok(value)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Removes a rectangle equal to `r` (same id and corners).
    ///
    /// Fails with [`RTreeError::NotFound`] if no such rectangle is stored;
    /// the tree is left unchanged in that case.
    pub fn remove(&mut self, r: &Rectangle<C>) -> RTreeResult<()> {
        let leaf_id = match self.find_leaf(r)? {
            Some(id) => id,
            None => {
                log::warn!("Object to be deleted not found: {}", r);
                if log::log_enabled!(log::Level::Debug) {
                    let check = self.check_tree()?;
                    log::debug!("Tree after failed removal: {}", check);
                }
                return Err(RTreeError::NotFound { id: r.id() });
            }
        };

        let mut op = Operation::new(self.height());
        let mut leaf = self.nodes.checkout(leaf_id)?;
        leaf.remove_child(r);
        self.info.total_objects = self.info.total_objects.saturating_sub(1);
        let result = self
            .condense_tree(&mut op, leaf)
            .and_then(|_| self.drain(&mut op));
        self.finish(result)
    }

    /// Like [`remove`](Self::remove), returning `false` instead of
    /// `NotFound`.
    pub fn try_remove(&mut self, r: &Rectangle<C>) -> RTreeResult<bool> {
        match self.remove(r) {
            Ok(()) => Ok(true),
            Err(RTreeError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Leaf holding an entry equal to `r`.
    fn find_leaf(&self, r: &Rectangle<C>) -> RTreeResult<Option<BlockId>> {
        let mut candidates = vec![self.info.root];
        while let Some(id) = candidates.pop() {
            let node = self.nodes.load(id)?;
            if node.is_leaf() {
                if node.entries().iter().any(|e| e == r) {
                    return Ok(Some(id));
                }
            } else {
                candidates.extend(node.entries().iter().filter(|e| e.contains(r)).map(|e| e.id()));
            }
        }
        Ok(None)
    }

    /// Walks from `leaf` to the root, dissolving underfull nodes and
    /// tightening covers. Entries of dissolved nodes are queued for
    /// reinsertion at their level. The root is then collapsed until it is
    /// a leaf or has at least two children.
    fn condense_tree(&mut self, op: &mut Operation<C>, leaf: NodeGuard<C>) -> RTreeResult<()> {
        let mut node = leaf;
        let mut level = 0;
        while !node.is_root() {
            let mut parent = self.nodes.checkout(node.parent())?;
            let index = parent
                .find_child(node.id())
                .ok_or_else(|| missing_link(parent.id(), node.id()))?;

            if node.is_underfull() {
                for entry in node.take_entries() {
                    op.defer(entry, level);
                }
                parent.remove_child_at(index);
                node.discard();
                log::trace!("Dissolved node {} at level {}", node.id(), level);
            } else if let Some(cover) = node.exact_cover() {
                parent.set_entry(index, cover);
            }

            node.commit()?;
            node = parent;
            level += 1;
        }

        self.collapse_root(node)
    }

    /// Hands the root role down while the root is internal with at most one
    /// child. An internal root left without children becomes an empty leaf.
    fn collapse_root(&mut self, mut root: NodeGuard<C>) -> RTreeResult<()> {
        while !root.is_leaf() && root.len() <= 1 {
            if root.is_empty() {
                root.set_flags(NodeFlags::ROOT | NodeFlags::LEAF);
                self.info.height = 0;
                log::debug!("Root {} lost its last child, now an empty leaf", root.id());
                break;
            }

            let child = root.entry(0).id();
            root.discard();
            root.commit()?;

            let mut next = self.nodes.checkout(child)?;
            let mut flags = next.flags();
            flags.insert(NodeFlags::ROOT);
            next.set_flags(flags);
            next.set_parent(child);

            self.info.root = child;
            self.info.height = self.info.height.saturating_sub(1);
            log::debug!("Root shrank to {} at height {}", child, self.info.height);
            root = next;
        }
        root.commit()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All stored rectangles intersecting `bbox` (closed intervals). With
    /// `brute_force` every stored rectangle is returned.
    pub fn query(&self, bbox: &Rectangle<C>, brute_force: bool) -> RTreeResult<Vec<Rectangle<C>>> {
        let mut matches = Vec::new();
        self.query_with(bbox, brute_force, |r| {
            matches.push(*r);
            Ok(())
        })?;
        Ok(matches)
    }

    /// Appends matches to an external sequence, returning how many were
    /// appended.
    pub fn query_into(
        &self,
        bbox: &Rectangle<C>,
        brute_force: bool,
        matches: &mut ExternalSequence<Rectangle<C>>,
    ) -> RTreeResult<u64> {
        self.query_with(bbox, brute_force, |r| matches.append(r))
    }

    /// Calls `emit` for every match.
    pub fn query_with<F>(&self, bbox: &Rectangle<C>, brute_force: bool, mut emit: F) -> RTreeResult<u64>
    where
        F: FnMut(&Rectangle<C>) -> RTreeResult<()>,
    {
        let mut candidates = vec![self.info.root];
        let mut matched = 0u64;
        while let Some(id) = candidates.pop() {
            let node = self.nodes.load(id)?;
            let hits = node.entries().iter().filter(|e| brute_force || e.intersects(bbox));
            if node.is_leaf() {
                for entry in hits {
                    emit(entry)?;
                    matched += 1;
                }
            } else {
                candidates.extend(hits.map(|e| e.id()));
            }
        }
        if brute_force {
            log::debug!("Scanned {} objects", matched);
        }
        Ok(matched)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Walks the whole tree breadth-first and reports every structural
    /// inconsistency it finds. Each issue is also logged as a warning.
    pub fn check_tree(&self) -> RTreeResult<TreeCheck<C>> {
        let height = self.height();
        let root = self.info.root;
        let mut issues = Vec::new();
        let mut objects = 0u64;
        let mut nodes = 0u64;
        let mut visited = HashSet::new();

        let mut queue: VecDeque<(BlockId, Option<Rectangle<C>>, BlockId, usize)> = VecDeque::new();
        queue.push_back((root, None, root, 0));

        while let Some((id, stored, expected_parent, depth)) = queue.pop_front() {
            if !visited.insert(id) {
                log::warn!("Node {} reachable more than once", id);
                continue;
            }
            let node = self.nodes.load(id)?;
            nodes += 1;

            let is_root = id == root;
            if node.is_root() != is_root {
                issues.push(TreeIssue::RootFlag { node: id });
            }
            if node.parent() != expected_parent {
                issues.push(TreeIssue::ParentMismatch {
                    node: id,
                    expected: expected_parent,
                    found: node.parent(),
                });
            }
            if let Some(stored) = stored {
                let actual = node.exact_cover();
                if !actual.is_some_and(|a| a.same_extent(&stored)) {
                    issues.push(TreeIssue::CoverMismatch {
                        node: id,
                        stored,
                        actual,
                    });
                }
            }
            if !is_root && (node.len() < self.min_fanout() || node.len() > self.fanout()) {
                issues.push(TreeIssue::Fanout {
                    node: id,
                    entries: node.len(),
                });
            }
            if is_root && !node.is_leaf() && node.len() < 2 {
                issues.push(TreeIssue::RootUnderfull {
                    node: id,
                    entries: node.len(),
                });
            }
            if node.is_leaf() != (depth == height) {
                issues.push(TreeIssue::Depth { node: id, depth });
            }

            if node.is_leaf() {
                objects += node.len() as u64;
            } else if depth < height {
                for entry in node.entries() {
                    queue.push_back((entry.id(), Some(*entry), id, depth + 1));
                }
            }
        }

        if objects != self.info.total_objects {
            issues.push(TreeIssue::ObjectCount {
                counted: objects,
                recorded: self.info.total_objects,
            });
        }
        for issue in &issues {
            log::warn!("{}", issue);
        }

        let check = TreeCheck { objects, nodes, issues };
        log::debug!("Tree check: {}", check);
        Ok(check)
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats::new(
            self.height(),
            self.nodes.block_count(),
            self.info.total_objects,
            self.fanout(),
        )
    }

    /// Block ids from the root down to node `id`, if it is reachable.
    pub fn find_node(&self, id: BlockId) -> RTreeResult<Option<Vec<BlockId>>> {
        let mut stack = vec![vec![self.info.root]];
        while let Some(path) = stack.pop() {
            let current = match path.last() {
                Some(&current) => current,
                None => continue,
            };
            if current == id {
                return Ok(Some(path));
            }
            let node = self.nodes.load(current)?;
            if !node.is_leaf() {
                for entry in node.entries() {
                    let mut next = path.clone();
                    next.push(entry.id());
                    stack.push(next);
                }
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Flushes buffered blocks and rewrites the metadata file.
    pub fn sync(&self) -> RTreeResult<()> {
        self.nodes.take_deferred()?;
        self.nodes.sync()?;
        self.write_info()
    }

    pub fn close(mut self) -> RTreeResult<()> {
        let result = self.shutdown();
        self.closed = true;
        result
    }

    fn shutdown(&mut self) -> RTreeResult<()> {
        match self.persistence {
            Persistence::Persist => self.sync(),
            Persistence::Delete => match &self.name {
                Some(name) => TreeInfo::remove(name),
                None => Ok(()),
            },
        }
    }

    fn write_info(&self) -> RTreeResult<()> {
        match &self.name {
            Some(name) if self.persistence == Persistence::Persist => self.info.write(name),
            _ => Ok(()),
        }
    }
}

fn missing_link(parent: BlockId, child: BlockId) -> RTreeError {
    log::error!("Node {} does not link child {}", parent, child);
    RTreeError::Corrupted(format!("node {} does not link child {}", parent, child))
}

impl<C: Coord> Drop for RStarTree<C> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.shutdown() {
                log::warn!("Failed to save tree {:?}: {}", self.name, e);
            }
        }
    }
}
