//! Bottom-up construction of an R*-tree from a sequence of rectangles.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::hilbert::{HilbertEntry, HilbertGrid};
use super::mbr::resolve_mbr;
use super::repack::RepackCache;
use crate::config::BulkLoadConfig;
use crate::constants::{HILBERT_TREE_SUFFIX, MIN_BULK_FANOUT, PACKED_TREE_SUFFIX, REPACK_RESIDENT};
use crate::error::{RTreeError, RTreeResult};
use crate::rectangle::{Coord, Rectangle};
use crate::rtree::{is_full_at, side_path, NodeFlags, NodeStore, RStarTree, TreeInfo};
use crate::sequence::ExternalSequence;
use crate::storage::{FileBlockStore, Persistence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packing {
    /// Nodes are consecutive runs of the Hilbert order.
    Hilbert,
    /// Closed nodes pass through a [`RepackCache`].
    Repacked,
}

/// Builds trees from a file-backed sequence of rectangles.
///
/// Both strategies sort the input by the Hilbert value of each rectangle's
/// centre and fill nodes level by level. The packed strategy additionally
/// redistributes the entries of neighbouring nodes with the split heuristic.
///
/// ```no_run
/// use spatial_rstar::{BulkLoadConfig, BulkLoader};
///
/// let loader: BulkLoader = BulkLoader::new("/data/parcels.seq", BulkLoadConfig::new());
/// let tree = loader.build_packed("/data/parcels.tree")?;
/// println!("{}", tree.stats());
/// # Ok::<(), spatial_rstar::RTreeError>(())
/// ```
pub struct BulkLoader<C: Coord = f64> {
    input: PathBuf,
    config: BulkLoadConfig,
    _coord: PhantomData<fn() -> C>,
}

impl<C: Coord> BulkLoader<C> {
    pub fn new(input: impl AsRef<Path>, config: BulkLoadConfig) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            config,
            _coord: PhantomData,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn config(&self) -> &BulkLoadConfig {
        &self.config
    }

    /// Builds a tree at `name` by packing the Hilbert-sorted input.
    pub fn build_hilbert(&self, name: impl AsRef<Path>) -> RTreeResult<RStarTree<C>> {
        self.build(name.as_ref(), Packing::Hilbert)
    }

    /// Builds a tree at `name`, repacking neighbouring nodes as they close.
    pub fn build_packed(&self, name: impl AsRef<Path>) -> RTreeResult<RStarTree<C>> {
        self.build(name.as_ref(), Packing::Repacked)
    }

    /// [`build_hilbert`](Self::build_hilbert) into `<input>.hrtree`,
    /// reusing that tree if it was already built.
    pub fn build_hilbert_file(&self) -> RTreeResult<RStarTree<C>> {
        self.build_file(HILBERT_TREE_SUFFIX, Packing::Hilbert)
    }

    /// [`build_packed`](Self::build_packed) into `<input>.rstree`, reusing
    /// that tree if it was already built.
    pub fn build_packed_file(&self) -> RTreeResult<RStarTree<C>> {
        self.build_file(PACKED_TREE_SUFFIX, Packing::Repacked)
    }

    fn build_file(&self, suffix: &str, packing: Packing) -> RTreeResult<RStarTree<C>> {
        let name = side_path(&self.input, suffix);
        if name.exists() && TreeInfo::info_path(&name).exists() {
            log::info!("Reusing tree {:?}", name);
            return RStarTree::open_with_config(&name, self.config.tree_config());
        }
        self.build(&name, packing)
    }

    fn build(&self, name: &Path, packing: Packing) -> RTreeResult<RStarTree<C>> {
        let tree_config = self.config.tree_config();
        tree_config.validate_block_size()?;
        let capacity = NodeStore::<C>::capacity_for(tree_config.get_block_size());
        let mut fanout = tree_config.resolve_fanout(capacity)?;
        if fanout < MIN_BULK_FANOUT {
            log::warn!("Bulk loading needs fanout {}, raising it from {}", MIN_BULK_FANOUT, fanout);
            fanout = MIN_BULK_FANOUT;
        }

        let mut input = ExternalSequence::<Rectangle<C>>::open(&self.input)?;
        if input.is_empty() {
            log::warn!("Bulk load input {:?} is empty", self.input);
            return Err(RTreeError::EndOfInput);
        }
        let mbr = resolve_mbr(&self.input, &mut input)?;
        let grid = HilbertGrid::new(&mbr);
        log::debug!("Hilbert grid of side {} over {}", grid.side(), mbr);

        let mut sorted = self.scratch::<HilbertEntry<C>>()?;
        for r in input.scan()? {
            sorted.append(&grid.entry(r?))?;
        }
        drop(input);
        sorted.sort_by_key(|e| e.hilbert, self.config.get_sort_run_len())?;

        let blocks = FileBlockStore::create(name, tree_config.get_block_size(), tree_config.get_cache_blocks())?;
        let nodes = NodeStore::new(Box::new(blocks), fanout);
        let info = match self.pack(&nodes, &grid, &mut sorted, packing) {
            Ok(info) => info,
            Err(e) => {
                log::error!("Bulk load into {:?} failed: {}", name, e);
                nodes.set_persistence(Persistence::Delete);
                TreeInfo::remove(name)?;
                return Err(e);
            }
        };

        let mut tree = RStarTree::from_parts(Some(name.to_path_buf()), nodes, info);
        if let Err(e) = tree.sync() {
            log::error!("Failed to save bulk loaded tree {:?}: {}", name, e);
            tree.set_persistence(Persistence::Delete);
            return Err(e);
        }
        log::info!(
            "Bulk loaded {} objects into {:?}: height {}, {} nodes",
            tree.total_objects(),
            name,
            tree.height(),
            tree.stats().node_count
        );
        Ok(tree)
    }

    /// Writes every level bottom-up and marks the last node as the root.
    fn pack(
        &self,
        nodes: &NodeStore<C>,
        grid: &HilbertGrid,
        sorted: &mut ExternalSequence<HilbertEntry<C>>,
        packing: Packing,
    ) -> RTreeResult<TreeInfo> {
        let mut level = 0;
        let mut builder = LevelBuilder::new(nodes, grid, &self.config, level, packing, self.scratch()?);
        for entry in sorted.scan()? {
            builder.push(entry?.rect)?;
        }
        let total_objects = sorted.len();
        let mut upper = builder.finish()?;

        while upper.len() > 1 {
            level += 1;
            let mut builder = LevelBuilder::new(nodes, grid, &self.config, level, packing, self.scratch()?);
            for cover in upper.scan()? {
                builder.push(cover?)?;
            }
            upper = builder.finish()?;
        }

        let root_id = match upper.scan()?.next() {
            Some(cover) => cover?.id(),
            None => return Err(RTreeError::Corrupted("bulk load produced no root".to_string())),
        };
        let mut root = nodes.checkout(root_id)?;
        let mut flags = root.flags();
        flags.insert(NodeFlags::ROOT);
        root.set_flags(flags);
        root.set_parent(root_id);
        root.commit()?;

        Ok(TreeInfo {
            root: root_id,
            height: level as u32,
            total_objects,
            fanout: nodes.fanout() as u32,
        })
    }

    fn scratch<T: Serialize + DeserializeOwned>(&self) -> RTreeResult<ExternalSequence<T>> {
        match self.config.get_temp_dir() {
            Some(dir) => ExternalSequence::temporary_in(dir),
            None => ExternalSequence::temporary(),
        }
    }
}

/// Fills the nodes of one level from a stream of entries in Hilbert order
/// and collects their covers for the level above.
struct LevelBuilder<'a, C: Coord> {
    nodes: &'a NodeStore<C>,
    grid: &'a HilbertGrid,
    level: usize,
    fanout: usize,
    min_fanout: usize,
    min_packing: usize,
    max_area_increase: f64,
    current: Vec<Rectangle<C>>,
    bbox: Option<Rectangle<C>>,
    repack: Option<RepackCache<C>>,
    // The last closed nodes, kept back to balance the end of the level
    held: VecDeque<Vec<Rectangle<C>>>,
    upper: ExternalSequence<Rectangle<C>>,
    written: u64,
}

impl<'a, C: Coord> LevelBuilder<'a, C> {
    fn new(
        nodes: &'a NodeStore<C>,
        grid: &'a HilbertGrid,
        config: &BulkLoadConfig,
        level: usize,
        packing: Packing,
        upper: ExternalSequence<Rectangle<C>>,
    ) -> Self {
        let fanout = nodes.fanout();
        let min_fanout = nodes.min_fanout();
        Self {
            nodes,
            grid,
            level,
            fanout,
            min_fanout,
            min_packing: (fanout as f64 * config.get_min_packing_ratio()) as usize,
            max_area_increase: config.get_max_area_increase(),
            current: Vec::with_capacity(fanout),
            bbox: None,
            repack: match packing {
                Packing::Hilbert => None,
                // Groups of two or more keep every level shrinking
                Packing::Repacked => Some(RepackCache::new(fanout, min_fanout.max(2))),
            },
            held: VecDeque::with_capacity(2),
            upper,
            written: 0,
        }
    }

    fn push(&mut self, r: Rectangle<C>) -> RTreeResult<()> {
        if self.should_close(&r) {
            let entries = std::mem::take(&mut self.current);
            self.bbox = None;
            self.close(entries)?;
        }
        match self.bbox.as_mut() {
            Some(bbox) => bbox.extend(&r),
            None => self.bbox = Some(r),
        }
        self.current.push(r);
        Ok(())
    }

    /// A node closes when it is full, or when it is well filled and `next`
    /// would blow up its area.
    fn should_close(&self, next: &Rectangle<C>) -> bool {
        let len = self.current.len();
        if len == 0 {
            return false;
        }
        if is_full_at(len, self.fanout) {
            return true;
        }
        match &self.bbox {
            Some(bbox) if len > self.min_packing => {
                bbox.extended_area(next) / bbox.area() > self.max_area_increase
            }
            _ => false,
        }
    }

    fn close(&mut self, entries: Vec<Rectangle<C>>) -> RTreeResult<()> {
        let ready = match self.repack.as_mut() {
            Some(cache) => {
                cache.push(entries, self.grid);
                let mut ready = Vec::new();
                while cache.len() > REPACK_RESIDENT {
                    if let Some(entries) = cache.pop() {
                        ready.push(entries);
                    }
                }
                ready
            }
            None => vec![entries],
        };
        for entries in ready {
            self.emit(entries)?;
        }
        Ok(())
    }

    fn emit(&mut self, entries: Vec<Rectangle<C>>) -> RTreeResult<()> {
        self.held.push_back(entries);
        if self.held.len() > 2 {
            if let Some(entries) = self.held.pop_front() {
                self.write_node(entries)?;
            }
        }
        Ok(())
    }

    fn write_node(&mut self, entries: Vec<Rectangle<C>>) -> RTreeResult<()> {
        let flags = if self.level == 0 {
            NodeFlags::LEAF
        } else {
            NodeFlags::INTERNAL
        };
        let mut node = self.nodes.allocate(flags)?;
        node.set_entries(entries);
        let cover = node.covering_rectangle().ok_or_else(|| {
            RTreeError::Corrupted(format!("bulk loaded node {} is empty", node.id()))
        })?;
        node.update_children_parent()?;
        node.commit()?;
        self.upper.append(&cover)?;
        self.written += 1;
        Ok(())
    }

    /// Flushes the open node and the cache, balances the last two nodes
    /// and hands back the covers of the written nodes.
    fn finish(mut self) -> RTreeResult<ExternalSequence<Rectangle<C>>> {
        if !self.current.is_empty() {
            let entries = std::mem::take(&mut self.current);
            self.close(entries)?;
        }
        if let Some(mut cache) = self.repack.take() {
            cache.flush(self.grid);
            while let Some(entries) = cache.pop() {
                self.emit(entries)?;
            }
            log::trace!("Level {} ran {} repacking rounds", self.level, cache.rounds());
        }

        let last = self.held.pop_back();
        let prev = self.held.pop_front();
        match (prev, last) {
            (Some(prev), Some(last)) if last.len() < self.min_fanout => {
                for entries in balance_tail(prev, last, self.fanout) {
                    self.write_node(entries)?;
                }
            }
            (prev, last) => {
                for entries in prev.into_iter().chain(last) {
                    self.write_node(entries)?;
                }
            }
        }

        self.upper.flush()?;
        log::debug!("Level {} finished with {} nodes", self.level, self.written);
        Ok(self.upper)
    }
}

/// Merges an underfull last node into its predecessor, or spreads the
/// combined entries evenly over two nodes when they do not fit one.
fn balance_tail<C: Coord>(
    mut prev: Vec<Rectangle<C>>,
    last: Vec<Rectangle<C>>,
    fanout: usize,
) -> Vec<Vec<Rectangle<C>>> {
    prev.extend(last);
    if prev.len() < fanout {
        return vec![prev];
    }
    let second = prev.split_off(prev.len() / 2);
    vec![prev, second]
}
