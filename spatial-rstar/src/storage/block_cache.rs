//! LRU cache for raw blocks.
//!
//! The cache sits between a [`FileBlockStore`](super::FileBlockStore) and
//! its file. Writes land in the cache as dirty blocks and reach the file
//! when they are evicted or when the store is synced.

use std::collections::HashMap;
use std::collections::VecDeque;

use super::BlockId;

/// A cached block with its dirty flag
pub struct CachedBlock {
    pub data: Vec<u8>,
    pub dirty: bool,
}

/// LRU cache for blocks
pub struct BlockCache {
    blocks: HashMap<BlockId, CachedBlock>,
    /// LRU order (front = oldest, back = newest)
    lru_order: VecDeque<BlockId>,
    max_blocks: usize,
}

impl BlockCache {
    pub fn new(max_blocks: usize) -> Self {
        Self {
            blocks: HashMap::new(),
            lru_order: VecDeque::new(),
            max_blocks,
        }
    }

    /// A cache of size 0 stores nothing.
    pub fn is_enabled(&self) -> bool {
        self.max_blocks > 0
    }

    fn touch(&mut self, id: BlockId) {
        self.lru_order.retain(|&b| b != id);
        self.lru_order.push_back(id);
    }

    /// Looks up a block, marking it most recently used.
    pub fn get(&mut self, id: BlockId) -> Option<&[u8]> {
        if !self.blocks.contains_key(&id) {
            return None;
        }
        self.touch(id);
        self.blocks.get(&id).map(|cached| cached.data.as_slice())
    }

    /// Inserts or replaces a block. A dirty flag already set is kept.
    pub fn insert(&mut self, id: BlockId, data: Vec<u8>, dirty: bool) {
        self.touch(id);
        let was_dirty = self.blocks.get(&id).map(|c| c.dirty).unwrap_or(false);
        self.blocks.insert(
            id,
            CachedBlock {
                data,
                dirty: dirty || was_dirty,
            },
        );
    }

    pub fn needs_eviction(&self) -> bool {
        self.blocks.len() > self.max_blocks
    }

    /// Removes the least recently used block (id, data, dirty flag).
    pub fn evict_oldest(&mut self) -> Option<(BlockId, Vec<u8>, bool)> {
        while let Some(id) = self.lru_order.pop_front() {
            if let Some(cached) = self.blocks.remove(&id) {
                return Some((id, cached.data, cached.dirty));
            }
        }
        None
    }

    /// Takes a copy of every dirty block and marks them clean.
    pub fn take_dirty(&mut self) -> Vec<(BlockId, Vec<u8>)> {
        let mut dirty: Vec<_> = self
            .blocks
            .iter_mut()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, cached)| {
                cached.dirty = false;
                (*id, cached.data.clone())
            })
            .collect();
        dirty.sort_by_key(|(id, _)| *id);
        dirty
    }

    pub fn remove(&mut self, id: BlockId) -> Option<(Vec<u8>, bool)> {
        self.lru_order.retain(|&b| b != id);
        self.blocks.remove(&id).map(|c| (c.data, c.dirty))
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.lru_order.clear();
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }
}
