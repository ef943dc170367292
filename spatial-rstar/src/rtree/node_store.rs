//! Node (de)serialization and scoped node access.
//!
//! [`NodeStore::checkout`] hands out a [`NodeGuard`] that owns an in-memory
//! copy of a node. When the guard goes out of scope the node is written back
//! if it was modified, or its block is freed if the guard was discarded.
//! Errors raised while releasing a guard in `Drop` cannot be returned, so
//! they are logged and kept until the next [`NodeStore::take_deferred`].

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::node::{Node, NodeFlags};
use crate::constants::MIN_FANOUT_FACTOR;
use crate::error::{RTreeError, RTreeResult};
use crate::rectangle::{Coord, Rectangle};
use crate::storage::{BlockId, BlockStore, Persistence};

/// Block image of a node, borrowed for encoding.
#[derive(Serialize)]
struct NodeRecordRef<'a, C: Coord> {
    parent: BlockId,
    flags: u8,
    cover: Option<Rectangle<C>>,
    entries: &'a [Rectangle<C>],
}

/// Block image of a node.
#[derive(Deserialize)]
struct NodeRecord<C> {
    parent: BlockId,
    flags: u8,
    cover: Option<Rectangle<C>>,
    entries: Vec<Rectangle<C>>,
}

/// Bytes taken by one encoded rectangle
fn rectangle_len<C: Coord>() -> usize {
    8 + 4 * C::ENCODED_LEN
}

/// Minimum entries per non-root node for a given fanout.
pub fn min_fanout_for(fanout: usize) -> usize {
    (fanout as f64 / MIN_FANOUT_FACTOR) as usize
}

struct NodeStoreInner<C> {
    blocks: Box<dyn BlockStore>,
    fanout: usize,
    min_fanout: usize,
    deferred: Mutex<Option<RTreeError>>,
    _coord: PhantomData<fn() -> C>,
}

/// Shared handle to the blocks of one tree.
pub struct NodeStore<C: Coord> {
    inner: Arc<NodeStoreInner<C>>,
}

impl<C: Coord> Clone for NodeStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Coord> NodeStore<C> {
    pub fn new(blocks: Box<dyn BlockStore>, fanout: usize) -> Self {
        Self {
            inner: Arc::new(NodeStoreInner {
                blocks,
                fanout,
                min_fanout: min_fanout_for(fanout),
                deferred: Mutex::new(None),
                _coord: PhantomData,
            }),
        }
    }

    /// Number of entries a block of `block_size` bytes can hold.
    pub fn capacity_for(block_size: usize) -> usize {
        let rect = rectangle_len::<C>();
        // parent + flags + optional cover + entry count
        let header = 8 + 1 + (1 + rect) + 8;
        block_size.saturating_sub(header) / rect
    }

    pub fn fanout(&self) -> usize {
        self.inner.fanout
    }

    pub fn min_fanout(&self) -> usize {
        self.inner.min_fanout
    }

    pub fn block_count(&self) -> u64 {
        self.inner.blocks.block_count()
    }

    pub fn sync(&self) -> RTreeResult<()> {
        self.inner.blocks.sync()
    }

    pub fn set_persistence(&self, persistence: Persistence) {
        self.inner.blocks.set_persistence(persistence);
    }

    /// Allocates a block for a new, empty node. The node is written when
    /// the returned guard is released.
    pub fn allocate(&self, flags: NodeFlags) -> RTreeResult<NodeGuard<C>> {
        let id = self.inner.blocks.allocate()?;
        let node = Node::new(id, flags, self.inner.fanout, self.inner.min_fanout);
        Ok(NodeGuard {
            store: self.clone(),
            node,
            dirty: true,
            state: GuardState::Held,
        })
    }

    /// Reads a node for modification.
    pub fn checkout(&self, id: BlockId) -> RTreeResult<NodeGuard<C>> {
        let node = self.load(id)?;
        Ok(NodeGuard {
            store: self.clone(),
            node,
            dirty: false,
            state: GuardState::Held,
        })
    }

    /// Reads a node without taking responsibility for writing it back.
    pub fn load(&self, id: BlockId) -> RTreeResult<Node<C>> {
        let block = self.inner.blocks.read(id)?;
        let (record, _): (NodeRecord<C>, usize) =
            bincode::serde::decode_from_slice(&block, bincode::config::legacy()).map_err(|e| {
                log::error!("Block {} does not hold a node: {}", id, e);
                RTreeError::Corrupted(format!("block {} does not hold a node: {}", id, e))
            })?;
        Ok(Node::from_parts(
            id,
            record.parent,
            NodeFlags::from_bits(record.flags),
            record.cover,
            record.entries,
            self.inner.fanout,
            self.inner.min_fanout,
        ))
    }

    /// Writes a node to its block.
    pub fn store(&self, node: &Node<C>) -> RTreeResult<()> {
        let record = NodeRecordRef {
            parent: node.parent(),
            flags: node.flags().bits(),
            cover: node.cached_cover().filter(|c| c.id() == node.id()),
            entries: node.entries(),
        };
        let bytes = bincode::serde::encode_to_vec(&record, bincode::config::legacy())?;
        if bytes.len() > self.inner.blocks.capacity() {
            log::error!(
                "Node {} with {} entries overflows its block",
                node.id(),
                node.len()
            );
            return Err(RTreeError::Corrupted(format!(
                "node {} needs {} bytes, block holds {}",
                node.id(),
                bytes.len(),
                self.inner.blocks.capacity()
            )));
        }
        self.inner.blocks.write(node.id(), &bytes)
    }

    pub fn free(&self, id: BlockId) -> RTreeResult<()> {
        self.inner.blocks.free(id)
    }

    /// Points `child` at `parent` if it does not already.
    pub fn set_parent(&self, child: BlockId, parent: BlockId) -> RTreeResult<()> {
        let mut guard = self.checkout(child)?;
        if guard.parent() != parent {
            guard.set_parent(parent);
        }
        guard.commit()
    }

    fn defer(&self, err: RTreeError) {
        let mut slot = self.inner.deferred.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// Returns the first error recorded by a guard released in `Drop`.
    pub fn take_deferred(&self) -> RTreeResult<()> {
        match self.inner.deferred.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Guard
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Held,
    Discarded,
    Released,
}

/// Scoped, exclusive access to one node.
///
/// Mutable access marks the node dirty; a dirty node is written back when
/// the guard is committed or dropped. A discarded node has its block freed
/// instead.
pub struct NodeGuard<C: Coord> {
    store: NodeStore<C>,
    node: Node<C>,
    dirty: bool,
    state: GuardState,
}

impl<C: Coord> NodeGuard<C> {
    /// Frees the node's block on release instead of writing it.
    pub fn discard(&mut self) {
        self.state = GuardState::Discarded;
    }

    /// Releases the guard now, returning any storage error.
    pub fn commit(mut self) -> RTreeResult<()> {
        self.release()
    }

    fn release(&mut self) -> RTreeResult<()> {
        let state = std::mem::replace(&mut self.state, GuardState::Released);
        match state {
            GuardState::Held if self.dirty => self.store.store(&self.node),
            GuardState::Discarded => self.store.free(self.node.id()),
            _ => Ok(()),
        }
    }

    /// Points every child of an internal node back at this node.
    ///
    /// Children are checked out one at a time; none of them may be held by
    /// the caller.
    pub fn update_children_parent(&self) -> RTreeResult<()> {
        if self.node.is_leaf() {
            return Ok(());
        }
        let id = self.node.id();
        for entry in self.node.entries() {
            self.store.set_parent(entry.id(), id)?;
        }
        Ok(())
    }
}

impl<C: Coord> Deref for NodeGuard<C> {
    type Target = Node<C>;

    fn deref(&self) -> &Node<C> {
        &self.node
    }
}

impl<C: Coord> DerefMut for NodeGuard<C> {
    fn deref_mut(&mut self) -> &mut Node<C> {
        self.dirty = true;
        &mut self.node
    }
}

impl<C: Coord> Drop for NodeGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("Failed to release node {}: {}", self.node.id(), e);
            self.store.defer(e);
        }
    }
}
