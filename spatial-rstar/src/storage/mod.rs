//! Block storage for tree nodes.
//!
//! A block store hands out fixed-capacity blocks identified by a [`BlockId`].
//! The tree never holds live pointers into storage: nodes refer to each other
//! by block id only, and every node access goes through `read`/`write`.
//!
//! Two implementations are provided:
//! - [`FileBlockStore`]: one file per tree, block `i` at offset
//!   `i * block_size`, a free list chained through released blocks and a
//!   write-back LRU cache in front of the file
//! - [`MemoryBlockStore`]: a hash map of blocks, for tests and scratch trees

mod block_cache;
mod file_store;
mod memory_store;

pub use block_cache::BlockCache;
pub use file_store::{FileBlockStore, StoreHeader};
pub use memory_store::MemoryBlockStore;

use crate::error::RTreeResult;

/// Identifier of a block inside a store. Block 0 is reserved.
pub type BlockId = u64;

/// What happens to a store's backing data once the store is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Keep the data (the default for named trees).
    Persist,
    /// Remove the data when the store goes away.
    Delete,
}

/// Fixed-capacity, id-addressed block storage.
pub trait BlockStore: Send + Sync {
    /// Reserves a block, reusing a released one when possible.
    fn allocate(&self) -> RTreeResult<BlockId>;

    /// Reads a whole block. The returned buffer is `capacity()` bytes long.
    fn read(&self, id: BlockId) -> RTreeResult<Vec<u8>>;

    /// Writes up to `capacity()` bytes into a block.
    fn write(&self, id: BlockId, block: &[u8]) -> RTreeResult<()>;

    /// Releases a block for reuse by a later `allocate`.
    fn free(&self, id: BlockId) -> RTreeResult<()>;

    /// Size of a block in bytes.
    fn capacity(&self) -> usize;

    fn set_persistence(&self, persistence: Persistence);

    /// Number of allocated (live) blocks.
    fn block_count(&self) -> u64;

    /// Pushes buffered blocks and bookkeeping to durable storage.
    fn sync(&self) -> RTreeResult<()>;
}
