//! In-memory block store.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{BlockId, BlockStore, Persistence};
use crate::constants::{HEADER_BLOCK, MIN_BLOCK_SIZE};
use crate::error::{RTreeError, RTreeResult};

struct MemoryState {
    blocks: HashMap<BlockId, Vec<u8>>,
    free: Vec<BlockId>,
    next_block: BlockId,
}

/// Block store that keeps every block in a hash map.
///
/// Nothing survives the process, so the persistence flag is accepted and
/// ignored.
pub struct MemoryBlockStore {
    block_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryBlockStore {
    pub fn new(block_size: usize) -> RTreeResult<Self> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(RTreeError::InvalidConfiguration(format!(
                "block size {} is below the minimum of {} bytes",
                block_size, MIN_BLOCK_SIZE
            )));
        }
        Ok(Self {
            block_size,
            state: Mutex::new(MemoryState {
                blocks: HashMap::new(),
                free: Vec::new(),
                next_block: HEADER_BLOCK + 1,
            }),
        })
    }
}

fn missing(id: BlockId) -> RTreeError {
    RTreeError::StorageIo(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("Block {} is not allocated", id),
    ))
}

impl BlockStore for MemoryBlockStore {
    fn allocate(&self) -> RTreeResult<BlockId> {
        let mut state = self.state.lock();
        let id = match state.free.pop() {
            Some(id) => id,
            None => {
                let id = state.next_block;
                state.next_block += 1;
                id
            }
        };
        state.blocks.insert(id, vec![0u8; self.block_size]);
        Ok(id)
    }

    fn read(&self, id: BlockId) -> RTreeResult<Vec<u8>> {
        self.state.lock().blocks.get(&id).cloned().ok_or_else(|| missing(id))
    }

    fn write(&self, id: BlockId, block: &[u8]) -> RTreeResult<()> {
        if block.len() > self.block_size {
            return Err(RTreeError::StorageIo(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Block too large: {} bytes (max {})", block.len(), self.block_size),
            )));
        }
        let mut state = self.state.lock();
        let slot = state.blocks.get_mut(&id).ok_or_else(|| missing(id))?;
        slot.clear();
        slot.extend_from_slice(block);
        slot.resize(self.block_size, 0);
        Ok(())
    }

    fn free(&self, id: BlockId) -> RTreeResult<()> {
        let mut state = self.state.lock();
        state.blocks.remove(&id).ok_or_else(|| missing(id))?;
        state.free.push(id);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.block_size
    }

    fn set_persistence(&self, _persistence: Persistence) {}

    fn block_count(&self) -> u64 {
        self.state.lock().blocks.len() as u64
    }

    fn sync(&self) -> RTreeResult<()> {
        Ok(())
    }
}
