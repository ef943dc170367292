//! File-backed block store.
//!
//! Block 0 of the file holds the [`StoreHeader`]. Every other block is either
//! a live block owned by the tree or a free block whose first bytes encode a
//! [`FreeBlock`] pointing at the next free block. Reads and writes go through
//! a [`BlockCache`]; each cache miss costs exactly one seek and one read.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::block_cache::BlockCache;
use super::{BlockId, BlockStore, Persistence};
use crate::constants::{HEADER_BLOCK, MAGIC, MIN_BLOCK_SIZE, VERSION};
use crate::error::{RTreeError, RTreeResult};

/// Bookkeeping stored in block 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub magic: u32,
    pub version: u32,
    pub block_size: u32,
    /// First block id never handed out so far
    pub next_block: BlockId,
    /// Head of the free list, 0 if empty
    pub free_head: BlockId,
    pub live_blocks: u64,
}

impl StoreHeader {
    pub fn new(block_size: usize) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            block_size: block_size as u32,
            next_block: HEADER_BLOCK + 1,
            free_head: 0,
            live_blocks: 0,
        }
    }

    pub fn validate(&self) -> RTreeResult<()> {
        if self.magic != MAGIC {
            return Err(RTreeError::Corrupted("invalid block file (bad magic)".into()));
        }
        if self.version != VERSION {
            return Err(RTreeError::Corrupted(format!(
                "unsupported block file version {}",
                self.version
            )));
        }
        if (self.block_size as usize) < MIN_BLOCK_SIZE {
            return Err(RTreeError::Corrupted(format!(
                "block size {} below minimum",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Content of a released block
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FreeBlock {
    next_free: BlockId,
}

/// Block store backed by a single file.
pub struct FileBlockStore {
    file: RwLock<File>,
    path: PathBuf,
    block_size: usize,
    header: Mutex<StoreHeader>,
    cache: Mutex<BlockCache>,
    persistence: Mutex<Persistence>,
}

impl FileBlockStore {
    /// Creates (or truncates) a block file.
    pub fn create(path: impl AsRef<Path>, block_size: usize, cache_blocks: usize) -> RTreeResult<Self> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(RTreeError::InvalidConfiguration(format!(
                "block size {} is below the minimum of {} bytes",
                block_size, MIN_BLOCK_SIZE
            )));
        }
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let store = Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            block_size,
            header: Mutex::new(StoreHeader::new(block_size)),
            cache: Mutex::new(BlockCache::new(cache_blocks)),
            persistence: Mutex::new(Persistence::Persist),
        };
        store.write_header()?;
        log::debug!("Created block file {:?} ({} byte blocks)", path, block_size);
        Ok(store)
    }

    /// Opens an existing block file, taking the block size from its header.
    pub fn open(path: impl AsRef<Path>, cache_blocks: usize) -> RTreeResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut buffer = vec![0u8; MIN_BLOCK_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buffer)?;
        let (header, _): (StoreHeader, usize) =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())?;
        header.validate().map_err(|e| {
            log::error!("Cannot open block file {:?}: {}", path, e);
            e
        })?;

        log::debug!(
            "Opened block file {:?} ({} live blocks)",
            path,
            header.live_blocks
        );
        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            block_size: header.block_size as usize,
            header: Mutex::new(header),
            cache: Mutex::new(BlockCache::new(cache_blocks)),
            persistence: Mutex::new(Persistence::Persist),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current header
    pub fn header(&self) -> StoreHeader {
        self.header.lock().clone()
    }

    fn write_header(&self) -> RTreeResult<()> {
        let header = self.header.lock().clone();
        let mut bytes = bincode::serde::encode_to_vec(&header, bincode::config::legacy())?;
        bytes.resize(self.block_size, 0);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn check_id(&self, id: BlockId, next_block: BlockId) -> RTreeResult<()> {
        if id == HEADER_BLOCK {
            return Err(RTreeError::StorageIo(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Cannot access block 0 (reserved for header)",
            )));
        }
        if id >= next_block {
            return Err(RTreeError::StorageIo(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Block {} was never allocated", id),
            )));
        }
        Ok(())
    }

    /// One seek + one read
    fn read_raw(&self, id: BlockId) -> RTreeResult<Vec<u8>> {
        let offset = id * self.block_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; self.block_size];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_raw(&self, id: BlockId, data: &[u8]) -> RTreeResult<()> {
        let offset = id * self.block_size as u64;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Reads through the cache without validating the id.
    fn load_block(&self, id: BlockId) -> RTreeResult<Vec<u8>> {
        let mut cache = self.cache.lock();
        if let Some(data) = cache.get(id) {
            return Ok(data.to_vec());
        }
        let data = self.read_raw(id)?;
        if cache.is_enabled() {
            cache.insert(id, data.clone(), false);
            self.evict(&mut cache)?;
        }
        Ok(data)
    }

    /// Writes through the cache without validating the id.
    fn store_block(&self, id: BlockId, mut data: Vec<u8>) -> RTreeResult<()> {
        data.resize(self.block_size, 0);
        let mut cache = self.cache.lock();
        if !cache.is_enabled() {
            return self.write_raw(id, &data);
        }
        cache.insert(id, data, true);
        self.evict(&mut cache)
    }

    fn evict(&self, cache: &mut BlockCache) -> RTreeResult<()> {
        while cache.needs_eviction() {
            match cache.evict_oldest() {
                Some((id, data, true)) => self.write_raw(id, &data)?,
                Some(_) => {}
                None => break,
            }
        }
        Ok(())
    }

    fn flush_cache(&self) -> RTreeResult<()> {
        let dirty = self.cache.lock().take_dirty();
        for (id, data) in dirty {
            self.write_raw(id, &data)?;
        }
        Ok(())
    }
}

impl BlockStore for FileBlockStore {
    fn allocate(&self) -> RTreeResult<BlockId> {
        let mut header = self.header.lock();
        let id = if header.free_head != 0 {
            let id = header.free_head;
            let bytes = self.load_block(id)?;
            let (free, _): (FreeBlock, usize) =
                bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())?;
            header.free_head = free.next_free;
            id
        } else {
            let id = header.next_block;
            header.next_block += 1;
            id
        };
        header.live_blocks += 1;
        Ok(id)
    }

    fn read(&self, id: BlockId) -> RTreeResult<Vec<u8>> {
        let next_block = self.header.lock().next_block;
        self.check_id(id, next_block)?;
        self.load_block(id)
    }

    fn write(&self, id: BlockId, block: &[u8]) -> RTreeResult<()> {
        let next_block = self.header.lock().next_block;
        self.check_id(id, next_block)?;
        if block.len() > self.block_size {
            log::error!("Block {} overflow: {} bytes", id, block.len());
            return Err(RTreeError::StorageIo(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Block too large: {} bytes (max {})",
                    block.len(),
                    self.block_size
                ),
            )));
        }
        self.store_block(id, block.to_vec())
    }

    fn free(&self, id: BlockId) -> RTreeResult<()> {
        let mut header = self.header.lock();
        self.check_id(id, header.next_block)?;
        let free = FreeBlock {
            next_free: header.free_head,
        };
        let bytes = bincode::serde::encode_to_vec(free, bincode::config::legacy())?;
        self.store_block(id, bytes)?;
        header.free_head = id;
        header.live_blocks = header.live_blocks.saturating_sub(1);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.block_size
    }

    fn set_persistence(&self, persistence: Persistence) {
        *self.persistence.lock() = persistence;
    }

    fn block_count(&self) -> u64 {
        self.header.lock().live_blocks
    }

    fn sync(&self) -> RTreeResult<()> {
        self.flush_cache()?;
        self.write_header()?;
        self.file.write().sync_all()?;
        Ok(())
    }
}

impl Drop for FileBlockStore {
    fn drop(&mut self) {
        match *self.persistence.lock() {
            Persistence::Delete => {
                self.cache.lock().clear();
                if let Err(e) = fs::remove_file(&self.path) {
                    log::warn!("Failed to remove block file {:?}: {}", self.path, e);
                }
            }
            Persistence::Persist => {
                // Best effort, callers that care sync explicitly
                if let Err(e) = self.sync() {
                    log::warn!("Failed to sync block file {:?}: {}", self.path, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 1024, 8).unwrap();
        assert!(path.exists());
        assert_eq!(store.capacity(), 1024);
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn test_store_rejects_small_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        assert!(matches!(
            FileBlockStore::create(&path, 16, 8),
            Err(RTreeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_store_write_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 1024, 8).unwrap();

        let id = store.allocate().unwrap();
        assert_eq!(id, 1);
        store.write(id, b"hello").unwrap();

        let block = store.read(id).unwrap();
        assert_eq!(block.len(), 1024);
        assert_eq!(&block[..5], b"hello");
    }

    #[test]
    fn test_store_block_zero_reserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 1024, 8).unwrap();
        assert!(store.read(0).is_err());
        assert!(store.write(0, b"x").is_err());
    }

    #[test]
    fn test_store_unallocated_block_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 1024, 8).unwrap();
        assert!(store.read(5).is_err());
    }

    #[test]
    fn test_store_oversized_write_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 512, 8).unwrap();
        let id = store.allocate().unwrap();
        assert!(store.write(id, &vec![1u8; 513]).is_err());
    }

    #[test]
    fn test_store_free_list_reuse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 512, 8).unwrap();

        let a = store.allocate().unwrap();
        let b = store.allocate().unwrap();
        let c = store.allocate().unwrap();
        assert_eq!(store.block_count(), 3);

        store.free(b).unwrap();
        store.free(a).unwrap();
        assert_eq!(store.block_count(), 1);

        // LIFO reuse through the chained free list
        assert_eq!(store.allocate().unwrap(), a);
        assert_eq!(store.allocate().unwrap(), b);
        assert_eq!(store.allocate().unwrap(), c + 1);
    }

    #[test]
    fn test_store_reopen_after_sync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        {
            let store = FileBlockStore::create(&path, 512, 2).unwrap();
            for i in 0..10u8 {
                let id = store.allocate().unwrap();
                store.write(id, &[i; 4]).unwrap();
            }
            store.free(3).unwrap();
            store.sync().unwrap();
        }

        let store = FileBlockStore::open(&path, 2).unwrap();
        assert_eq!(store.capacity(), 512);
        assert_eq!(store.block_count(), 9);
        assert_eq!(&store.read(10).unwrap()[..4], &[9u8; 4]);
        assert_eq!(store.allocate().unwrap(), 3);
    }

    #[test]
    fn test_store_without_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let store = FileBlockStore::create(&path, 512, 0).unwrap();
        let id = store.allocate().unwrap();
        store.write(id, b"direct").unwrap();
        assert_eq!(&store.read(id).unwrap()[..6], b"direct");
    }

    #[test]
    fn test_store_delete_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scratch.blocks");
        {
            let store = FileBlockStore::create(&path, 512, 4).unwrap();
            store.allocate().unwrap();
            store.set_persistence(Persistence::Delete);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.blocks");
        fs::write(&path, vec![0xAB; 1024]).unwrap();
        assert!(FileBlockStore::open(&path, 4).is_err());
    }
}
