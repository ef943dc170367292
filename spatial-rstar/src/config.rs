//! Configuration for trees and bulk loads.

use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_BULK_FANOUT, DEFAULT_CACHE_BLOCKS, DEFAULT_MAX_AREA_INCREASE,
    DEFAULT_MIN_PACKING_RATIO, DEFAULT_SORT_RUN_LEN, MIN_BLOCK_SIZE, MIN_FANOUT,
};
use crate::error::{RTreeError, RTreeResult};

/// Parameters of a tree's block file.
///
/// # Examples
///
/// ```rust
/// use spatial_rstar::TreeConfig;
///
/// let config = TreeConfig::new().fanout(16).block_size(4096).cache_blocks(64);
/// assert_eq!(config.requested_fanout(), Some(16));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    fanout: Option<usize>,
    block_size: usize,
    cache_blocks: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeConfig {
    /// Block-capacity fanout, 8KB blocks and a 256 block cache.
    pub fn new() -> Self {
        Self {
            fanout: None,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
        }
    }

    /// Maximum number of entries per node. Defaults to what fits in a block.
    pub fn fanout(mut self, fanout: usize) -> Self {
        self.fanout = Some(fanout);
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Number of blocks kept by the write-back cache, 0 disables it.
    pub fn cache_blocks(mut self, cache_blocks: usize) -> Self {
        self.cache_blocks = cache_blocks;
        self
    }

    pub fn requested_fanout(&self) -> Option<usize> {
        self.fanout
    }

    pub fn get_block_size(&self) -> usize {
        self.block_size
    }

    pub fn get_cache_blocks(&self) -> usize {
        self.cache_blocks
    }

    pub(crate) fn validate_block_size(&self) -> RTreeResult<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            log::error!("Block size {} below minimum {}", self.block_size, MIN_BLOCK_SIZE);
            return Err(RTreeError::InvalidConfiguration(format!(
                "block size {} is below the minimum of {} bytes",
                self.block_size, MIN_BLOCK_SIZE
            )));
        }
        Ok(())
    }

    /// Resolves the effective fanout for blocks holding `capacity` entries.
    pub(crate) fn resolve_fanout(&self, capacity: usize) -> RTreeResult<usize> {
        let fanout = match self.fanout {
            None => capacity,
            Some(0) => {
                return Err(RTreeError::InvalidConfiguration(
                    "fanout must be positive".to_string(),
                ))
            }
            Some(f) if f > capacity => {
                log::error!("Fanout {} exceeds block capacity {}", f, capacity);
                return Err(RTreeError::InvalidConfiguration(format!(
                    "fanout {} does not fit into a {} byte block (capacity {})",
                    f, self.block_size, capacity
                )));
            }
            Some(f) => f,
        };

        if fanout < MIN_FANOUT {
            if capacity < MIN_FANOUT {
                return Err(RTreeError::InvalidConfiguration(format!(
                    "block size {} holds fewer than {} entries",
                    self.block_size, MIN_FANOUT
                )));
            }
            log::warn!("Fanout {} raised to {}", fanout, MIN_FANOUT);
            return Ok(MIN_FANOUT);
        }
        Ok(fanout)
    }
}

/// Parameters of a bulk load.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoadConfig {
    tree: TreeConfig,
    sort_run_len: usize,
    temp_dir: Option<PathBuf>,
    min_packing_ratio: f64,
    max_area_increase: f64,
}

impl Default for BulkLoadConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkLoadConfig {
    pub fn new() -> Self {
        Self {
            tree: TreeConfig::new().fanout(DEFAULT_BULK_FANOUT),
            sort_run_len: DEFAULT_SORT_RUN_LEN,
            temp_dir: None,
            min_packing_ratio: DEFAULT_MIN_PACKING_RATIO,
            max_area_increase: DEFAULT_MAX_AREA_INCREASE,
        }
    }

    /// Configuration of the tree being built.
    pub fn tree(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    pub fn fanout(mut self, fanout: usize) -> Self {
        self.tree = self.tree.fanout(fanout);
        self
    }

    /// Records sorted in memory before a run is spilled to disk.
    pub fn sort_run_len(mut self, sort_run_len: usize) -> Self {
        self.sort_run_len = sort_run_len.max(1);
        self
    }

    /// Directory for temporary sequences, the system default if unset.
    pub fn temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn min_packing_ratio(mut self, ratio: f64) -> Self {
        self.min_packing_ratio = ratio;
        self
    }

    pub fn max_area_increase(mut self, factor: f64) -> Self {
        self.max_area_increase = factor;
        self
    }

    pub fn tree_config(&self) -> &TreeConfig {
        &self.tree
    }

    pub fn get_sort_run_len(&self) -> usize {
        self.sort_run_len
    }

    pub fn get_temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn get_min_packing_ratio(&self) -> f64 {
        self.min_packing_ratio
    }

    pub fn get_max_area_increase(&self) -> f64 {
        self.max_area_increase
    }
}
