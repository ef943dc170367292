//! Constants for the disk-resident R*-tree.

/// Default block size (8KB)
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Smallest block size a store accepts
pub const MIN_BLOCK_SIZE: usize = 512;

/// Default number of blocks held by the write-back cache
pub const DEFAULT_CACHE_BLOCKS: usize = 256;

/// Magic number for block files ("RSTR")
pub const MAGIC: u32 = 0x5253_5452;

/// Block file format version
pub const VERSION: u32 = 1;

/// Block id 0 holds the store header and never a node
pub const HEADER_BLOCK: u64 = 0;

/// `min_fanout = floor(fanout / MIN_FANOUT_FACTOR)`
pub const MIN_FANOUT_FACTOR: f64 = 2.5;

/// Smallest fanout for which splits always yield two non-empty groups
pub const MIN_FANOUT: usize = 3;

/// Share of entries a node keeps during forced reinsertion (percent)
pub const REINSERT_KEEP_PERCENT: usize = 70;

/// Default fanout used by the bulk loader
pub const DEFAULT_BULK_FANOUT: usize = 50;

/// Bulk-loaded nodes close at `fanout - 2` entries, so levels only shrink
/// from this fanout on
pub const MIN_BULK_FANOUT: usize = 4;

/// Largest scaled extent mapped onto the Hilbert grid (side at most 2^31)
pub const MAX_GRID_EXTENT: f64 = 2_147_483_647.0;

/// Records per in-memory run of the external sort
pub const DEFAULT_SORT_RUN_LEN: usize = 1 << 16;

/// A bulk-loaded node closes early only above this fill ratio...
pub const DEFAULT_MIN_PACKING_RATIO: f64 = 0.75;

/// ...and only if the next entry grows its area by more than this factor.
pub const DEFAULT_MAX_AREA_INCREASE: f64 = 1.20;

/// Number of nodes the repacking cache collects before repacking them
pub const REPACK_THRESHOLD: usize = 3;

/// Nodes left in the repacking cache between two repacking rounds
pub const REPACK_RESIDENT: usize = 2;

/// Side-record suffixes
pub const INFO_SUFFIX: &str = ".info";
pub const MBR_SUFFIX: &str = ".mbr";
pub const HILBERT_TREE_SUFFIX: &str = ".hrtree";
pub const PACKED_TREE_SUFFIX: &str = ".rstree";
