//! # Spatial R*-tree - Disk-Resident Rectangle Index
//!
//! This crate provides a dynamic R*-tree whose nodes live in fixed-size
//! blocks on disk, together with two bulk loaders that build a tree from a
//! file-backed sequence of rectangles.
//!
//! ## Features
//!
//! - **Disk-Based Storage**: Nodes stored in blocks, loaded on demand
//! - **Block Cache**: Write-back LRU cache in front of the block file
//! - **R\* Insertion**: Forced reinsertion and margin/overlap driven splits
//! - **Guttman Deletion**: Underfull nodes are dissolved and reinserted
//! - **Bulk Loading**: Hilbert-sorted packing, with optional repacking
//! - **Consistency Checks**: Structural verification and statistics
//!
//! ## R*-Tree API
//!
//! ```rust,no_run
//! use spatial_rstar::{RStarTree, Rectangle};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree: RStarTree = RStarTree::open("/tmp/buildings", 50)?;
//!
//! tree.insert(Rectangle::new(1, 0.0, 0.0, 10.0, 10.0))?;
//! tree.insert(Rectangle::new(2, 20.0, 20.0, 30.0, 30.0))?;
//!
//! let hits = tree.query(&Rectangle::new(0, 5.0, 5.0, 15.0, 15.0), false)?;
//! assert_eq!(hits.len(), 1);
//!
//! tree.remove(&Rectangle::new(2, 20.0, 20.0, 30.0, 30.0))?;
//! assert!(tree.check_tree()?.is_valid());
//! tree.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Bulk Loading
//!
//! ```rust,no_run
//! use spatial_rstar::{BulkLoadConfig, BulkLoader, ExternalSequence, Rectangle};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut input = ExternalSequence::create("/tmp/buildings.seq")?;
//! for i in 0..10_000u64 {
//!     let x = (i % 100) as f64;
//!     let y = (i / 100) as f64;
//!     input.append(&Rectangle::new(i, x, y, x + 0.5, y + 0.5))?;
//! }
//! input.flush()?;
//!
//! let loader: BulkLoader = BulkLoader::new("/tmp/buildings.seq", BulkLoadConfig::new());
//! let tree = loader.build_packed_file()?;
//! println!("{}", tree.stats());
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod config;
pub mod constants;
pub mod error;
pub mod rectangle;
pub mod rtree;
pub mod sequence;
pub mod storage;

// Re-export tree types
pub use rtree::{Node, NodeFlags, RStarTree, TreeCheck, TreeInfo, TreeIssue, TreeStats};

// Re-export core types
pub use config::{BulkLoadConfig, TreeConfig};
pub use error::{RTreeError, RTreeResult};
pub use rectangle::{Coord, Rectangle};
pub use sequence::ExternalSequence;
pub use storage::{BlockId, BlockStore, FileBlockStore, MemoryBlockStore, Persistence};

// Re-export bulk loading
pub use bulk::{read_mbr_cache, write_mbr_cache, BulkLoader};
