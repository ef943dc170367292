//! Bulk loading of R*-trees from file-backed rectangle sequences.

mod hilbert;
mod loader;
mod mbr;
mod repack;

pub use hilbert::{xy2d, HilbertEntry, HilbertGrid};
pub use loader::BulkLoader;
pub use mbr::{compute_mbr, mbr_cache_path, read_mbr_cache, write_mbr_cache};
pub use repack::RepackCache;
