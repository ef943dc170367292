//! Minimum bounding rectangle of an input sequence and its `.mbr` cache.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::constants::MBR_SUFFIX;
use crate::error::{RTreeError, RTreeResult};
use crate::rectangle::{Coord, Rectangle};
use crate::rtree::side_path;
use crate::sequence::ExternalSequence;

pub fn mbr_cache_path(input: &Path) -> PathBuf {
    side_path(input, MBR_SUFFIX)
}

/// One pass over `input`. `None` for an empty sequence.
pub fn compute_mbr<C: Coord>(input: &mut ExternalSequence<Rectangle<C>>) -> RTreeResult<Option<Rectangle<C>>> {
    let mut mbr: Option<Rectangle<C>> = None;
    for r in input.scan()? {
        let r = r?;
        match mbr.as_mut() {
            Some(m) => m.extend(&r),
            None => mbr = Some(r.with_id(0)),
        }
    }
    Ok(mbr)
}

/// Reads the MBR cached next to `input`, if any.
pub fn read_mbr_cache<C: Coord>(input: &Path) -> RTreeResult<Option<Rectangle<C>>> {
    let bytes = match fs::read(mbr_cache_path(input)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let (mbr, _): (Rectangle<C>, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())?;
    Ok(Some(mbr))
}

/// Computes the MBR of the sequence at `input` and caches it in
/// `<input>.mbr`.
pub fn write_mbr_cache<C: Coord>(input: &Path) -> RTreeResult<Rectangle<C>> {
    let mut sequence = ExternalSequence::<Rectangle<C>>::open(input)?;
    let mbr = compute_mbr(&mut sequence)?.ok_or(RTreeError::EndOfInput)?;
    let bytes = bincode::serde::encode_to_vec(mbr, bincode::config::legacy())?;
    fs::write(mbr_cache_path(input), bytes)?;
    log::info!("MBR of {:?}: {}", input, mbr);
    Ok(mbr)
}

/// The cached MBR if present, otherwise one scan over `sequence`.
pub(crate) fn resolve_mbr<C: Coord>(
    input: &Path,
    sequence: &mut ExternalSequence<Rectangle<C>>,
) -> RTreeResult<Rectangle<C>> {
    if let Some(mbr) = read_mbr_cache(input)? {
        log::debug!("Using cached MBR {}", mbr);
        return Ok(mbr);
    }
    compute_mbr(sequence)?.ok_or(RTreeError::EndOfInput)
}
