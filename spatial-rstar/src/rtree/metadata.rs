//! Tree metadata kept in a `<name>.info` side file.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::INFO_SUFFIX;
use crate::error::RTreeResult;
use crate::storage::BlockId;

/// `path` with `suffix` appended to its file name.
pub(crate) fn side_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// What a tree needs besides its blocks to be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeInfo {
    pub root: BlockId,
    pub height: u32,
    pub total_objects: u64,
    pub fanout: u32,
}

impl TreeInfo {
    pub fn info_path(name: &Path) -> PathBuf {
        side_path(name, INFO_SUFFIX)
    }

    /// Reads the side file of `name`, `None` if there is none.
    pub fn read(name: &Path) -> RTreeResult<Option<TreeInfo>> {
        let bytes = match fs::read(Self::info_path(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (info, _): (TreeInfo, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())?;
        Ok(Some(info))
    }

    pub fn write(&self, name: &Path) -> RTreeResult<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::legacy())?;
        fs::write(Self::info_path(name), bytes)?;
        Ok(())
    }

    pub fn remove(name: &Path) -> RTreeResult<()> {
        match fs::remove_file(Self::info_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
