//! File-backed sequences of records.
//!
//! An [`ExternalSequence`] is a flat file of bincode-encoded records. It is
//! the input format of the bulk loader and the sink for query results, and
//! it can be sorted without loading it into memory.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RTreeError, RTreeResult};
use crate::storage::Persistence;

/// An append-only, file-backed sequence of `T`.
pub struct ExternalSequence<T> {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    len: u64,
    persistence: Persistence,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> ExternalSequence<T> {
    /// Creates an empty sequence at `path`, truncating any existing file.
    pub fn create(path: impl AsRef<Path>) -> RTreeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            len: 0,
            persistence: Persistence::Persist,
            _marker: PhantomData,
        })
    }

    /// Opens an existing sequence. Appends go to its end.
    pub fn open(path: impl AsRef<Path>) -> RTreeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut sequence = Self {
            path,
            writer: None,
            len: 0,
            persistence: Persistence::Persist,
            _marker: PhantomData,
        };
        let mut len = 0;
        for record in sequence.scan()? {
            record?;
            len += 1;
        }
        sequence.len = len;
        Ok(sequence)
    }

    /// A sequence in the system temp directory, removed when dropped.
    pub fn temporary() -> RTreeResult<Self> {
        let path = tempfile::NamedTempFile::new()?
            .into_temp_path()
            .keep()
            .map_err(|e| RTreeError::StorageIo(e.error))?;
        Self::scratch(path)
    }

    /// A sequence in `dir`, removed when dropped.
    pub fn temporary_in(dir: impl AsRef<Path>) -> RTreeResult<Self> {
        let path = tempfile::Builder::new()
            .prefix("seq")
            .tempfile_in(dir)?
            .into_temp_path()
            .keep()
            .map_err(|e| RTreeError::StorageIo(e.error))?;
        Self::scratch(path)
    }

    fn scratch(path: PathBuf) -> RTreeResult<Self> {
        let mut sequence = Self::create(path)?;
        sequence.persistence = Persistence::Delete;
        Ok(sequence)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_persistence(&mut self, persistence: Persistence) {
        self.persistence = persistence;
    }

    pub fn append(&mut self, item: &T) -> RTreeResult<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new().append(true).open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        if let Some(writer) = self.writer.as_mut() {
            bincode::serde::encode_into_std_write(item, writer, bincode::config::legacy())?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> RTreeResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Reads the sequence from the start. Pending appends are flushed first.
    pub fn scan(&mut self) -> RTreeResult<Scan<T>> {
        self.flush()?;
        let file = File::open(&self.path)?;
        Ok(Scan {
            reader: BufReader::new(file),
            done: false,
            _marker: PhantomData,
        })
    }

    /// Sorts the sequence in place by `key`, keeping equal keys in their
    /// original order. At most `run_len` records are held in memory.
    pub fn sort_by_key<K, F>(&mut self, key: F, run_len: usize) -> RTreeResult<()>
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        if self.len <= 1 {
            return self.flush();
        }
        let run_len = run_len.max(1);
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        // Sorted runs
        let mut runs = Vec::new();
        let mut buffer: Vec<T> = Vec::with_capacity(run_len.min(self.len as usize));
        for record in self.scan()? {
            buffer.push(record?);
            if buffer.len() >= run_len {
                runs.push(Self::write_run(&mut buffer, &key, &dir)?);
            }
        }
        if !buffer.is_empty() {
            runs.push(Self::write_run(&mut buffer, &key, &dir)?);
        }
        log::debug!("Sorting {} records in {} runs", self.len, runs.len());

        // K-way merge
        let mut output = Self::temporary_in(&dir)?;
        let mut scans = Vec::with_capacity(runs.len());
        let mut heap = BinaryHeap::new();
        for (run, sequence) in runs.iter_mut().enumerate() {
            let mut scan = sequence.scan()?;
            if let Some(item) = scan.next() {
                let item = item?;
                heap.push(MergeHead { key: key(&item), run, item });
            }
            scans.push(scan);
        }
        while let Some(MergeHead { run, item, .. }) = heap.pop() {
            output.append(&item)?;
            if let Some(next) = scans[run].next() {
                let next = next?;
                heap.push(MergeHead { key: key(&next), run, item: next });
            }
        }
        output.flush()?;
        drop(scans);

        self.writer = None;
        fs::rename(&output.path, &self.path)?;
        output.writer = None;
        output.persistence = Persistence::Persist;
        Ok(())
    }

    fn write_run<K: Ord, F: Fn(&T) -> K>(buffer: &mut Vec<T>, key: &F, dir: &Path) -> RTreeResult<Self> {
        buffer.sort_by_key(|item| key(item));
        let mut run = Self::temporary_in(dir)?;
        for item in buffer.drain(..) {
            run.append(&item)?;
        }
        run.flush()?;
        Ok(run)
    }
}

impl<T> Drop for ExternalSequence<T> {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                log::warn!("Failed to flush sequence {:?}: {}", self.path, e);
            }
        }
        if self.persistence == Persistence::Delete {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove sequence {:?}: {}", self.path, e),
            }
        }
    }
}

/// Iterator over the records of an [`ExternalSequence`].
pub struct Scan<T> {
    reader: BufReader<File>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Iterator for Scan<T> {
    type Item = RTreeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let at_end = match self.reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };
        if at_end {
            self.done = true;
            return None;
        }
        let record = bincode::serde::decode_from_std_read(&mut self.reader, bincode::config::legacy())
            .map_err(RTreeError::from);
        if record.is_err() {
            self.done = true;
        }
        Some(record)
    }
}

/// Smallest key first, ties broken by run index.
struct MergeHead<K, T> {
    key: K,
    run: usize,
    item: T,
}

impl<K: Ord, T> PartialEq for MergeHead<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run == other.run
    }
}

impl<K: Ord, T> Eq for MergeHead<K, T> {}

impl<K: Ord, T> PartialOrd for MergeHead<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> Ord for MergeHead<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.run.cmp(&self.run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rectangle::Rectangle;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::tempdir;

    #[test]
    fn test_append_and_scan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rects.seq");
        let mut sequence = ExternalSequence::create(&path).unwrap();
        for i in 0..10u64 {
            sequence.append(&Rectangle::new(i, 0.0, 0.0, i as f64, 1.0)).unwrap();
        }
        assert_eq!(sequence.len(), 10);

        let ids: Vec<u64> = sequence.scan().unwrap().map(|r| r.unwrap().id()).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_open_counts_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("numbers.seq");
        {
            let mut sequence = ExternalSequence::<u64>::create(&path).unwrap();
            for i in 0..25 {
                sequence.append(&i).unwrap();
            }
        }

        let mut sequence = ExternalSequence::<u64>::open(&path).unwrap();
        assert_eq!(sequence.len(), 25);
        sequence.append(&99).unwrap();
        let last = sequence.scan().unwrap().last().unwrap().unwrap();
        assert_eq!(last, 99);
        assert_eq!(sequence.len(), 26);
    }

    #[test]
    fn test_temporary_removed_on_drop() {
        let path = {
            let mut sequence = ExternalSequence::<u32>::temporary().unwrap();
            sequence.append(&1).unwrap();
            let path = sequence.path().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_truncated_record_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.seq");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        assert!(ExternalSequence::<u64>::open(&path).is_err());
    }

    #[test]
    fn test_sort_by_key_spills_runs() {
        let dir = tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut sequence = ExternalSequence::<(u32, u32)>::create(dir.path().join("pairs.seq")).unwrap();
        let mut expected = Vec::new();
        for i in 0..1000u32 {
            let pair = (rng.gen_range(0..50), i);
            sequence.append(&pair).unwrap();
            expected.push(pair);
        }

        sequence.sort_by_key(|pair| pair.0, 64).unwrap();
        // Stable: equal keys keep insertion order
        expected.sort_by_key(|pair| pair.0);

        let sorted: Vec<(u32, u32)> = sequence.scan().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(sorted, expected);
        assert_eq!(sequence.len(), 1000);

        // Only the sorted file remains
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_sort_single_run() {
        let mut sequence = ExternalSequence::<i64>::temporary().unwrap();
        for v in [5, -1, 3, 3, 0] {
            sequence.append(&v).unwrap();
        }
        sequence.sort_by_key(|v| *v, 1 << 16).unwrap();
        let sorted: Vec<i64> = sequence.scan().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(sorted, vec![-1, 0, 3, 3, 5]);
    }
}
