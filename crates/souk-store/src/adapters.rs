//! # Reference Key-Value Adapters
//!
//! - [`MemoryKvStore`] for unit tests.
//! - [`FileKvStore`] for development and light production: the whole map is
//!   persisted to a single file with length-prefixed records and an atomic
//!   temp-file rename, so a crash mid-write leaves the previous state
//!   intact.

use crate::errors::StoreError;
use crate::ports::{BatchOperation, KeyValueStore};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Io {
        message: e.to_string(),
    }
}

fn scan_map(
    data: &BTreeMap<Vec<u8>, Vec<u8>>,
    prefix: &[u8],
    start: Option<&[u8]>,
    limit: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let from: Vec<u8> = match start {
        Some(s) if s >= prefix => s.to_vec(),
        _ => prefix.to_vec(),
    };
    data.range(from..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .take(limit)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// In-memory key-value store for unit tests.
///
/// `BTreeMap`-backed, so scans are ordered without extra sorting.
#[derive(Default)]
pub struct MemoryKvStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn atomic_batch(&mut self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(scan_map(&self.data, prefix, start, limit))
    }
}

/// File-backed key-value store.
///
/// Record format: `[key_len:u32 le][key][value_len:u32 le][value]`, the
/// whole file rewritten through a temp file + rename on every mutation.
/// Suitable for development and light nodes; production hosts supply a real
/// embedded database behind the port.
pub struct FileKvStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    path: PathBuf,
}

impl FileKvStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if an existing file cannot be read and
    /// [`StoreError::Corrupt`] if it cannot be parsed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::File::open(&path) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).map_err(io_err)?;
                Self::parse(&bytes)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(io_err(e)),
        };

        if !data.is_empty() {
            tracing::info!(keys = data.len(), path = %path.display(), "loaded store file");
        }

        Ok(Self { data, path })
    }

    fn parse(bytes: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, StoreError> {
        let corrupt = || StoreError::Corrupt {
            message: "truncated store file record".to_string(),
        };

        let mut data = BTreeMap::new();
        let mut cursor = 0usize;

        while cursor < bytes.len() {
            let read_len = |at: usize| -> Result<usize, StoreError> {
                let end = at.checked_add(4).ok_or_else(corrupt)?;
                let slice = bytes.get(at..end).ok_or_else(corrupt)?;
                let arr: [u8; 4] = slice.try_into().map_err(|_| corrupt())?;
                Ok(u32::from_le_bytes(arr) as usize)
            };

            let key_len = read_len(cursor)?;
            cursor += 4;
            let key = bytes.get(cursor..cursor + key_len).ok_or_else(corrupt)?;
            cursor += key_len;

            let value_len = read_len(cursor)?;
            cursor += 4;
            let value = bytes.get(cursor..cursor + value_len).ok_or_else(corrupt)?;
            cursor += value_len;

            data.insert(key.to_vec(), value.to_vec());
        }

        Ok(data)
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut bytes = Vec::new();
        for (key, value) in &self.data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;

        Ok(())
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        self.persist()
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.data.remove(key);
        self.persist()
    }

    fn atomic_batch(&mut self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        self.persist()
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(scan_map(&self.data, prefix, start, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_get_put_delete() {
        let mut store = MemoryKvStore::new();

        store.put(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        store.delete(b"key1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), None);
    }

    #[test]
    fn test_memory_batch() {
        let mut store = MemoryKvStore::new();
        store.put(b"stale", b"x").unwrap();

        store
            .atomic_batch(vec![
                BatchOperation::put(b"a", b"1"),
                BatchOperation::put(b"b", b"2"),
                BatchOperation::delete(b"stale"),
            ])
            .unwrap();

        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"stale").unwrap(), None);
    }

    #[test]
    fn test_scan_is_ordered_and_bounded() {
        let mut store = MemoryKvStore::new();
        store.put(b"log/0002", b"c").unwrap();
        store.put(b"log/0000", b"a").unwrap();
        store.put(b"log/0001", b"b").unwrap();
        store.put(b"meta/x", b"z").unwrap();

        let all = store.scan_prefix(b"log/", None, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].1, b"a".to_vec());
        assert_eq!(all[2].1, b"c".to_vec());

        let from = store
            .scan_prefix(b"log/", Some(b"log/0001"), 10)
            .unwrap();
        assert_eq!(from.len(), 2);
        assert_eq!(from[0].1, b"b".to_vec());

        let capped = store.scan_prefix(b"log/", None, 2).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("souk-store-test-{}", std::process::id()));
        let path = dir.join("kv.dat");
        let _ = std::fs::remove_file(&path);

        {
            let mut store = FileKvStore::open(&path).unwrap();
            store.put(b"k", b"v").unwrap();
            store
                .atomic_batch(vec![BatchOperation::put(b"k2", b"v2")])
                .unwrap();
        }

        let store = FileKvStore::open(&path).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get(b"k2").unwrap(), Some(b"v2".to_vec()));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = std::env::temp_dir().join(format!("souk-store-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kv.dat");
        std::fs::write(&path, b"\xFF\xFF\xFF\xFF garbage").unwrap();

        assert!(matches!(
            FileKvStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
