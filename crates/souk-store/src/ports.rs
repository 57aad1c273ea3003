//! # Key-Value Port
//!
//! The storage interface the host application implements. Production
//! deployments back this with an embedded database; the adapters module
//! ships an in-memory store for tests and a file-backed store for light
//! deployments.
//!
//! Contract notes:
//!
//! - Keys are arbitrary bytes.
//! - `scan_prefix` returns entries in ascending byte order of the key, so
//!   fixed-width rank keys iterate the log in insertion order.
//! - `atomic_batch` is all-or-nothing; the event store relies on this for
//!   crash consistency of appends.

use crate::errors::StoreError;

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Abstract interface for key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete a key.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Execute an atomic batch write: either all operations apply or none.
    fn atomic_batch(&mut self, operations: Vec<BatchOperation>) -> Result<(), StoreError>;

    /// Scan keys under `prefix` in ascending byte order, starting at
    /// `start` (inclusive) when given, returning at most `limit` entries.
    fn scan_prefix(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Check if a key exists.
    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn atomic_batch(&mut self, operations: Vec<BatchOperation>) -> Result<(), StoreError> {
        (**self).atomic_batch(operations)
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        start: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        (**self).scan_prefix(prefix, start, limit)
    }
}
