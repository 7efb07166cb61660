//! In-memory store
//!
//! Backing map for tests and for embedders that persist elsewhere. The
//! [`JsonFileStore`](super::JsonFileStore) wraps the same table layout.

use super::{Column, StorageError, Store, WriteBatch, WriteOp};
use crate::crypto::Hash32;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Column-partitioned key-value tables
pub type Tables = HashMap<Column, HashMap<Hash32, Vec<u8>>>;

/// Apply a batch to a set of tables
///
/// Callers hold the write lock for the whole batch, which is what makes the
/// batch atomic for readers.
pub(crate) fn apply_batch(tables: &mut Tables, batch: WriteBatch) {
    for op in batch.into_ops() {
        match op {
            WriteOp::Put { column, key, value } => {
                tables.entry(column).or_default().insert(key, value);
            }
            WriteOp::Delete { column, key } => {
                if let Some(table) = tables.get_mut(&column) {
                    table.remove(&key);
                }
            }
        }
    }
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a column
    pub fn len(&self, column: Column) -> usize {
        self.tables
            .read()
            .get(&column)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    /// True when every column is empty
    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(|t| t.is_empty())
    }
}

impl Store for MemoryStore {
    fn get(&self, column: Column, key: &Hash32) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(&column)
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        apply_batch(&mut tables, batch);
        Ok(())
    }
}
