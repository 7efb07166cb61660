//! Storage abstraction for engine state
//!
//! The engine does not own a persistence engine. It is generic over a
//! [`Store`]: an atomic key-value map partitioned into columns and keyed by
//! 32-byte structured hashes. A [`WriteBatch`] is applied all-or-nothing.

pub mod memory;
pub mod persistence;

use crate::crypto::Hash32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

pub use memory::MemoryStore;
pub use persistence::{JsonFileStore, StorageConfig, StorageStats};

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Logical tables of the engine state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    /// Global one-time settings record
    Settings,
    /// Wallet configurations
    Wallets,
    /// Set-like index of (wallet, signer) pairs
    SignerIndex,
    /// Pending signing operations
    PendingOps,
    /// Completion tombstones
    CompletedOps,
    /// Per-round vote markers
    Votes,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Settings,
        Column::Wallets,
        Column::SignerIndex,
        Column::PendingOps,
        Column::CompletedOps,
        Column::Votes,
    ];
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Column::Settings => "settings",
            Column::Wallets => "wallets",
            Column::SignerIndex => "signer_index",
            Column::PendingOps => "pending_ops",
            Column::CompletedOps => "completed_ops",
            Column::Votes => "votes",
        };
        f.write_str(name)
    }
}

/// A single mutation inside a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        column: Column,
        key: Hash32,
        value: Vec<u8>,
    },
    Delete {
        column: Column,
        key: Hash32,
    },
}

/// An ordered set of mutations applied atomically
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw value
    pub fn put_raw(&mut self, column: Column, key: Hash32, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { column, key, value });
    }

    /// Queue a JSON-encoded record
    pub fn put<T: Serialize>(
        &mut self,
        column: Column,
        key: Hash32,
        value: &T,
    ) -> Result<(), StorageError> {
        self.put_raw(column, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Queue a deletion
    pub fn delete(&mut self, column: Column, key: Hash32) {
        self.ops.push(WriteOp::Delete { column, key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Atomic key-value store consumed by the engine
pub trait Store: Send + Sync {
    /// Read a raw value
    fn get(&self, column: Column, key: &Hash32) -> Result<Option<Vec<u8>>, StorageError>;

    /// Apply every operation of `batch` or none of them
    fn write(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Existence check
    fn contains(&self, column: Column, key: &Hash32) -> Result<bool, StorageError> {
        Ok(self.get(column, key)?.is_some())
    }
}

/// Read and decode a JSON-encoded record
pub fn get_record<S, T>(store: &S, column: Column, key: &Hash32) -> Result<Option<T>, StorageError>
where
    S: Store + ?Sized,
    T: for<'de> Deserialize<'de>,
{
    match store.get(column, key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn get(&self, column: Column, key: &Hash32) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(column, key)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        (**self).write(batch)
    }

    fn contains(&self, column: Column, key: &Hash32) -> Result<bool, StorageError> {
        (**self).contains(column, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_building() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.put(Column::Wallets, [1u8; 32], &42u32).unwrap();
        batch.delete(Column::Votes, [2u8; 32]);
        assert_eq!(batch.len(), 2);

        match &batch.ops()[0] {
            WriteOp::Put { column, value, .. } => {
                assert_eq!(*column, Column::Wallets);
                assert_eq!(value, b"42");
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_column_names_unique() {
        let mut names: Vec<String> = Column::ALL.iter().map(|c| c.to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Column::ALL.len());
    }
}
