//! JSON snapshot store
//!
//! Keeps the tables in memory and rewrites a JSON snapshot after every batch:
//! write to a temporary file, then atomically rename over the state file.
//! Older snapshots are kept as rotating backups.

use super::memory::{apply_batch, Tables};
use super::{Column, StorageError, Store, WriteBatch};
use crate::crypto::Hash32;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// Snapshot format version
const SNAPSHOT_VERSION: u32 = 1;

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub state_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            state_file: "engine_state.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// On-disk layout: column -> hex key -> hex value
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    tables: BTreeMap<Column, BTreeMap<String, String>>,
}

impl Snapshot {
    fn from_tables(tables: &Tables) -> Self {
        let tables = tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(column, table)| {
                let entries = table
                    .iter()
                    .map(|(k, v)| (hex::encode(k), hex::encode(v)))
                    .collect();
                (*column, entries)
            })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            tables,
        }
    }

    fn into_tables(self) -> Result<Tables, StorageError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StorageError::InvalidData(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }

        let mut tables = Tables::new();
        for (column, entries) in self.tables {
            let table = tables.entry(column).or_default();
            for (key_hex, value_hex) in entries {
                let key: Hash32 = hex::decode(&key_hex)
                    .ok()
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| StorageError::InvalidData(format!("bad key {}", key_hex)))?;
                let value = hex::decode(&value_hex)
                    .map_err(|_| StorageError::InvalidData(format!("bad value for {}", key_hex)))?;
                table.insert(key, value);
            }
        }
        Ok(tables)
    }
}

/// File-backed store
#[derive(Debug)]
pub struct JsonFileStore {
    config: StorageConfig,
    tables: RwLock<Tables>,
}

impl JsonFileStore {
    /// Open the store, loading the existing snapshot if there is one
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        let store = Self {
            config,
            tables: RwLock::new(Tables::new()),
        };

        if store.exists() {
            let tables = store.load_from(&store.state_path())?;
            log::info!(
                "Loaded engine state from {:?} ({} entries)",
                store.state_path(),
                tables.values().map(|t| t.len()).sum::<usize>()
            );
            *store.tables.write() = tables;
        }

        Ok(store)
    }

    /// Open with default configuration
    pub fn with_defaults() -> Result<Self, StorageError> {
        Self::open(StorageConfig::default())
    }

    fn state_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.state_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.state_file, index))
    }

    /// Check if a snapshot exists on disk
    pub fn exists(&self) -> bool {
        self.state_path().exists()
    }

    fn load_from(&self, path: &PathBuf) -> Result<Tables, StorageError> {
        let file = fs::File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        snapshot.into_tables()
    }

    fn persist(&self, tables: &Tables) -> Result<(), StorageError> {
        let path = self.state_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.state_file));
        let file = fs::File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &Snapshot::from_tables(tables))?;

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Replace the live state with a backup and persist it
    pub fn restore_backup(&self, backup_index: usize) -> Result<(), StorageError> {
        let backup_path = self.backup_path(backup_index);
        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        let tables = self.load_from(&backup_path)?;
        let mut live = self.tables.write();
        self.persist(&tables)?;
        *live = tables;
        Ok(())
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.state_path();
        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            entry_count: self.tables.read().values().map(|t| t.len()).sum(),
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

impl Store for JsonFileStore {
    fn get(&self, column: Column, key: &Hash32) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(&column)
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut live = self.tables.write();

        // Stage on a copy so a failed flush leaves the live tables untouched
        let mut staged = live.clone();
        let op_count = batch.len();
        apply_batch(&mut staged, batch);
        self.persist(&staged)?;
        *live = staged;

        log::debug!("Flushed {} write(s) to {:?}", op_count, self.state_path());
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub entry_count: usize,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}
