//! Engine configuration

use crate::crypto::WalletId;
use crate::height::HeightSource;
use crate::multisig::MultisigEngine;
use crate::storage::{JsonFileStore, StorageConfig, StorageError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration of an engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Id of the engine's own wallet, which approves guarded wallet creation
    pub engine_wallet_id: WalletId,
    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_wallet_id: WalletId::derive(b"multisig-engine"),
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl<H: HeightSource> MultisigEngine<JsonFileStore, H> {
    /// Open an engine over the JSON snapshot store described by `config`
    pub fn open(config: &EngineConfig, heights: H) -> Result<Self, StorageError> {
        let store = JsonFileStore::open(config.storage.clone())?;
        log::info!(
            "Opening multisig engine {} in {:?}",
            config.engine_wallet_id,
            config.storage.data_dir
        );
        Ok(Self::new(store, heights, config.engine_wallet_id))
    }
}
