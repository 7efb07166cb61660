//! Multisig Engine: threshold authorization for a ledger runtime
//!
//! This crate provides:
//! - k-of-n wallets mixing native and external (secp256k1/keccak) signers
//! - Signing operations with block-height expiry and re-initiation rounds
//! - Exactly-once execution with permanent completion tombstones
//! - Payload binding for administrative changes and guarded wallet creation
//! - Pluggable atomic storage with an in-memory and a JSON snapshot backend
//!
//! # Example
//!
//! ```rust
//! use multisig_engine::crypto::{KeyPair, WalletId};
//! use multisig_engine::height::ManualHeight;
//! use multisig_engine::multisig::{Initiator, MultisigEngine, OperationId, WalletCreation};
//! use multisig_engine::storage::MemoryStore;
//!
//! let heights = ManualHeight::new(1);
//! let engine = MultisigEngine::new(MemoryStore::new(), heights.clone(), WalletId::derive(b"engine"));
//!
//! let alice = KeyPair::generate().address();
//! engine.init(alice, false).unwrap();
//!
//! let wallet_id = WalletId::derive(b"treasury");
//! let request = WalletCreation::new(wallet_id, 1, &[alice], &[]).unwrap();
//! engine.create_wallet(&alice, &request, None).unwrap();
//!
//! let op = OperationId::random();
//! engine.initiate_signing_op(&Initiator::Native(alice), &wallet_id, &op, 10).unwrap();
//! engine.execute_signing_op(&wallet_id, &op).unwrap();
//! assert!(engine.is_signing_complete(&wallet_id, &op).unwrap());
//! ```

pub mod config;
pub mod crypto;
pub mod height;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use config::EngineConfig;
pub use crypto::{ExternalAddress, ExternalKeyPair, KeyPair, NativeAddress, WalletId};
pub use height::{HeightSource, ManualHeight};
pub use multisig::{
    AdminOp, ExternalSignature, Initiator, MultisigEngine, MultisigError, OperationId,
    OperationStatus, WalletCreation,
};
pub use storage::{JsonFileStore, MemoryStore, Store};
