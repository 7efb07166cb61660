//! Cryptographic utilities for the engine
//!
//! This module provides:
//! - Structured SHA-256 / Keccak-256 hashing for lookup keys and payloads
//! - Address types for wallets, native signers and external signers
//! - secp256k1 key pairs and recoverable external signatures

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{hash160, ExternalAddress, NativeAddress, WalletId, ADDRESS_LEN};
pub use hash::{keccak256, sha256, Hash32, HashScheme, StructuredHasher};
pub use keys::{
    recover_external_address, ExternalKeyPair, KeyError, KeyPair, EXTERNAL_SIGNATURE_LEN,
};
