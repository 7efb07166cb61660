//! Lookup keys for every engine mapping
//!
//! Each mapping derives its key from the logical fields of a record with a
//! distinct domain tag, so no two mappings can collide.

use super::operation::OperationId;
use super::signer::SignerIdentity;
use crate::crypto::{Hash32, StructuredHasher, WalletId};

pub fn settings_key() -> Hash32 {
    StructuredHasher::new("multisig.settings").finish()
}

pub fn wallet_key(wallet_id: &WalletId) -> Hash32 {
    StructuredHasher::new("multisig.wallet")
        .field(wallet_id.as_bytes())
        .finish()
}

pub fn signer_key(wallet_id: &WalletId, signer: &SignerIdentity) -> Hash32 {
    StructuredHasher::new("multisig.signer")
        .field(wallet_id.as_bytes())
        .u8(signer.tag())
        .field(signer.address_bytes())
        .finish()
}

/// Shared by the pending record and the completion tombstone
pub fn operation_key(wallet_id: &WalletId, operation_id: &OperationId) -> Hash32 {
    StructuredHasher::new("multisig.operation")
        .field(wallet_id.as_bytes())
        .field(operation_id.as_bytes())
        .finish()
}

pub fn vote_key(
    wallet_id: &WalletId,
    operation_id: &OperationId,
    round: u32,
    signer: &SignerIdentity,
) -> Hash32 {
    StructuredHasher::new("multisig.vote")
        .field(wallet_id.as_bytes())
        .field(operation_id.as_bytes())
        .u32(round)
        .u8(signer.tag())
        .field(signer.address_bytes())
        .finish()
}
