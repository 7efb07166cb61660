//! Administrative commands bound to signing operations
//!
//! An admin command is hashed with a canonical encoding when its signing
//! operation is initiated. Execution must present the same command, so what
//! the signers voted on is exactly what gets applied.

use super::error::MultisigError;
use crate::crypto::{ExternalAddress, Hash32, NativeAddress, StructuredHasher};
use serde::{Deserialize, Serialize};

/// A command whose exact parameters can be locked to a signing operation
pub trait BoundPayload {
    fn payload_hash(&self) -> Hash32;
}

impl BoundPayload for Hash32 {
    fn payload_hash(&self) -> Hash32 {
        *self
    }
}

/// Kind of administrative mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AdminOpKind {
    SetThreshold = 0,
    AddSigner = 1,
    RemoveSigner = 2,
}

/// An administrative mutation of a wallet's configuration
///
/// Signer arguments use the zero address for "not set". Add and remove
/// require exactly one of the two to be set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOp {
    pub kind: AdminOpKind,
    pub threshold: u8,
    pub native_signer: NativeAddress,
    pub external_signer: ExternalAddress,
}

impl AdminOp {
    pub fn set_threshold(threshold: u8) -> Self {
        Self {
            kind: AdminOpKind::SetThreshold,
            threshold,
            native_signer: NativeAddress::ZERO,
            external_signer: ExternalAddress::ZERO,
        }
    }

    pub fn add_native_signer(signer: NativeAddress) -> Self {
        Self {
            kind: AdminOpKind::AddSigner,
            threshold: 0,
            native_signer: signer,
            external_signer: ExternalAddress::ZERO,
        }
    }

    pub fn add_external_signer(signer: ExternalAddress) -> Self {
        Self {
            kind: AdminOpKind::AddSigner,
            threshold: 0,
            native_signer: NativeAddress::ZERO,
            external_signer: signer,
        }
    }

    pub fn remove_native_signer(signer: NativeAddress) -> Self {
        Self {
            kind: AdminOpKind::RemoveSigner,
            ..Self::add_native_signer(signer)
        }
    }

    pub fn remove_external_signer(signer: ExternalAddress) -> Self {
        Self {
            kind: AdminOpKind::RemoveSigner,
            ..Self::add_external_signer(signer)
        }
    }

    /// Reject commands that can never be applied, whatever the wallet state
    pub fn validate_shape(&self) -> Result<(), MultisigError> {
        match self.kind {
            AdminOpKind::SetThreshold => {
                if self.threshold == 0 {
                    return Err(MultisigError::InvalidThreshold {
                        threshold: 0,
                        signers: 0,
                    });
                }
            }
            AdminOpKind::AddSigner | AdminOpKind::RemoveSigner => {
                if self.native_signer.is_zero() == self.external_signer.is_zero() {
                    return Err(MultisigError::SignerTypeConflict);
                }
            }
        }
        Ok(())
    }
}

impl AdminOp {
    /// Canonical hash of the command, locked in at initiation
    ///
    /// Not a [`BoundPayload`]: admin operations are executed only through
    /// the admin path, which applies the command.
    pub fn payload_hash(&self) -> Hash32 {
        StructuredHasher::new("multisig.admin-op")
            .u8(self.kind as u8)
            .u8(self.threshold)
            .field(self.native_signer.as_bytes())
            .field(self.external_signer.as_bytes())
            .finish()
    }
}
