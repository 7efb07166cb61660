//! Errors raised by the authorization engine

use crate::crypto::{KeyError, WalletId};
use crate::storage::StorageError;
use thiserror::Error;

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    // Configuration
    #[error("Invalid threshold {threshold} for {signers} signer(s)")]
    InvalidThreshold { threshold: u8, signers: u8 },
    #[error("Wallet already exists: {0}")]
    DuplicateWallet(WalletId),
    #[error("Zero address used as an active signer")]
    ZeroAddressSigner,
    #[error("Duplicate signer")]
    DuplicateSigner,
    #[error("Too many signers: at most {max} per kind")]
    TooManySigners { max: usize },
    #[error("Exactly one of native or external signer must be set")]
    SignerTypeConflict,
    #[error("Signer already exists")]
    SignerExists,
    #[error("Signer not found")]
    SignerNotFound,
    #[error("No free signer slot of this kind")]
    SignerSlotsFull,
    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),
    #[error("Engine already initialized")]
    AlreadyInitialized,
    #[error("Engine not initialized")]
    NotInitialized,

    // Authorization
    #[error("Signer not authorized for this wallet")]
    UnknownSigner,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Signer already voted in this round")]
    AlreadyVoted,
    #[error("Caller is not allowed to perform this action")]
    Unauthorized,
    #[error("Wallet creation has not been approved")]
    CreationNotApproved,

    // Lifecycle
    #[error("Signing operation expired or not found")]
    OperationExpired,
    #[error("Signing operation is still active")]
    OperationActive,
    #[error("Signing operation already completed")]
    OperationReused,
    #[error("Bound payload cannot change on re-initiation")]
    PayloadRebindingForbidden,
    #[error("Threshold not met: have {have}, need {need}")]
    ThresholdNotMet { have: u8, need: u8 },
    #[error("Payload does not match the one bound at initiation")]
    PayloadMismatch,
    #[error("Round mismatch: current round is {current}, got {supplied}")]
    RoundMismatch { current: u32, supplied: u32 },
    #[error("Block expiration must be greater than zero")]
    ZeroExpiration,

    // Infrastructure
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Broad class of a [`MultisigError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid wallet or signer configuration
    Configuration,
    /// The caller may not contribute to this operation
    Authorization,
    /// The state machine rejects the transition
    Lifecycle,
    /// Storage or crypto backend failure
    Infrastructure,
}

impl MultisigError {
    pub fn category(&self) -> ErrorCategory {
        use MultisigError::*;
        match self {
            InvalidThreshold { .. }
            | DuplicateWallet(_)
            | ZeroAddressSigner
            | DuplicateSigner
            | TooManySigners { .. }
            | SignerTypeConflict
            | SignerExists
            | SignerNotFound
            | SignerSlotsFull
            | WalletNotFound(_)
            | AlreadyInitialized
            | NotInitialized => ErrorCategory::Configuration,
            UnknownSigner | InvalidSignature | AlreadyVoted | Unauthorized
            | CreationNotApproved => ErrorCategory::Authorization,
            OperationExpired
            | OperationActive
            | OperationReused
            | PayloadRebindingForbidden
            | ThresholdNotMet { .. }
            | PayloadMismatch
            | RoundMismatch { .. }
            | ZeroExpiration => ErrorCategory::Lifecycle,
            MultisigError::StorageError(_) | MultisigError::CryptoError(_) => {
                ErrorCategory::Infrastructure
            }
        }
    }
}
