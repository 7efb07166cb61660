//! Multi-signature authorization
//!
//! Wallets are k-of-n sets of native and external signers. A signing
//! operation collects confirmations within a block-height window; once the
//! threshold is met it can be executed exactly once.
//!
//! # Example
//!
//! ```ignore
//! use multisig_engine::multisig::{Initiator, MultisigEngine, OperationId, WalletCreation};
//!
//! let engine = MultisigEngine::new(store, heights, engine_wallet_id);
//! engine.init(deployer, false)?;
//!
//! // Create a 2-of-2 wallet
//! let request = WalletCreation::new(wallet_id, 2, &[alice, bob], &[])?;
//! engine.create_wallet(&alice, &request, None)?;
//!
//! // Alice opens an operation (her vote counts), Bob confirms
//! let op = OperationId::random();
//! engine.initiate_signing_op(&Initiator::Native(alice), &wallet_id, &op, 10)?;
//! engine.sign(&bob, &wallet_id, &op)?;
//!
//! engine.execute_signing_op(&wallet_id, &op)?;
//! assert!(engine.is_signing_complete(&wallet_id, &op)?);
//! ```

pub mod admin;
pub mod engine;
pub mod error;
pub mod keyspace;
pub mod locks;
pub mod operation;
pub mod signer;
pub mod wallet;

pub use admin::{AdminOp, AdminOpKind, BoundPayload};
pub use engine::{MultisigEngine, MultisigResult, Settings};
pub use error::{ErrorCategory, MultisigError};
pub use operation::{
    CompletedOperation, ExecutionReceipt, OperationId, OperationKind, OperationStatus,
    SigningOperation, VoteRecord,
};
pub use signer::{external_signing_digest, ExternalSignature, Initiator, SignerIdentity};
pub use wallet::{SignerChange, Wallet, WalletCreation, MAX_SIGNERS, MAX_SIGNERS_PER_KIND};
