//! The multi-signature authorization engine
//!
//! Ties the wallet registry, signer verification and the signing-operation
//! state machine together over an injected [`Store`] and [`HeightSource`].
//! Every mutating call validates and commits inside one critical section
//! keyed by its (wallet, operation) key, and commits with a single atomic
//! batch, so a rejected call never leaves partial state behind.

use super::admin::{AdminOp, BoundPayload};
use super::error::MultisigError;
use super::keyspace::{operation_key, settings_key, signer_key, vote_key, wallet_key};
use super::locks::KeyLocks;
use super::operation::{
    CompletedOperation, ExecutionReceipt, OperationId, OperationKind, OperationStatus,
    SigningOperation, VoteRecord,
};
use super::signer::{ExternalSignature, Initiator, SignerIdentity};
use super::wallet::{SignerChange, Wallet, WalletCreation};
use crate::crypto::{ExternalAddress, Hash32, NativeAddress, WalletId};
use crate::height::HeightSource;
use crate::storage::{get_record, Column, Store, WriteBatch};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Result type for engine operations
pub type MultisigResult<T> = Result<T, MultisigError>;

/// Global one-time settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Privileged address; the only caller allowed to create the engine's own wallet
    pub designated: NativeAddress,
    /// Whether wallet creation must be approved by the engine's wallet
    pub guard_create_wallet: bool,
    pub initialized_at_block: u64,
}

/// A vote credential resolved to a signer
enum Voter<'a> {
    Native(&'a NativeAddress),
    External(&'a ExternalSignature),
}

/// Multi-signature authorization engine
pub struct MultisigEngine<S: Store, H: HeightSource> {
    store: S,
    heights: H,
    /// The engine's own address, used as the id of its guard wallet
    engine_wallet_id: WalletId,
    locks: KeyLocks,
}

impl<S: Store, H: HeightSource> MultisigEngine<S, H> {
    pub fn new(store: S, heights: H, engine_wallet_id: WalletId) -> Self {
        Self {
            store,
            heights,
            engine_wallet_id,
            locks: KeyLocks::new(),
        }
    }

    pub fn engine_wallet_id(&self) -> WalletId {
        self.engine_wallet_id
    }

    pub fn current_height(&self) -> u64 {
        self.heights.current_height()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// One-time initialization of the global settings
    pub fn init(
        &self,
        designated: NativeAddress,
        guard_create_wallet: bool,
    ) -> MultisigResult<Settings> {
        let key = settings_key();
        let _guard = self.locks.lock(key);

        if self.store.contains(Column::Settings, &key)? {
            return Err(MultisigError::AlreadyInitialized);
        }

        let settings = Settings {
            designated,
            guard_create_wallet,
            initialized_at_block: self.current_height(),
        };
        let mut batch = WriteBatch::new();
        batch.put(Column::Settings, key, &settings)?;
        self.store.write(batch)?;

        log::info!(
            "Engine {} initialized (designated {}, guarded creation: {})",
            self.engine_wallet_id,
            designated,
            guard_create_wallet
        );
        Ok(settings)
    }

    pub fn settings(&self) -> MultisigResult<Option<Settings>> {
        Ok(get_record(&self.store, Column::Settings, &settings_key())?)
    }

    // =========================================================================
    // Wallet registry
    // =========================================================================

    /// Register a new wallet
    ///
    /// With guarded creation, `approval` must name a completed signing
    /// operation on the engine's wallet bound to exactly this request. The
    /// engine's own wallet is bootstrapped by the designated address instead.
    pub fn create_wallet(
        &self,
        caller: &NativeAddress,
        request: &WalletCreation,
        approval: Option<&OperationId>,
    ) -> MultisigResult<Wallet> {
        let settings = self.settings()?.ok_or(MultisigError::NotInitialized)?;

        if request.wallet_id == self.engine_wallet_id {
            if *caller != settings.designated {
                return Err(MultisigError::Unauthorized);
            }
        } else if settings.guard_create_wallet {
            self.check_creation_approval(request, approval)?;
        }

        let wallet = Wallet::from_creation(request)?;

        let key = wallet_key(&wallet.wallet_id);
        let _guard = self.locks.lock(key);
        if self.store.contains(Column::Wallets, &key)? {
            return Err(MultisigError::DuplicateWallet(wallet.wallet_id));
        }

        let mut batch = WriteBatch::new();
        batch.put(Column::Wallets, key, &wallet)?;
        for signer in wallet.signers() {
            batch.put(Column::SignerIndex, signer_key(&wallet.wallet_id, &signer), &true)?;
        }
        self.store.write(batch)?;

        log::info!(
            "Wallet created: {} ({}) by {}",
            wallet.wallet_id,
            wallet.description(),
            caller
        );
        Ok(wallet)
    }

    fn check_creation_approval(
        &self,
        request: &WalletCreation,
        approval: Option<&OperationId>,
    ) -> MultisigResult<()> {
        let approval = approval.ok_or(MultisigError::CreationNotApproved)?;
        let completed = self
            .get_completed_signing_op(&self.engine_wallet_id, approval)?
            .ok_or(MultisigError::CreationNotApproved)?;

        if completed.bound_payload_hash != Some(request.payload_hash()) {
            return Err(MultisigError::CreationNotApproved);
        }
        Ok(())
    }

    pub fn get_wallet(&self, wallet_id: &WalletId) -> MultisigResult<Wallet> {
        get_record(&self.store, Column::Wallets, &wallet_key(wallet_id))?
            .ok_or(MultisigError::WalletNotFound(*wallet_id))
    }

    /// Check the signer index
    pub fn is_signer(&self, wallet_id: &WalletId, signer: &SignerIdentity) -> MultisigResult<bool> {
        if signer.is_zero() {
            return Ok(false);
        }
        Ok(self
            .store
            .contains(Column::SignerIndex, &signer_key(wallet_id, signer))?)
    }

    pub fn is_native_signer(
        &self,
        wallet_id: &WalletId,
        address: &NativeAddress,
    ) -> MultisigResult<bool> {
        self.is_signer(wallet_id, &SignerIdentity::Native(*address))
    }

    pub fn is_external_signer(
        &self,
        wallet_id: &WalletId,
        address: &ExternalAddress,
    ) -> MultisigResult<bool> {
        self.is_signer(wallet_id, &SignerIdentity::External(*address))
    }

    // =========================================================================
    // Signing operations
    // =========================================================================

    /// Open (or re-open after expiry) an unbound signing operation
    pub fn initiate_signing_op(
        &self,
        initiator: &Initiator,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        block_expiration: u64,
    ) -> MultisigResult<SigningOperation> {
        self.initiate_inner(
            initiator,
            wallet_id,
            operation_id,
            block_expiration,
            None,
            OperationKind::Generic,
        )
    }

    /// Open a signing operation locked to one exact command
    pub fn initiate_bound_signing_op<P: BoundPayload + ?Sized>(
        &self,
        initiator: &Initiator,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        block_expiration: u64,
        payload: &P,
    ) -> MultisigResult<SigningOperation> {
        self.initiate_inner(
            initiator,
            wallet_id,
            operation_id,
            block_expiration,
            Some(payload.payload_hash()),
            OperationKind::Generic,
        )
    }

    fn initiate_inner(
        &self,
        initiator: &Initiator,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        block_expiration: u64,
        bound_payload_hash: Option<Hash32>,
        kind: OperationKind,
    ) -> MultisigResult<SigningOperation> {
        if block_expiration == 0 {
            return Err(MultisigError::ZeroExpiration);
        }

        let key = operation_key(wallet_id, operation_id);
        let _guard = self.locks.lock(key);

        self.get_wallet(wallet_id)?;
        if self.store.contains(Column::CompletedOps, &key)? {
            return Err(MultisigError::OperationReused);
        }

        let height = self.current_height();
        let previous: Option<SigningOperation> = get_record(&self.store, Column::PendingOps, &key)?;
        if let Some(previous) = &previous {
            if !previous.is_stale(height) {
                return Err(MultisigError::OperationActive);
            }
            if previous.bound_payload_hash != bound_payload_hash || previous.kind != kind {
                return Err(MultisigError::PayloadRebindingForbidden);
            }
        }

        let voter = self.resolve_initiator(initiator, wallet_id, operation_id)?;

        let operation = SigningOperation {
            round: previous.map(|p| p.round.saturating_add(1)).unwrap_or(1),
            confirmations: u8::from(voter.is_some()),
            expires_at_block: height.saturating_add(block_expiration),
            bound_payload_hash,
            kind,
        };

        let mut batch = WriteBatch::new();
        batch.put(Column::PendingOps, key, &operation)?;
        if let Some(voter) = &voter {
            batch.put(
                Column::Votes,
                vote_key(wallet_id, operation_id, operation.round, voter),
                &VoteRecord {
                    voted_at_block: height,
                },
            )?;
        }
        self.store.write(batch)?;

        log::info!(
            "Signing op {} on {} initiated: round {}, expires at {}, {} confirmation(s)",
            operation_id,
            wallet_id,
            operation.round,
            operation.expires_at_block,
            operation.confirmations
        );
        Ok(operation)
    }

    /// The initiator's vote, if it is a configured signer
    fn resolve_initiator(
        &self,
        initiator: &Initiator,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<Option<SignerIdentity>> {
        let identity = match initiator {
            Initiator::Native(address) => SignerIdentity::Native(*address),
            Initiator::External(signature) => {
                SignerIdentity::External(signature.verify(wallet_id, operation_id)?)
            }
        };

        if self.is_signer(wallet_id, &identity)? {
            Ok(Some(identity))
        } else {
            Ok(None)
        }
    }

    /// Vote as a native signer in the current round
    pub fn sign(
        &self,
        caller: &NativeAddress,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<SigningOperation> {
        self.sign_inner(Voter::Native(caller), wallet_id, operation_id, None)
    }

    /// Vote as a native signer, only if `round` is still the current round
    pub fn sign_for_round(
        &self,
        caller: &NativeAddress,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        round: u32,
    ) -> MultisigResult<SigningOperation> {
        self.sign_inner(Voter::Native(caller), wallet_id, operation_id, Some(round))
    }

    /// Vote with an external signature in the current round
    pub fn sign_external(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        signature: &ExternalSignature,
    ) -> MultisigResult<SigningOperation> {
        self.sign_inner(Voter::External(signature), wallet_id, operation_id, None)
    }

    /// Vote with an external signature, only if `round` is still current
    pub fn sign_external_for_round(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        signature: &ExternalSignature,
        round: u32,
    ) -> MultisigResult<SigningOperation> {
        self.sign_inner(
            Voter::External(signature),
            wallet_id,
            operation_id,
            Some(round),
        )
    }

    fn sign_inner(
        &self,
        voter: Voter<'_>,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        round: Option<u32>,
    ) -> MultisigResult<SigningOperation> {
        // Signature recovery needs no state, keep it out of the critical section
        let identity = match voter {
            Voter::Native(address) => SignerIdentity::Native(*address),
            Voter::External(signature) => {
                SignerIdentity::External(signature.verify(wallet_id, operation_id)?)
            }
        };

        let key = operation_key(wallet_id, operation_id);
        let _guard = self.locks.lock(key);

        self.get_wallet(wallet_id)?;
        if !self.is_signer(wallet_id, &identity)? {
            return Err(MultisigError::UnknownSigner);
        }
        if self.store.contains(Column::CompletedOps, &key)? {
            return Err(MultisigError::OperationReused);
        }

        let height = self.current_height();
        let mut operation: SigningOperation = get_record(&self.store, Column::PendingOps, &key)?
            .filter(|op: &SigningOperation| !op.is_stale(height))
            .ok_or(MultisigError::OperationExpired)?;

        if let Some(supplied) = round {
            if supplied != operation.round {
                return Err(MultisigError::RoundMismatch {
                    current: operation.round,
                    supplied,
                });
            }
        }

        let vote = vote_key(wallet_id, operation_id, operation.round, &identity);
        if self.store.contains(Column::Votes, &vote)? {
            return Err(MultisigError::AlreadyVoted);
        }

        operation.confirmations = operation.confirmations.saturating_add(1);

        let mut batch = WriteBatch::new();
        batch.put(Column::PendingOps, key, &operation)?;
        batch.put(
            Column::Votes,
            vote,
            &VoteRecord {
                voted_at_block: height,
            },
        )?;
        self.store.write(batch)?;

        log::debug!(
            "{} voted on {} of {} (round {}, {} confirmation(s))",
            identity,
            operation_id,
            wallet_id,
            operation.round,
            operation.confirmations
        );
        Ok(operation)
    }

    /// Execute an unbound operation whose threshold is met
    pub fn execute_signing_op(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<ExecutionReceipt> {
        self.execute_inner(wallet_id, operation_id, None, OperationKind::Generic, |_, _| {
            Ok(())
        })
            .map(|(receipt, ())| receipt)
    }

    /// Execute a bound operation, presenting the command it was bound to
    pub fn execute_bound_signing_op<P: BoundPayload + ?Sized>(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        payload: &P,
    ) -> MultisigResult<ExecutionReceipt> {
        self.execute_inner(
            wallet_id,
            operation_id,
            Some(payload.payload_hash()),
            OperationKind::Generic,
            |_, _| Ok(()),
        )
        .map(|(receipt, ())| receipt)
    }

    /// Validate, write the tombstone and apply `effect` in one batch
    ///
    /// `effect` sees the live wallet and may add writes or reject the whole
    /// execution. Only records of the matching `kind` can be executed; admin
    /// executions also hold the wallet key, since their effect rewrites it.
    fn execute_inner<T, F>(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        bound_payload_hash: Option<Hash32>,
        kind: OperationKind,
        effect: F,
    ) -> MultisigResult<(ExecutionReceipt, T)>
    where
        F: FnOnce(&Wallet, &mut WriteBatch) -> MultisigResult<T>,
    {
        let key = operation_key(wallet_id, operation_id);
        let _op_guard = self.locks.lock(key);
        let _wallet_guard =
            (kind == OperationKind::Admin).then(|| self.locks.lock(wallet_key(wallet_id)));

        let wallet = self.get_wallet(wallet_id)?;
        if self.store.contains(Column::CompletedOps, &key)? {
            return Err(MultisigError::OperationReused);
        }

        let height = self.current_height();
        let operation: SigningOperation = get_record(&self.store, Column::PendingOps, &key)?
            .filter(|op: &SigningOperation| !op.is_stale(height))
            .ok_or(MultisigError::OperationExpired)?;

        if operation.bound_payload_hash != bound_payload_hash || operation.kind != kind {
            return Err(MultisigError::PayloadMismatch);
        }

        // Only votes of currently configured signers count
        let mut approvals = 0u8;
        let mut batch = WriteBatch::new();
        for signer in wallet.signers() {
            let vote = vote_key(wallet_id, operation_id, operation.round, &signer);
            if self.store.contains(Column::Votes, &vote)? {
                approvals += 1;
                batch.delete(Column::Votes, vote);
            }
        }
        if approvals < wallet.threshold {
            return Err(MultisigError::ThresholdNotMet {
                have: approvals,
                need: wallet.threshold,
            });
        }

        let completed = CompletedOperation {
            completed_at_block: height.max(1),
            round: operation.round,
            bound_payload_hash: operation.bound_payload_hash,
            completed_at: Utc::now(),
        };

        batch.put(Column::CompletedOps, key, &completed)?;
        batch.delete(Column::PendingOps, key);
        let output = effect(&wallet, &mut batch)?;
        self.store.write(batch)?;

        log::info!(
            "Signing op {} on {} executed at block {} ({}/{} confirmations, round {})",
            operation_id,
            wallet_id,
            completed.completed_at_block,
            approvals,
            wallet.threshold,
            operation.round
        );

        let receipt = ExecutionReceipt {
            wallet_id: *wallet_id,
            operation_id: *operation_id,
            round: operation.round,
            confirmations: approvals,
            completed_at_block: completed.completed_at_block,
        };
        Ok((receipt, output))
    }

    /// True once the operation has executed; never reverts
    pub fn is_signing_complete(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<bool> {
        Ok(self
            .store
            .contains(Column::CompletedOps, &operation_key(wallet_id, operation_id))?)
    }

    /// The stored pending record, stale or not
    pub fn get_pending_signing_op(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<Option<SigningOperation>> {
        Ok(get_record(
            &self.store,
            Column::PendingOps,
            &operation_key(wallet_id, operation_id),
        )?)
    }

    pub fn get_completed_signing_op(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<Option<CompletedOperation>> {
        Ok(get_record(
            &self.store,
            Column::CompletedOps,
            &operation_key(wallet_id, operation_id),
        )?)
    }

    pub fn get_operation_status(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> MultisigResult<OperationStatus> {
        if let Some(completed) = self.get_completed_signing_op(wallet_id, operation_id)? {
            return Ok(OperationStatus::Complete {
                completed_at_block: completed.completed_at_block,
            });
        }

        let status = match self.get_pending_signing_op(wallet_id, operation_id)? {
            None => OperationStatus::None,
            Some(op) if op.is_stale(self.current_height()) => OperationStatus::Stale {
                round: op.round,
                confirmations: op.confirmations,
            },
            Some(op) => OperationStatus::Pending {
                round: op.round,
                confirmations: op.confirmations,
                expires_at_block: op.expires_at_block,
            },
        };
        Ok(status)
    }

    pub fn has_voted(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        round: u32,
        signer: &SignerIdentity,
    ) -> MultisigResult<bool> {
        Ok(self.store.contains(
            Column::Votes,
            &vote_key(wallet_id, operation_id, round, signer),
        )?)
    }

    // =========================================================================
    // Admin operations
    // =========================================================================

    /// Open a signing operation authorizing exactly `admin` on `wallet_id`
    pub fn init_admin_op(
        &self,
        initiator: &Initiator,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        block_expiration: u64,
        admin: &AdminOp,
    ) -> MultisigResult<SigningOperation> {
        admin.validate_shape()?;
        self.initiate_inner(
            initiator,
            wallet_id,
            operation_id,
            block_expiration,
            Some(admin.payload_hash()),
            OperationKind::Admin,
        )
    }

    /// Execute an approved admin operation and apply it to the wallet
    pub fn exec_admin_op(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        admin: &AdminOp,
    ) -> MultisigResult<Wallet> {
        let (_, updated) = self.execute_inner(
            wallet_id,
            operation_id,
            Some(admin.payload_hash()),
            OperationKind::Admin,
            |wallet, batch| {
                let (next, change) = wallet.apply_admin(admin)?;
                batch.put(Column::Wallets, wallet_key(wallet_id), &next)?;
                match change {
                    SignerChange::Added(signer) => {
                        batch.put(Column::SignerIndex, signer_key(wallet_id, &signer), &true)?
                    }
                    SignerChange::Removed(signer) => {
                        batch.delete(Column::SignerIndex, signer_key(wallet_id, &signer))
                    }
                    SignerChange::Unchanged => {}
                }
                Ok(next)
            },
        )?;

        log::info!(
            "Admin op {:?} applied to {}: now {}",
            admin.kind,
            wallet_id,
            updated.description()
        );
        Ok(updated)
    }
}
