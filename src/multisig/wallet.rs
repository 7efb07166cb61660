//! Multi-signature wallet configuration
//!
//! A wallet has four native and four external signer slots. Active signers
//! are packed at the front of each slot array; the remaining slots hold the
//! zero address.

use super::admin::{AdminOp, AdminOpKind, BoundPayload};
use super::error::MultisigError;
use super::signer::SignerIdentity;
use crate::crypto::{ExternalAddress, Hash32, NativeAddress, StructuredHasher, WalletId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slots per signer kind
pub const MAX_SIGNERS_PER_KIND: usize = 4;

/// Total signer slots of a wallet
pub const MAX_SIGNERS: usize = 2 * MAX_SIGNERS_PER_KIND;

trait Slot: Copy + Eq {
    fn is_empty_slot(&self) -> bool;
}

impl Slot for NativeAddress {
    fn is_empty_slot(&self) -> bool {
        self.is_zero()
    }
}

impl Slot for ExternalAddress {
    fn is_empty_slot(&self) -> bool {
        self.is_zero()
    }
}

/// Count active slots, rejecting gaps and duplicates
fn count_active<T: Slot>(slots: &[T]) -> Result<u8, MultisigError> {
    let mut active = 0u8;
    let mut padding_seen = false;

    for (i, slot) in slots.iter().enumerate() {
        if slot.is_empty_slot() {
            padding_seen = true;
            continue;
        }
        // A zero slot in front of an active one would be counted as a signer
        if padding_seen {
            return Err(MultisigError::ZeroAddressSigner);
        }
        if slots[..i].contains(slot) {
            return Err(MultisigError::DuplicateSigner);
        }
        active += 1;
    }

    Ok(active)
}

/// Copy a caller-supplied signer list into fixed slots
fn to_slots<T: Slot + Default>(
    signers: &[T],
) -> Result<[T; MAX_SIGNERS_PER_KIND], MultisigError> {
    if signers.len() > MAX_SIGNERS_PER_KIND {
        return Err(MultisigError::TooManySigners {
            max: MAX_SIGNERS_PER_KIND,
        });
    }
    let mut slots = [T::default(); MAX_SIGNERS_PER_KIND];
    slots[..signers.len()].copy_from_slice(signers);
    Ok(slots)
}

fn check_threshold(threshold: u8, signers: u8) -> Result<(), MultisigError> {
    if threshold == 0 || threshold > signers {
        return Err(MultisigError::InvalidThreshold { threshold, signers });
    }
    Ok(())
}

/// Parameters of a wallet creation request
///
/// Also the payload a guard approval is bound to, so the approval covers one
/// exact configuration for one exact wallet id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCreation {
    pub wallet_id: WalletId,
    pub threshold: u8,
    pub native_signers: [NativeAddress; MAX_SIGNERS_PER_KIND],
    pub external_signers: [ExternalAddress; MAX_SIGNERS_PER_KIND],
}

impl WalletCreation {
    /// Build a request from signer lists, padding unused slots with zero
    pub fn new(
        wallet_id: WalletId,
        threshold: u8,
        native_signers: &[NativeAddress],
        external_signers: &[ExternalAddress],
    ) -> Result<Self, MultisigError> {
        Ok(Self {
            wallet_id,
            threshold,
            native_signers: to_slots(native_signers)?,
            external_signers: to_slots(external_signers)?,
        })
    }
}

impl BoundPayload for WalletCreation {
    fn payload_hash(&self) -> Hash32 {
        let mut hasher = StructuredHasher::new("multisig.wallet-creation")
            .field(self.wallet_id.as_bytes())
            .u8(self.threshold);
        for signer in &self.native_signers {
            hasher = hasher.field(signer.as_bytes());
        }
        for signer in &self.external_signers {
            hasher = hasher.field(signer.as_bytes());
        }
        hasher.finish()
    }
}

/// Effect of an admin command on the signer index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignerChange {
    Unchanged,
    Added(SignerIdentity),
    Removed(SignerIdentity),
}

/// A registered multisig wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: WalletId,
    /// Minimum confirmations required (k in k-of-n)
    pub threshold: u8,
    pub native_signers: [NativeAddress; MAX_SIGNERS_PER_KIND],
    pub external_signers: [ExternalAddress; MAX_SIGNERS_PER_KIND],
    /// Count of non-zero slots
    pub num_signers: u8,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Validate a creation request and build the wallet
    pub fn from_creation(request: &WalletCreation) -> Result<Self, MultisigError> {
        let native = count_active(&request.native_signers)?;
        let external = count_active(&request.external_signers)?;
        let num_signers = native + external;
        check_threshold(request.threshold, num_signers)?;

        Ok(Self {
            wallet_id: request.wallet_id,
            threshold: request.threshold,
            native_signers: request.native_signers,
            external_signers: request.external_signers,
            num_signers,
            created_at: Utc::now(),
        })
    }

    /// All active signers, native first
    pub fn signers(&self) -> Vec<SignerIdentity> {
        self.native_signers
            .iter()
            .filter(|s| !s.is_zero())
            .map(|s| SignerIdentity::Native(*s))
            .chain(
                self.external_signers
                    .iter()
                    .filter(|s| !s.is_zero())
                    .map(|s| SignerIdentity::External(*s)),
            )
            .collect()
    }

    pub fn has_signer(&self, signer: &SignerIdentity) -> bool {
        match signer {
            SignerIdentity::Native(addr) => {
                !addr.is_zero() && self.native_signers.contains(addr)
            }
            SignerIdentity::External(addr) => {
                !addr.is_zero() && self.external_signers.contains(addr)
            }
        }
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.num_signers)
    }

    /// Compute the wallet that results from applying `op`
    ///
    /// Leaves `self` untouched; nothing is applied when an error is returned.
    pub fn apply_admin(&self, op: &AdminOp) -> Result<(Wallet, SignerChange), MultisigError> {
        op.validate_shape()?;
        let mut next = self.clone();

        let change = match op.kind {
            AdminOpKind::SetThreshold => {
                check_threshold(op.threshold, next.num_signers)?;
                next.threshold = op.threshold;
                SignerChange::Unchanged
            }
            AdminOpKind::AddSigner => {
                let signer = op_signer(op);
                if next.has_signer(&signer) {
                    return Err(MultisigError::SignerExists);
                }
                match signer {
                    SignerIdentity::Native(addr) => insert_slot(&mut next.native_signers, addr)?,
                    SignerIdentity::External(addr) => {
                        insert_slot(&mut next.external_signers, addr)?
                    }
                }
                next.num_signers += 1;
                SignerChange::Added(signer)
            }
            AdminOpKind::RemoveSigner => {
                let signer = op_signer(op);
                if !next.has_signer(&signer) {
                    return Err(MultisigError::SignerNotFound);
                }
                match signer {
                    SignerIdentity::Native(addr) => remove_slot(&mut next.native_signers, addr),
                    SignerIdentity::External(addr) => {
                        remove_slot(&mut next.external_signers, addr)
                    }
                }
                next.num_signers -= 1;
                check_threshold(next.threshold, next.num_signers)?;
                SignerChange::Removed(signer)
            }
        };

        Ok((next, change))
    }
}

/// The single signer named by an add/remove command (shape already checked)
fn op_signer(op: &AdminOp) -> SignerIdentity {
    if op.native_signer.is_zero() {
        SignerIdentity::External(op.external_signer)
    } else {
        SignerIdentity::Native(op.native_signer)
    }
}

fn insert_slot<T: Slot>(slots: &mut [T], value: T) -> Result<(), MultisigError> {
    let free = slots
        .iter_mut()
        .find(|s| s.is_empty_slot())
        .ok_or(MultisigError::SignerSlotsFull)?;
    *free = value;
    Ok(())
}

/// Remove `value` and shift later slots forward to keep the array packed
fn remove_slot<T: Slot + Default>(slots: &mut [T], value: T) {
    if let Some(pos) = slots.iter().position(|s| *s == value) {
        slots[pos..].rotate_left(1);
        if let Some(last) = slots.last_mut() {
            *last = T::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(n: u8) -> NativeAddress {
        NativeAddress::from_bytes([n; 20])
    }

    fn external(n: u8) -> ExternalAddress {
        ExternalAddress::from_bytes([n; 20])
    }

    fn sample_wallet() -> Wallet {
        let request = WalletCreation::new(
            WalletId::derive(b"sample"),
            2,
            &[native(1), native(2)],
            &[external(3)],
        )
        .unwrap();
        Wallet::from_creation(&request).unwrap()
    }

    #[test]
    fn test_wallet_creation() {
        let wallet = sample_wallet();
        assert_eq!(wallet.num_signers, 3);
        assert_eq!(wallet.threshold, 2);
        assert_eq!(wallet.description(), "2-of-3");
        assert_eq!(wallet.signers().len(), 3);
        assert!(wallet.has_signer(&SignerIdentity::Native(native(1))));
        assert!(wallet.has_signer(&SignerIdentity::External(external(3))));
        assert!(!wallet.has_signer(&SignerIdentity::Native(native(3))));
        assert!(!wallet.has_signer(&SignerIdentity::Native(NativeAddress::ZERO)));
    }

    #[test]
    fn test_config_validation() {
        let id = WalletId::derive(b"v");

        // Zero threshold
        let req = WalletCreation::new(id, 0, &[native(1)], &[]).unwrap();
        assert!(matches!(
            Wallet::from_creation(&req),
            Err(MultisigError::InvalidThreshold { .. })
        ));

        // Threshold above the active count; padding does not count
        let req = WalletCreation::new(id, 2, &[native(1)], &[]).unwrap();
        assert!(matches!(
            Wallet::from_creation(&req),
            Err(MultisigError::InvalidThreshold {
                threshold: 2,
                signers: 1
            })
        ));

        // Duplicate signers
        let req = WalletCreation::new(id, 1, &[native(1), native(1)], &[]).unwrap();
        assert!(matches!(
            Wallet::from_creation(&req),
            Err(MultisigError::DuplicateSigner)
        ));

        // Too many of one kind
        assert!(matches!(
            WalletCreation::new(id, 1, &[native(1), native(2), native(3), native(4), native(5)], &[]),
            Err(MultisigError::TooManySigners { max: 4 })
        ));
    }

    #[test]
    fn test_zero_slot_counted_as_active() {
        let id = WalletId::derive(b"z");
        let req = WalletCreation::new(id, 1, &[NativeAddress::ZERO, native(1)], &[]).unwrap();
        assert!(matches!(
            Wallet::from_creation(&req),
            Err(MultisigError::ZeroAddressSigner)
        ));

        // Trailing padding is fine
        let req = WalletCreation::new(id, 1, &[native(1), NativeAddress::ZERO], &[]).unwrap();
        assert_eq!(Wallet::from_creation(&req).unwrap().num_signers, 1);
    }

    #[test]
    fn test_creation_payload_binds_configuration() {
        let id = WalletId::derive(b"p");
        let a = WalletCreation::new(id, 1, &[native(1)], &[]).unwrap();
        let b = WalletCreation::new(id, 1, &[native(2)], &[]).unwrap();
        let c = WalletCreation::new(WalletId::derive(b"q"), 1, &[native(1)], &[]).unwrap();
        assert_ne!(a.payload_hash(), b.payload_hash());
        assert_ne!(a.payload_hash(), c.payload_hash());
        assert_eq!(a.payload_hash(), a.payload_hash());
    }

    #[test]
    fn test_add_signer() {
        let wallet = sample_wallet();

        let (next, change) = wallet
            .apply_admin(&AdminOp::add_external_signer(external(9)))
            .unwrap();
        assert_eq!(next.num_signers, 4);
        assert_eq!(next.external_signers[1], external(9));
        assert_eq!(change, SignerChange::Added(SignerIdentity::External(external(9))));

        assert!(matches!(
            wallet.apply_admin(&AdminOp::add_native_signer(native(1))),
            Err(MultisigError::SignerExists)
        ));
    }

    #[test]
    fn test_add_signer_when_full() {
        let request = WalletCreation::new(
            WalletId::derive(b"full"),
            1,
            &[native(1), native(2), native(3), native(4)],
            &[],
        )
        .unwrap();
        let wallet = Wallet::from_creation(&request).unwrap();
        assert!(matches!(
            wallet.apply_admin(&AdminOp::add_native_signer(native(5))),
            Err(MultisigError::SignerSlotsFull)
        ));
    }

    #[test]
    fn test_remove_signer_compacts_slots() {
        let wallet = sample_wallet();
        let wallet = wallet.apply_admin(&AdminOp::set_threshold(1)).unwrap().0;

        let (next, change) = wallet
            .apply_admin(&AdminOp::remove_native_signer(native(1)))
            .unwrap();
        assert_eq!(next.native_signers[0], native(2));
        assert!(next.native_signers[1].is_zero());
        assert_eq!(next.num_signers, 2);
        assert_eq!(change, SignerChange::Removed(SignerIdentity::Native(native(1))));

        assert!(matches!(
            next.apply_admin(&AdminOp::remove_native_signer(native(1))),
            Err(MultisigError::SignerNotFound)
        ));
    }

    #[test]
    fn test_remove_cannot_break_threshold() {
        let request =
            WalletCreation::new(WalletId::derive(b"t"), 2, &[native(1), native(2)], &[]).unwrap();
        let wallet = Wallet::from_creation(&request).unwrap();
        assert!(matches!(
            wallet.apply_admin(&AdminOp::remove_native_signer(native(2))),
            Err(MultisigError::InvalidThreshold {
                threshold: 2,
                signers: 1
            })
        ));
    }

    #[test]
    fn test_set_threshold_bounds() {
        let wallet = sample_wallet();
        assert_eq!(wallet.apply_admin(&AdminOp::set_threshold(3)).unwrap().0.threshold, 3);
        assert!(matches!(
            wallet.apply_admin(&AdminOp::set_threshold(4)),
            Err(MultisigError::InvalidThreshold { .. })
        ));
    }
}
