//! Signer identities and credential verification
//!
//! Native signers are authenticated by the ledger before a call reaches the
//! engine, so verifying them is a registry lookup. External signers prove
//! control of their address with a recoverable secp256k1 signature over a
//! digest bound to the wallet, the operation and a caller-chosen nonce.

use super::error::MultisigError;
use super::operation::OperationId;
use crate::crypto::{
    recover_external_address, ExternalAddress, ExternalKeyPair, Hash32, HashScheme, NativeAddress,
    StructuredHasher, WalletId, EXTERNAL_SIGNATURE_LEN,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const EXTERNAL_DOMAIN: &str = "multisig.external-signature.v1";

/// A configured signer of either kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignerIdentity {
    Native(NativeAddress),
    External(ExternalAddress),
}

impl SignerIdentity {
    /// One-byte discriminant used in key derivation
    pub fn tag(&self) -> u8 {
        match self {
            SignerIdentity::Native(_) => 0,
            SignerIdentity::External(_) => 1,
        }
    }

    pub fn address_bytes(&self) -> &[u8; 20] {
        match self {
            SignerIdentity::Native(addr) => addr.as_bytes(),
            SignerIdentity::External(addr) => addr.as_bytes(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            SignerIdentity::Native(addr) => addr.is_zero(),
            SignerIdentity::External(addr) => addr.is_zero(),
        }
    }
}

impl fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerIdentity::Native(addr) => write!(f, "native:{}", addr),
            SignerIdentity::External(addr) => write!(f, "external:{}", addr),
        }
    }
}

/// Digest an external signer signs to vote on `operation_id` of `wallet_id`
pub fn external_signing_digest(
    wallet_id: &WalletId,
    operation_id: &OperationId,
    nonce: u64,
) -> Hash32 {
    StructuredHasher::with_scheme(HashScheme::Keccak256, EXTERNAL_DOMAIN)
        .field(wallet_id.as_bytes())
        .field(operation_id.as_bytes())
        .u64(nonce)
        .finish()
}

/// An external signer's vote credential
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternalSignature {
    /// Address the signer claims to control
    pub signer: ExternalAddress,
    /// `r || s || v`
    pub signature: [u8; EXTERNAL_SIGNATURE_LEN],
    /// Caller-chosen per attempt
    pub nonce: u64,
}

impl ExternalSignature {
    /// Produce a credential for `operation_id` of `wallet_id`
    pub fn create(
        key_pair: &ExternalKeyPair,
        wallet_id: &WalletId,
        operation_id: &OperationId,
        nonce: u64,
    ) -> Self {
        let digest = external_signing_digest(wallet_id, operation_id, nonce);
        Self {
            signer: key_pair.address(),
            signature: key_pair.sign_digest(&digest),
            nonce,
        }
    }

    /// Check that the signature recovers to the claimed address
    pub fn verify(
        &self,
        wallet_id: &WalletId,
        operation_id: &OperationId,
    ) -> Result<ExternalAddress, MultisigError> {
        let digest = external_signing_digest(wallet_id, operation_id, self.nonce);
        match recover_external_address(&digest, &self.signature) {
            Ok(recovered) if recovered == self.signer => Ok(recovered),
            Ok(recovered) => {
                log::warn!(
                    "External signature for {} recovered {} instead of {}",
                    wallet_id,
                    recovered,
                    self.signer
                );
                Err(MultisigError::InvalidSignature)
            }
            Err(e) => {
                log::warn!("Malformed external signature for {}: {}", wallet_id, e);
                Err(MultisigError::InvalidSignature)
            }
        }
    }
}

/// Who is initiating a signing operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Initiator {
    /// The authenticated native caller
    Native(NativeAddress),
    /// An external signer presenting a credential for the operation
    External(ExternalSignature),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verifies_for_bound_operation_only() {
        let kp = ExternalKeyPair::generate();
        let wallet = WalletId::derive(b"w");
        let op = OperationId::from_content(b"op");

        let sig = ExternalSignature::create(&kp, &wallet, &op, 7);
        assert_eq!(sig.verify(&wallet, &op).unwrap(), kp.address());

        // Same credential presented for another operation or wallet fails
        let other_op = OperationId::from_content(b"other");
        assert!(matches!(
            sig.verify(&wallet, &other_op),
            Err(MultisigError::InvalidSignature)
        ));
        assert!(matches!(
            sig.verify(&WalletId::derive(b"v"), &op),
            Err(MultisigError::InvalidSignature)
        ));
    }

    #[test]
    fn test_claimed_address_must_match() {
        let signer = ExternalKeyPair::generate();
        let impostor = ExternalKeyPair::generate();
        let wallet = WalletId::derive(b"w");
        let op = OperationId::random();

        let mut forged = ExternalSignature::create(&impostor, &wallet, &op, 1);
        forged.signer = signer.address();
        assert!(matches!(
            forged.verify(&wallet, &op),
            Err(MultisigError::InvalidSignature)
        ));
    }

    #[test]
    fn test_nonce_changes_digest() {
        let wallet = WalletId::derive(b"w");
        let op = OperationId::random();
        assert_ne!(
            external_signing_digest(&wallet, &op, 1),
            external_signing_digest(&wallet, &op, 2)
        );
    }

    #[test]
    fn test_identity_tags_differ() {
        let native = SignerIdentity::Native(NativeAddress::from_bytes([1u8; 20]));
        let external = SignerIdentity::External(ExternalAddress::from_bytes([1u8; 20]));
        assert_eq!(native.address_bytes(), external.address_bytes());
        assert_ne!(native.tag(), external.tag());
        assert!(external.to_string().starts_with("external:0x"));
    }
}
