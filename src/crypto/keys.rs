//! secp256k1 key management
//!
//! Native key pairs identify accounts on the ledger itself. External key
//! pairs produce 65-byte recoverable signatures (`r || s || v`) that are
//! checked by recovering the signer's Ethereum-style address.

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::address::{ExternalAddress, NativeAddress};
use super::hash::Hash32;

/// Length of a recoverable external signature
pub const EXTERNAL_SIGNATURE_LEN: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A native account key pair
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Native address of this key
    pub fn address(&self) -> NativeAddress {
        NativeAddress::from_public_key(&self.public_key)
    }
}

/// A key pair for an external (Ethereum-style) signer
#[derive(Clone)]
pub struct ExternalKeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl ExternalKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create from raw secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Ethereum-style address of this key
    pub fn address(&self) -> ExternalAddress {
        ExternalAddress::from_public_key(&self.public_key)
    }

    /// Sign a 32-byte digest, returning `r || s || v` with `v` in {27, 28}
    pub fn sign_digest(&self, digest: &Hash32) -> [u8; EXTERNAL_SIGNATURE_LEN] {
        let secp = Secp256k1::new();
        let message = Message::from_digest(*digest);
        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut out = [0u8; EXTERNAL_SIGNATURE_LEN];
        out[..64].copy_from_slice(&compact);
        out[64] = 27 + recovery_id.to_i32() as u8;
        out
    }
}

/// Recover the external address that produced `signature` over `digest`
///
/// Accepts both raw (0/1) and Ethereum-offset (27/28) recovery ids.
pub fn recover_external_address(
    digest: &Hash32,
    signature: &[u8; EXTERNAL_SIGNATURE_LEN],
) -> Result<ExternalAddress, KeyError> {
    let v = signature[64];
    let rec_id = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(KeyError::InvalidRecoveryId(v)),
    };
    let recovery_id = RecoveryId::from_i32(rec_id as i32)?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|_| KeyError::InvalidSignature)?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    let public_key = secp.recover_ecdsa(&message, &recoverable)?;
    Ok(ExternalAddress::from_public_key(&public_key))
}
