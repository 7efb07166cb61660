//! Signing operation records
//!
//! A signing operation moves `NONE -> PENDING(round, confirmations) ->
//! COMPLETE`. Staleness is not stored: a pending record is stale once the
//! current height passes `expires_at_block`.

use crate::crypto::{Hash32, StructuredHasher, WalletId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Caller-chosen identifier of a signing operation
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId([u8; 32]);

impl OperationId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// A fresh random id
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// An id derived from the content it authorizes
    pub fn from_content(content: &[u8]) -> Self {
        Self(StructuredHasher::new("multisig.operation-id").field(content).finish())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({}..)", &hex::encode(self.0)[..16])
    }
}

impl FromStr for OperationId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for OperationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OperationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Which execute path may complete an operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Completed by `execute_signing_op` / `execute_bound_signing_op`
    #[default]
    Generic,
    /// Completed only by applying its bound admin command
    Admin,
}

/// A pending round of vote collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningOperation {
    /// Generation counter, 1 on first initiation
    pub round: u32,
    /// Distinct signers who voted in this round
    pub confirmations: u8,
    /// Last height at which the round accepts votes
    pub expires_at_block: u64,
    /// Hash of the command this operation authorizes, if bound
    pub bound_payload_hash: Option<Hash32>,
    #[serde(default)]
    pub kind: OperationKind,
}

impl SigningOperation {
    pub fn is_stale(&self, current_height: u64) -> bool {
        current_height > self.expires_at_block
    }

    pub fn is_bound(&self) -> bool {
        self.bound_payload_hash.is_some()
    }
}

/// Permanent completion tombstone
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOperation {
    /// Height at which the operation executed (always > 0)
    pub completed_at_block: u64,
    /// Round that reached execution
    pub round: u32,
    /// The payload the execution was bound to
    pub bound_payload_hash: Option<Hash32>,
    pub completed_at: DateTime<Utc>,
}

/// Marker that a signer voted in a given round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voted_at_block: u64,
}

/// Externally visible state of an operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    /// Never initiated
    None,
    /// Accepting votes
    Pending {
        round: u32,
        confirmations: u8,
        expires_at_block: u64,
    },
    /// Expired without execution; may be re-initiated
    Stale { round: u32, confirmations: u8 },
    /// Executed; the id can never be used again for this wallet
    Complete { completed_at_block: u64 },
}

/// Outcome of a successful execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub wallet_id: WalletId,
    pub operation_id: OperationId,
    pub round: u32,
    pub confirmations: u8,
    pub completed_at_block: u64,
}
