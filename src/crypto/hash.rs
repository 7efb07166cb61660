//! Structured hashing and key derivation
//!
//! Every mapping in the engine is keyed by a 32-byte digest built from
//! several logical fields. Fields are length-prefixed so that two different
//! field sequences can never encode to the same byte string.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// A 32-byte digest used as a lookup key or payload hash
pub type Hash32 = [u8; 32];

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Which digest a [`StructuredHasher`] finishes with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashScheme {
    Sha256,
    Keccak256,
}

/// Canonical, order-preserving encoder for composite records
///
/// The encoding is `domain || (len_u32_le || field)*`. The domain tag keeps
/// keys of different tables apart even when their fields coincide.
#[derive(Clone, Debug)]
pub struct StructuredHasher {
    scheme: HashScheme,
    buffer: Vec<u8>,
}

impl StructuredHasher {
    /// Start a SHA-256 structured hash under a domain tag
    pub fn new(domain: &str) -> Self {
        Self::with_scheme(HashScheme::Sha256, domain)
    }

    /// Start a structured hash with an explicit digest
    pub fn with_scheme(scheme: HashScheme, domain: &str) -> Self {
        let mut hasher = Self {
            scheme,
            buffer: Vec::with_capacity(128),
        };
        hasher.push(domain.as_bytes());
        hasher
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    /// Append a raw byte field
    pub fn field(mut self, bytes: &[u8]) -> Self {
        self.push(bytes);
        self
    }

    /// Append a single byte field
    pub fn u8(self, value: u8) -> Self {
        self.field(&[value])
    }

    /// Append a u32 field (little endian)
    pub fn u32(self, value: u32) -> Self {
        self.field(&value.to_le_bytes())
    }

    /// Append a u64 field (little endian)
    pub fn u64(self, value: u64) -> Self {
        self.field(&value.to_le_bytes())
    }

    /// Produce the digest
    pub fn finish(self) -> Hash32 {
        match self.scheme {
            HashScheme::Sha256 => sha256(&self.buffer),
            HashScheme::Keccak256 => keccak256(&self.buffer),
        }
    }
}
