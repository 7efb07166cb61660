//! Fixed-size identifiers: wallet ids, native and external signer addresses
//!
//! Native addresses and wallet ids are 20-byte hashes rendered as
//! Base58Check, the same way the ledger renders account and P2SH addresses.
//! External addresses are Ethereum-style 20-byte keccak addresses rendered as
//! `0x`-prefixed hex. The all-zero value of each type is reserved: it marks an
//! unused signer slot and is never a valid signer.

use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::hash::sha256;
use super::keys::KeyError;

/// Length of every address-like identifier
pub const ADDRESS_LEN: usize = 20;

/// Base58Check version byte for native account addresses
pub const NATIVE_VERSION: u8 = 0x00;

/// Base58Check version byte for wallet ids (P2SH-style, renders with '3')
pub const WALLET_VERSION: u8 = 0x05;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; ADDRESS_LEN] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().into()
}

/// Base58Check(version || payload || checksum)
fn encode_check(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(payload.len() + 5);
    bytes.push(version);
    bytes.extend_from_slice(payload);

    // First 4 bytes of double SHA256
    let checksum = Sha256::digest(Sha256::digest(&bytes));
    bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(bytes).into_string()
}

fn decode_check(expected_version: u8, s: &str) -> Result<[u8; ADDRESS_LEN], KeyError> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|_| KeyError::InvalidAddress(s.to_string()))?;
    if bytes.len() != ADDRESS_LEN + 5 || bytes[0] != expected_version {
        return Err(KeyError::InvalidAddress(s.to_string()));
    }

    let (body, checksum) = bytes.split_at(ADDRESS_LEN + 1);
    let expected = Sha256::digest(Sha256::digest(body));
    if checksum != &expected[..4] {
        return Err(KeyError::InvalidAddress(s.to_string()));
    }

    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&body[1..]);
    Ok(out)
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; ADDRESS_LEN]);

        impl $name {
            /// The reserved zero value
            pub const ZERO: Self = Self([0u8; ADDRESS_LEN]);

            pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; ADDRESS_LEN]
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

address_type!(
    /// Address of a signer authenticated by the platform's own key mechanism
    NativeAddress
);

address_type!(
    /// Address of a signer authenticated by an external secp256k1 signature
    ExternalAddress
);

address_type!(
    /// Identifier of a multisig wallet
    WalletId
);

impl NativeAddress {
    /// Address = RIPEMD160(SHA256(compressed public key))
    pub fn from_public_key(public_key: &secp256k1::PublicKey) -> Self {
        Self(hash160(&public_key.serialize()))
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(NATIVE_VERSION, &self.0))
    }
}

impl FromStr for NativeAddress {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_check(NATIVE_VERSION, s).map(Self)
    }
}

impl ExternalAddress {
    /// Ethereum-style address: last 20 bytes of keccak256(uncompressed key without prefix)
    pub fn from_public_key(public_key: &secp256k1::PublicKey) -> Self {
        let hash = super::hash::keccak256(&public_key.serialize_uncompressed()[1..]);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }
}

impl fmt::Display for ExternalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ExternalAddress {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl WalletId {
    /// Derive a wallet id from arbitrary seed material
    pub fn derive(seed: &[u8]) -> Self {
        Self(hash160(seed))
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_check(WALLET_VERSION, &self.0))
    }
}

impl FromStr for WalletId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_check(WALLET_VERSION, s).map(Self)
    }
}
