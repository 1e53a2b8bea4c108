use std::{fmt, str::FromStr};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Smallest indivisible unit of the custody asset.
pub type Amount = u64;

/// Allowance value that is never decremented by pulls.
pub const UNLIMITED: Amount = Amount::MAX;

pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Opaque 20-byte account or contract identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Last 20 bytes of SHA-256 over a domain tag and the given parts.
    pub fn derive(domain: &[u8], parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Self(out)
    }

    /// Address of a contract created by `deployer` at `nonce`.
    pub fn contract(deployer: &Address, nonce: u64) -> Self {
        Self::derive(b"hps-contract", &[deployer.as_bytes(), &nonce.to_le_bytes()])
    }

    /// Deterministic development identity, stable across runs.
    pub fn from_seed(seed: &str) -> Self {
        Self::derive(b"hps-dev-account", &[seed.as_bytes()])
    }

    /// Account address bound to an ed25519 verifying key.
    pub fn from_public_key(key: &[u8; 32]) -> Self {
        Self::derive(b"hps-ed25519", &[key])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(trimmed)?;
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressParseError::Length {
                expected: ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// Identifier of a committed call.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let trimmed = encoded.strip_prefix("0x").unwrap_or(&encoded);
        let bytes = hex::decode(trimmed).map_err(D::Error::custom)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("tx hash must be 32 bytes"))?;
        Ok(Self(array))
    }
}
