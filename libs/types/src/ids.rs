//! Identifier types for custody and registry entities
//!
//! Addresses identify accounts, vault instances and directory instances.
//! Request identifiers are 32-byte values chosen by the authorizing backend;
//! `RequestId::generate` derives one from UUID v7 entropy.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ParseError;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// 20-byte account identity
///
/// `Address::ZERO` is the null identity and is rejected wherever a real
/// account is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive an address from arbitrary key material.
    ///
    /// Takes the last 20 bytes of SHA-256 over the input.
    pub fn from_key_material(material: &[u8]) -> Self {
        let hash: [u8; 32] = Sha256::digest(material).into();
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..32]);
        Self(out)
    }

    /// Deterministic address for a human-readable label (deployments, tests).
    pub fn from_label(label: &str) -> Self {
        Self::from_key_material(label.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_fixed::<20>(s)?;
        Ok(Self(bytes))
    }
}

/// 32-byte request identifier carried by authorization payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId([u8; 32]);

impl RequestId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh identifier from UUID v7 entropy, hashed to 32 bytes
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        Self(Sha256::digest(uuid.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for RequestId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_fixed::<32>(s)?;
        Ok(Self(bytes))
    }
}

/// Network identifier, bound into every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset held in custody
///
/// `Native` is the chain's own currency; tokens are addressed by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "address")]
pub enum AssetId {
    Native,
    Token(Address),
}

impl AssetId {
    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }

    /// Address form used on the wire; native currency is the null address
    pub fn address(&self) -> Address {
        match self {
            AssetId::Native => Address::ZERO,
            AssetId::Token(addr) => *addr,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(addr) => write!(f, "token:{}", addr),
        }
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|_| ParseError::InvalidHex {
        input: s.to_string(),
    })?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| ParseError::InvalidLength {
        expected: N,
        actual: len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_label("broker").is_zero());
        assert_eq!(Address::default(), Address::ZERO);
    }

    #[test]
    fn test_address_from_label_deterministic() {
        assert_eq!(Address::from_label("vault"), Address::from_label("vault"));
        assert_ne!(Address::from_label("vault"), Address::from_label("registry"));
    }

    #[test]
    fn test_address_display_parse() {
        let addr = Address::from_label("alice");
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 42);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_wrong_length() {
        let result = "0xabcd".parse::<Address>();
        assert_eq!(
            result,
            Err(ParseError::InvalidLength {
                expected: 20,
                actual: 2
            })
        );
    }

    #[test]
    fn test_address_parse_bad_hex() {
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(ParseError::InvalidHex { .. })
        ));
    }

    #[test]
    fn test_request_id_generate_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b, "RequestIds should be unique");
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::from_bytes([7u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_asset_id_address() {
        let token = Address::from_label("usdc");
        assert_eq!(AssetId::Native.address(), Address::ZERO);
        assert_eq!(AssetId::Token(token).address(), token);
        assert!(AssetId::Native.is_native());
        assert!(!AssetId::Token(token).is_native());
    }

    #[test]
    fn test_asset_id_serialization() {
        let asset = AssetId::Token(Address::from_label("usdc"));
        let json = serde_json::to_string(&asset).unwrap();
        assert!(json.contains("\"type\":\"Token\""));
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(asset, back);
    }
}
