use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Principal identity: 20 bytes, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The null address. Never owns a token.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Last 20 bytes of SHA-256 over the public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected 20 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let raw = hex::decode(s)?;
        let bytes: [u8; 20] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::Length(raw.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn parses_with_and_without_prefix() {
        let text = "0x00000000000000000000000000000000000000aa";
        let a: Address = text.parse().unwrap();
        let b: Address = text.trim_start_matches("0x").parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), text);
        assert!(!a.is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn rejects_wrong_length() {
        let err = "0xdeadbeef".parse::<Address>().unwrap_err();
        assert!(matches!(err, AddressParseError::Length(4)));
    }

    #[test]
    fn serde_uses_hex_text() {
        let addr = Address::new([7u8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn key_derivation_is_stable() {
        let sk = SigningKey::generate(&mut OsRng);
        let vk = sk.verifying_key();
        assert_eq!(Address::from_verifying_key(&vk), Address::from_verifying_key(&vk));
    }
}
