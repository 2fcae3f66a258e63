//! Signed call envelopes.
//!
//! A caller proves its identity by signing the call with an ed25519 key; the
//! caller address is derived from the verifying key.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::runtime::Call;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed public key")]
    MalformedKey,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature does not match call from {0}")]
    InvalidSignature(Address),
    #[error("call {0} was already applied")]
    Replayed(String),
    #[error("failed to encode call: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedCall {
    pub call: Call,
    /// Distinguishes otherwise identical calls from the same key.
    pub nonce: u64,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl SignedCall {
    pub fn sign(call: Call, nonce: u64, key: &SigningKey) -> Result<Self, AuthError> {
        let digest = call_digest(&call, nonce)?;
        let signature = key.sign(&digest);
        Ok(Self {
            call,
            nonce,
            public_key: key.verifying_key().to_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        })
    }

    pub fn digest(&self) -> Result<[u8; 32], AuthError> {
        call_digest(&self.call, self.nonce)
    }

    /// Checks the signature and returns the signer's address.
    pub fn verify(&self) -> Result<Address, AuthError> {
        let key_bytes: [u8; 32] = self
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::MalformedKey)?;
        let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| AuthError::MalformedKey)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| AuthError::MalformedSignature)?;
        let caller = Address::from_verifying_key(&key);
        key.verify_strict(&self.digest()?, &signature)
            .map_err(|_| AuthError::InvalidSignature(caller))?;
        Ok(caller)
    }
}

fn call_digest(call: &Call, nonce: u64) -> Result<[u8; 32], AuthError> {
    let mut hasher = Sha256::new();
    hasher.update(b"cardwars/call");
    hasher.update(nonce.to_le_bytes());
    hasher.update(serde_json::to_vec(call)?);
    Ok(hasher.finalize().into())
}

pub(crate) mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::OsRng;

    #[test]
    fn signed_call_recovers_caller() {
        let sk = SigningKey::generate(&mut OsRng);
        let signed = SignedCall::sign(Call::Mint { payment: 10 }, 1, &sk).unwrap();
        let caller = signed.verify().unwrap();
        assert_eq!(caller, Address::from_verifying_key(&sk.verifying_key()));
    }

    #[test]
    fn tampered_call_is_rejected() {
        let sk = SigningKey::generate(&mut OsRng);
        let mut signed = SignedCall::sign(Call::Mint { payment: 10 }, 1, &sk).unwrap();
        signed.call = Call::Mint { payment: 1 };
        assert!(matches!(signed.verify(), Err(AuthError::InvalidSignature(_))));
    }

    #[test]
    fn short_key_is_malformed() {
        let sk = SigningKey::generate(&mut OsRng);
        let mut signed = SignedCall::sign(Call::Withdraw, 0, &sk).unwrap();
        signed.public_key.truncate(10);
        assert!(matches!(signed.verify(), Err(AuthError::MalformedKey)));
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let sk = SigningKey::generate(&mut OsRng);
        let signed = SignedCall::sign(Call::Withdraw, 3, &sk).unwrap();
        let json = serde_json::to_string(&signed).unwrap();
        let back: SignedCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verify().unwrap(), signed.verify().unwrap());
    }
}
