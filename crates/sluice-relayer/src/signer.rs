//! submission signing

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use crate::error::{RelayerError, Result};
use crate::rpc::Address;

/// ed25519 key the relayer signs submissions with
pub struct RelayerSigner {
    key: SigningKey,
}

impl RelayerSigner {
    /// load from a hex-encoded 32-byte secret
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret).map_err(|e| RelayerError::Signer(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RelayerError::Signer("signing key must be 32 bytes".into()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&bytes),
        })
    }

    /// fresh throwaway key for tests and ephemeral sessions
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// the relayer's on-ledger address is its verifying key
    pub fn address(&self) -> Address {
        Address(self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.key.sign(message).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};

    #[test]
    fn test_hex_roundtrip_and_signature() {
        let secret = [7u8; 32];
        let signer = RelayerSigner::from_hex(&hex::encode(secret)).unwrap();
        let sig = signer.sign(b"payload");

        let key = VerifyingKey::from_bytes(&signer.address().0).unwrap();
        assert!(key
            .verify(b"payload", &ed25519_dalek::Signature::from_bytes(&sig))
            .is_ok());
    }

    #[test]
    fn test_bad_secret_rejected() {
        assert!(RelayerSigner::from_hex("zz").is_err());
        assert!(RelayerSigner::from_hex("0011").is_err());
    }
}
