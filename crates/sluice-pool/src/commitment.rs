//! commitment scheme for pool deposits
//!
//! a deposit publishes `commitment = H(value, H(nullifier, secret))` as a
//! tree leaf. spending publishes `H(nullifier)` so the same output can
//! never be spent twice, without revealing which leaf was spent.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::hash::{field_from_u64, poseidon1, poseidon2};

/// commitment inserted as a leaf in the pool tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// the all-zero sentinel: "fully spent, no change output"
    pub const ZERO: Commitment = Commitment([0u8; 32]);

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// single-use spend secret; its hash is published at spend time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// `H(nullifier)`, published when the output is spent
    pub fn hash(&self) -> NullifierHash {
        NullifierHash(poseidon1(&self.0))
    }
}

/// blinding secret paired with the nullifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(pub [u8; 32]);

impl Secret {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// hash of a nullifier as recorded by the remote ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NullifierHash(pub [u8; 32]);

impl NullifierHash {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// everything derived for one deposit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitmentBundle {
    pub value: u64,
    pub nullifier: Nullifier,
    pub secret: Secret,
    pub precommitment: [u8; 32],
    pub commitment: Commitment,
}

impl CommitmentBundle {
    /// draw fresh spend material and derive the commitment for `value`
    ///
    /// nullifier and secret are 31 random bytes, leaving one byte of
    /// head-room so they sit strictly below the BN254 field modulus
    /// without reduction bias.
    pub fn generate<R: RngCore>(value: u64, rng: &mut R) -> Self {
        let nullifier = Nullifier(random_field_element(rng));
        let secret = Secret(random_field_element(rng));
        Self::derive(value, nullifier, secret)
    }

    /// deterministic derivation from existing spend material
    pub fn derive(value: u64, nullifier: Nullifier, secret: Secret) -> Self {
        let precommitment = poseidon2(&nullifier.0, &secret.0);
        let commitment = Commitment(poseidon2(&field_from_u64(value), &precommitment));
        Self {
            value,
            nullifier,
            secret,
            precommitment,
            commitment,
        }
    }
}

fn random_field_element<R: RngCore>(rng: &mut R) -> [u8; 32] {
    let mut out = [0u8; 32];
    // leading byte stays zero: 31-byte values cannot exceed the modulus
    rng.fill_bytes(&mut out[1..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::poseidon2;

    #[test]
    fn test_commitment_determinism() {
        let nullifier = Nullifier([3u8; 32]);
        let secret = Secret([5u8; 32]);
        let a = CommitmentBundle::derive(1000, nullifier, secret);
        let b = CommitmentBundle::derive(1000, nullifier, secret);
        assert_eq!(a, b);

        // commitment == H(value, H(nullifier, secret))
        let pre = poseidon2(&nullifier.0, &secret.0);
        let expected = poseidon2(&field_from_u64(1000), &pre);
        assert_eq!(a.commitment.to_bytes(), expected);
        assert_eq!(a.precommitment, pre);
    }

    #[test]
    fn test_generate_draws_distinct_material() {
        let mut rng = rand::thread_rng();
        let a = CommitmentBundle::generate(42, &mut rng);
        let b = CommitmentBundle::generate(42, &mut rng);
        assert_ne!(a.nullifier, b.nullifier);
        assert_ne!(a.secret, b.secret);
        assert_ne!(a.commitment, b.commitment);
    }

    #[test]
    fn test_secrets_leave_modulus_headroom() {
        let mut rng = rand::thread_rng();
        for _ in 0..16 {
            let bundle = CommitmentBundle::generate(1, &mut rng);
            assert_eq!(bundle.nullifier.0[0], 0);
            assert_eq!(bundle.secret.0[0], 0);
        }
    }

    #[test]
    fn test_nullifier_hash_matches_poseidon1() {
        let nullifier = Nullifier([9u8; 32]);
        assert_eq!(
            nullifier.hash().to_bytes(),
            crate::hash::poseidon1(&nullifier.0)
        );
    }

    #[test]
    fn test_zero_sentinel() {
        assert!(Commitment::ZERO.is_zero());
        assert!(!Commitment([1u8; 32]).is_zero());
    }
}
