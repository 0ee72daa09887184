//! poseidon hashing over BN254
//!
//! circom-parameterized poseidon, operating on 32-byte big-endian field
//! representations. this is the hash the remote pool program uses for
//! its commitment tree, so local and remote roots agree byte-for-byte.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};

fn fr_from_be(bytes: &[u8; 32]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

fn fr_to_be(value: Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&value.into_bigint().to_bytes_be());
    out
}

/// poseidon hash of one field element
///
/// used for nullifier hashes: `nullifier_hash = poseidon1(nullifier)`
pub fn poseidon1(a: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Poseidon::<Fr>::new_circom(1).expect("poseidon width 1");
    let out = hasher.hash(&[fr_from_be(a)]).expect("poseidon hash");
    fr_to_be(out)
}

/// poseidon hash of two field elements
///
/// used for precommitments, commitments and merkle nodes
pub fn poseidon2(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Poseidon::<Fr>::new_circom(2).expect("poseidon width 2");
    let out = hasher
        .hash(&[fr_from_be(a), fr_from_be(b)])
        .expect("poseidon hash");
    fr_to_be(out)
}

/// encode a u64 amount as a 32-byte big-endian field element
pub fn field_from_u64(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poseidon_deterministic() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(poseidon2(&a, &b), poseidon2(&a, &b));
        assert_eq!(poseidon1(&a), poseidon1(&a));
    }

    #[test]
    fn test_poseidon_order_matters() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_ne!(poseidon2(&a, &b), poseidon2(&b, &a));
    }

    #[test]
    fn test_output_is_canonical_field_element() {
        // output must round-trip through the field without reduction
        let h = poseidon2(&[7u8; 32], &[9u8; 32]);
        assert_eq!(fr_to_be(fr_from_be(&h)), h);
    }

    #[test]
    fn test_field_from_u64() {
        let f = field_from_u64(1);
        assert_eq!(f[31], 1);
        assert!(f[..31].iter().all(|&b| b == 0));
    }
}
