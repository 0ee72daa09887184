//! utxo store
//!
//! persisted set of pool outputs owned by this wallet. records are
//! append-only: spending flips `spent` exactly once and nothing is ever
//! physically deleted, so the store doubles as an audit trail.

use serde::{Deserialize, Serialize};
use sled::Db;
use tracing::debug;

use crate::commitment::{Commitment, Nullifier, Secret};
use crate::{PoolError, Result};

/// asset class of a pool output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// the ledger's native asset
    Native,
    /// fungible token identified by its mint
    Token { mint: [u8; 32] },
}

/// one spendable (or spent) pool output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredUtxo {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
    pub secret: Secret,
    pub value: u64,
    /// position assigned by the remote ledger at insertion
    pub leaf_index: u64,
    /// opaque note blob as emitted in the insertion event
    pub encrypted_output: Vec<u8>,
    pub spent: bool,
    pub token: TokenKind,
}

/// sled-backed utxo set with an insertion-ordered in-memory mirror
///
/// the store instance is the single authority for spent/unspent status;
/// callers mark outputs spent only after the on-chain operation is
/// confirmed.
pub struct UtxoStore {
    db: Db,
    utxos: Vec<StoredUtxo>,
    keys: Vec<u64>,
}

impl UtxoStore {
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Self::load(db)
    }

    /// throwaway store for tests and ephemeral sessions
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::load(db)
    }

    fn load(db: Db) -> Result<Self> {
        let mut utxos = Vec::new();
        let mut keys = Vec::new();
        // sled iterates keys in order; keys are big-endian insertion ids
        for entry in db.iter() {
            let (key, value) = entry?;
            let id = u64::from_be_bytes(
                key.as_ref()
                    .try_into()
                    .map_err(|_| PoolError::Codec("bad utxo key".into()))?,
            );
            let utxo: StoredUtxo =
                bincode::deserialize(&value).map_err(|e| PoolError::Codec(e.to_string()))?;
            keys.push(id);
            utxos.push(utxo);
        }
        debug!("loaded {} utxos from store", utxos.len());
        Ok(Self { db, utxos, keys })
    }

    fn persist(&self, id: u64, utxo: &StoredUtxo) -> Result<()> {
        let bytes = bincode::serialize(utxo).map_err(|e| PoolError::Codec(e.to_string()))?;
        self.db.insert(id.to_be_bytes(), bytes)?;
        Ok(())
    }

    /// insert unless an output with the same commitment already exists
    ///
    /// returns true when the output was actually added
    pub fn add(&mut self, utxo: StoredUtxo) -> Result<bool> {
        if self.get(&utxo.commitment).is_some() {
            return Ok(false);
        }
        let id = self.keys.last().map(|k| k + 1).unwrap_or(0);
        self.persist(id, &utxo)?;
        self.keys.push(id);
        self.utxos.push(utxo);
        Ok(true)
    }

    /// flip `spent` for the matching output; no-op if not found
    ///
    /// the transition is one-way: a spent output never becomes unspent
    pub fn mark_spent(&mut self, commitment: &Commitment) -> Result<bool> {
        let Some(pos) = self.utxos.iter().position(|u| u.commitment == *commitment) else {
            return Ok(false);
        };
        if !self.utxos[pos].spent {
            self.utxos[pos].spent = true;
            self.persist(self.keys[pos], &self.utxos[pos])?;
        }
        Ok(true)
    }

    pub fn get(&self, commitment: &Commitment) -> Option<&StoredUtxo> {
        self.utxos.iter().find(|u| u.commitment == *commitment)
    }

    /// unspent outputs matching the token kind, in store order
    pub fn unspent(&self, token: &TokenKind) -> Vec<&StoredUtxo> {
        self.utxos
            .iter()
            .filter(|u| !u.spent && u.token == *token)
            .collect()
    }

    /// sum of unspent values for a token kind
    pub fn total_balance(&self, token: &TokenKind) -> u128 {
        self.unspent(token).iter().map(|u| u.value as u128).sum()
    }

    /// coin selection for a required amount
    ///
    /// prefers a single output with `value >= required` (fewest on-chain
    /// inputs); otherwise accumulates outputs greedily in store order.
    /// returns None when the whole unspent set is insufficient.
    pub fn select_for_amount(&self, token: &TokenKind, required: u64) -> Option<Vec<&StoredUtxo>> {
        let unspent = self.unspent(token);
        if let Some(single) = unspent.iter().find(|u| u.value >= required) {
            return Some(vec![single]);
        }

        let mut selected = Vec::new();
        let mut total: u128 = 0;
        for utxo in unspent {
            selected.push(utxo);
            total += utxo.value as u128;
            if total >= required as u128 {
                return Some(selected);
            }
        }
        None
    }

    /// every tracked output in insertion order, spent included
    pub fn all(&self) -> &[StoredUtxo] {
        &self.utxos
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn utxo(tag: u8, value: u64, token: TokenKind) -> StoredUtxo {
        StoredUtxo {
            commitment: Commitment([tag; 32]),
            nullifier: Nullifier([tag; 32]),
            secret: Secret([tag; 32]),
            value,
            leaf_index: tag as u64,
            encrypted_output: vec![tag; 4],
            spent: false,
            token,
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = UtxoStore::in_memory().unwrap();
        assert!(store.add(utxo(1, 100, TokenKind::Native)).unwrap());
        assert!(!store.add(utxo(1, 100, TokenKind::Native)).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_no_double_spend() {
        let mut store = UtxoStore::in_memory().unwrap();
        store.add(utxo(1, 100, TokenKind::Native)).unwrap();
        store.add(utxo(2, 200, TokenKind::Native)).unwrap();

        assert!(store.mark_spent(&Commitment([1u8; 32])).unwrap());
        let unspent = store.unspent(&TokenKind::Native);
        assert_eq!(unspent.len(), 1);
        assert!(unspent.iter().all(|u| u.commitment != Commitment([1u8; 32])));

        // record survives for auditing
        assert!(store.get(&Commitment([1u8; 32])).unwrap().spent);
        // unknown commitment is a no-op
        assert!(!store.mark_spent(&Commitment([9u8; 32])).unwrap());
    }

    #[test]
    fn test_token_filter() {
        let mint_a = TokenKind::Token { mint: [0xaa; 32] };
        let mint_b = TokenKind::Token { mint: [0xbb; 32] };
        let mut store = UtxoStore::in_memory().unwrap();
        store.add(utxo(1, 100, TokenKind::Native)).unwrap();
        store.add(utxo(2, 200, mint_a)).unwrap();
        store.add(utxo(3, 300, mint_b)).unwrap();

        assert_eq!(store.unspent(&mint_a).len(), 1);
        assert_eq!(store.total_balance(&mint_a), 200);
        assert_eq!(store.total_balance(&TokenKind::Native), 100);
    }

    #[test]
    fn test_selection_prefers_single_utxo() {
        let mut store = UtxoStore::in_memory().unwrap();
        store.add(utxo(1, 100, TokenKind::Native)).unwrap();
        store.add(utxo(2, 500, TokenKind::Native)).unwrap();

        let selected = store.select_for_amount(&TokenKind::Native, 300).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, 500);
    }

    #[test]
    fn test_selection_combines_when_needed() {
        let mut store = UtxoStore::in_memory().unwrap();
        store.add(utxo(1, 100, TokenKind::Native)).unwrap();
        store.add(utxo(2, 150, TokenKind::Native)).unwrap();
        store.add(utxo(3, 200, TokenKind::Native)).unwrap();

        let selected = store.select_for_amount(&TokenKind::Native, 400).unwrap();
        let total: u64 = selected.iter().map(|u| u.value).sum();
        assert!(total >= 400);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_selection_insufficient_returns_none() {
        let mut store = UtxoStore::in_memory().unwrap();
        store.add(utxo(1, 100, TokenKind::Native)).unwrap();
        assert!(store.select_for_amount(&TokenKind::Native, 101).is_none());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        {
            let mut store = UtxoStore::open(path).unwrap();
            store.add(utxo(1, 100, TokenKind::Native)).unwrap();
            store.add(utxo(2, 200, TokenKind::Native)).unwrap();
            store.mark_spent(&Commitment([1u8; 32])).unwrap();
        }
        let store = UtxoStore::open(path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get(&Commitment([1u8; 32])).unwrap().spent);
        assert_eq!(store.total_balance(&TokenKind::Native), 200);
    }
}
