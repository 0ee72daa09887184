//! sluice pool ledger primitives
//!
//! client-side building blocks for a commitment/nullifier privacy pool:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PRIVACY POOL                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  remote ledger (source of truth)                             │
//! │  ├─ append-only commitment tree (root + root history)        │
//! │  ├─ one-time nullifier records (spent outputs)               │
//! │  └─ leaf-insertion events in transaction logs                │
//! │                                                              │
//! │  this crate (pure, no I/O)                                   │
//! │  ├─ poseidon commitment scheme                               │
//! │  ├─ merkle ledger rebuilt from indexed events                │
//! │  ├─ utxo store with coin selection                           │
//! │  └─ wire codec for events, instructions, account layouts     │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod hash;
pub mod tree;
pub mod utxo;
pub mod wire;

pub use commitment::{Commitment, CommitmentBundle, Nullifier, NullifierHash, Secret};
pub use tree::{Freshness, MerkleLedger, MerkleProof};
pub use utxo::{StoredUtxo, TokenKind, UtxoStore};
pub use wire::{LeafEvent, LedgerState, PoolConfigState, WithdrawInputs};

use thiserror::Error;

/// fixed height of the commitment tree
pub const TREE_HEIGHT: usize = 20;
/// number of roots kept in the remote ring buffer
pub const ROOT_HISTORY_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;
