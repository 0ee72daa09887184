//! client facade
//!
//! composes the store, builder and core into deposit/withdraw/balance
//! operations. everything is validated before the first network call,
//! and no error crosses this boundary as a panic or a raw Err: callers
//! get an outcome struct with `success` and an error string.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, warn};

use sluice_pool::{Commitment, CommitmentBundle, StoredUtxo, TokenKind, UtxoStore};

use crate::builder::PoolTxBuilder;
use crate::config::RelayerConfig;
use crate::core::{IndexOutcome, RelayerCore};
use crate::error::{RelayerError, Result};
use crate::rpc::Address;

/// attempts made to observe a change commitment through indexing
const CHANGE_INDEX_ATTEMPTS: usize = 5;

#[derive(Debug)]
pub struct DepositOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub signature: Option<String>,
    pub utxo: Option<StoredUtxo>,
}

impl DepositOutcome {
    fn failure(e: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(e.to_string()),
            signature: None,
            utxo: None,
        }
    }
}

#[derive(Debug)]
pub struct WithdrawOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub signature: Option<String>,
    pub fee: u64,
    pub payout: u64,
    pub change: Option<StoredUtxo>,
}

impl WithdrawOutcome {
    fn failure(e: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(e.to_string()),
            signature: None,
            fee: 0,
            payout: 0,
            change: None,
        }
    }
}

pub struct PoolClient {
    core: Arc<RelayerCore>,
    builder: PoolTxBuilder,
    store: Mutex<UtxoStore>,
}

impl PoolClient {
    pub fn new(core: Arc<RelayerCore>, store: UtxoStore, config: &RelayerConfig) -> Self {
        Self {
            builder: PoolTxBuilder::new(core.clone(), config),
            core,
            store: Mutex::new(store),
        }
    }

    /// deposit `amount` of `token` into the pool
    pub async fn deposit(&self, token: TokenKind, amount: u64) -> DepositOutcome {
        if amount == 0 {
            return DepositOutcome::failure("deposit amount must be positive");
        }
        match self.deposit_inner(token, amount).await {
            Ok((signature, utxo)) => DepositOutcome {
                success: true,
                error: None,
                signature: Some(signature),
                utxo: Some(utxo),
            },
            Err(e) => DepositOutcome::failure(e),
        }
    }

    async fn deposit_inner(&self, token: TokenKind, amount: u64) -> Result<(String, StoredUtxo)> {
        // a transient indexing failure must not block the deposit
        if let Err(e) = self.core.index_commitments().await {
            warn!("pre-deposit indexing failed: {}", e);
        }

        let bundle = CommitmentBundle::generate(amount, &mut rand::thread_rng());
        let receipt = self.builder.deposit(&token, &bundle).await?;

        let utxo = StoredUtxo {
            commitment: bundle.commitment,
            nullifier: bundle.nullifier,
            secret: bundle.secret,
            value: amount,
            leaf_index: receipt.leaf_index,
            encrypted_output: receipt.encrypted_output,
            spent: false,
            token,
        };
        self.store.lock().await.add(utxo.clone())?;

        // fold the fresh insertion into the local tree
        if let Err(e) = self.core.index_commitments().await {
            warn!("post-deposit indexing failed: {}", e);
        }

        Ok((receipt.signature, utxo))
    }

    /// withdraw `amount` of `token` to `recipient`
    ///
    /// spends exactly one unspent output; the on-chain withdrawal shape
    /// carries a single nullifier, so an amount only coverable by
    /// combining outputs is rejected explicitly.
    pub async fn withdraw(
        &self,
        token: TokenKind,
        amount: u64,
        recipient: &Address,
    ) -> WithdrawOutcome {
        if amount == 0 {
            return WithdrawOutcome::failure("withdrawal amount must be positive");
        }

        let utxo = {
            let store = self.store.lock().await;
            let available = store.total_balance(&token);
            if available < amount as u128 {
                return WithdrawOutcome::failure(RelayerError::InsufficientBalance {
                    required: amount,
                    available,
                });
            }
            match store.select_for_amount(&token, amount) {
                Some(selection) if selection.len() == 1 => selection[0].clone(),
                Some(_) => {
                    return WithdrawOutcome::failure(RelayerError::NoSingleOutputCovers {
                        required: amount,
                    })
                }
                None => {
                    return WithdrawOutcome::failure(RelayerError::InsufficientBalance {
                        required: amount,
                        available,
                    })
                }
            }
        };

        match self.withdraw_inner(token, &utxo, amount, recipient).await {
            Ok(outcome) => outcome,
            Err(e) => WithdrawOutcome::failure(e),
        }
    }

    async fn withdraw_inner(
        &self,
        token: TokenKind,
        utxo: &StoredUtxo,
        amount: u64,
        recipient: &Address,
    ) -> Result<WithdrawOutcome> {
        let receipt = self.builder.withdraw(&token, utxo, amount, recipient).await?;

        // the on-chain spend is confirmed at this point
        self.store.lock().await.mark_spent(&utxo.commitment)?;

        let change = match receipt.change {
            Some(bundle) => self.fold_change(token, bundle, utxo.value - amount).await,
            None => None,
        };

        Ok(WithdrawOutcome {
            success: true,
            error: None,
            signature: Some(receipt.signature),
            fee: receipt.fee,
            payout: receipt.payout,
            change,
        })
    }

    /// persist a change commitment as a fresh output once it has been
    /// observed back through indexing
    async fn fold_change(
        &self,
        token: TokenKind,
        bundle: CommitmentBundle,
        value: u64,
    ) -> Option<StoredUtxo> {
        let entry = match self
            .core
            .wait_for_commitment(&bundle.commitment, CHANGE_INDEX_ATTEMPTS)
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                // the withdrawal itself succeeded; the change will be
                // recoverable from the ledger once it is indexed
                error!(
                    "change commitment {} not indexed yet: {}",
                    bundle.commitment.to_hex(),
                    e
                );
                return None;
            }
        };

        let change_utxo = StoredUtxo {
            commitment: bundle.commitment,
            nullifier: bundle.nullifier,
            secret: bundle.secret,
            value,
            leaf_index: entry.index,
            encrypted_output: entry.encrypted_output,
            spent: false,
            token,
        };
        match self.store.lock().await.add(change_utxo.clone()) {
            Ok(_) => Some(change_utxo),
            Err(e) => {
                error!("failed to persist change output: {}", e);
                None
            }
        }
    }

    /// unspent balance for a token kind, computed locally
    pub async fn balance(&self, token: &TokenKind) -> u128 {
        self.store.lock().await.total_balance(token)
    }

    /// all tracked outputs, spent included
    pub async fn utxos(&self) -> Vec<StoredUtxo> {
        self.store.lock().await.all().to_vec()
    }

    pub async fn utxo(&self, commitment: &Commitment) -> Option<StoredUtxo> {
        self.store.lock().await.get(commitment).cloned()
    }

    /// force an indexing pass
    pub async fn sync(&self) -> Result<IndexOutcome> {
        self.core.index_commitments().await
    }

    /// local and remote tree roots
    pub async fn roots(&self) -> Result<([u8; 32], [u8; 32])> {
        let local = self.core.local_root().await;
        let remote = self.core.ledger_state().await?.current_root;
        Ok((local, remote))
    }
}
