//! pool transaction builder
//!
//! turns deposits and withdrawals into encoded instructions, submits
//! them, and confirms by polling signature status against the
//! blockhash validity window.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use sluice_pool::wire::{encode_deposit, encode_withdraw, SealedNote};
use sluice_pool::{CommitmentBundle, StoredUtxo, TokenKind, WithdrawInputs};

use crate::config::RelayerConfig;
use crate::core::RelayerCore;
use crate::error::{RelayerError, Result};
use crate::rpc::{Address, SignatureStatus};

pub struct DepositReceipt {
    pub signature: String,
    pub leaf_index: u64,
    pub encrypted_output: Vec<u8>,
}

pub struct WithdrawReceipt {
    pub signature: String,
    pub fee: u64,
    pub payout: u64,
    /// spend material of the change output, when one was created
    pub change: Option<CommitmentBundle>,
}

pub struct PoolTxBuilder {
    core: Arc<RelayerCore>,
    fallback_fee_bps: u16,
    confirm_timeout: Duration,
    confirm_interval: Duration,
}

/// fees above 100% mean a corrupt or hostile config account
const MAX_FEE_BPS: u16 = 10_000;

/// basis-point fee with floor rounding
pub(crate) fn fee_for(amount: u64, bps: u16) -> u64 {
    (amount as u128 * bps as u128 / 10_000) as u64
}

impl PoolTxBuilder {
    pub fn new(core: Arc<RelayerCore>, config: &RelayerConfig) -> Self {
        Self {
            core,
            fallback_fee_bps: config.fallback_fee_bps,
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            confirm_interval: Duration::from_secs(config.confirm_interval_secs),
        }
    }

    fn vault_for(&self, token: &TokenKind) -> Address {
        match token {
            TokenKind::Native => self.core.addresses().vault(),
            TokenKind::Token { mint } => self.core.addresses().vault_for_mint(mint),
        }
    }

    /// encode and submit a deposit for freshly generated spend material
    ///
    /// an ambiguous "already been processed" response is resolved by
    /// checking whether the per-leaf record now exists: if it does, the
    /// earlier submission landed and this call is a retry.
    pub async fn deposit(
        &self,
        token: &TokenKind,
        bundle: &CommitmentBundle,
    ) -> Result<DepositReceipt> {
        let leaf_index = self.core.ledger_state().await?.next_index;
        let encrypted_output = SealedNote {
            value: bundle.value,
            nullifier: bundle.nullifier,
            secret: bundle.secret,
            leaf_index,
        }
        .seal()?;

        let data = encode_deposit(
            token,
            &bundle.commitment,
            &encrypted_output,
            bundle.value,
            leaf_index,
        );
        let accounts = vec![
            self.core.addresses().ledger(),
            self.vault_for(token),
            self.core.addresses().leaf_record(leaf_index),
            self.core.addresses().config(),
        ];

        let signature = match self.core.submit(data, accounts).await {
            Ok(signature) => {
                self.confirm(&signature).await?;
                signature
            }
            Err(e) if e.to_string().contains("already been processed") => {
                if !self.core.leaf_record_exists(leaf_index).await? {
                    return Err(e);
                }
                info!("deposit at leaf {} already landed, treating as success", leaf_index);
                match self.core.wait_for_commitment(&bundle.commitment, 3).await {
                    Ok(entry) => entry.signature,
                    Err(_) => "already-processed".into(),
                }
            }
            Err(e) => return Err(e),
        };

        info!("deposit confirmed: {} at leaf {}", signature, leaf_index);
        Ok(DepositReceipt {
            signature,
            leaf_index,
            encrypted_output,
        })
    }

    /// spend one output: prove membership, publish the nullifier hash,
    /// and derive a change commitment when the output exceeds `amount`
    pub async fn withdraw(
        &self,
        token: &TokenKind,
        utxo: &StoredUtxo,
        amount: u64,
        recipient: &Address,
    ) -> Result<WithdrawReceipt> {
        if amount > utxo.value {
            return Err(RelayerError::Validation(format!(
                "amount {} exceeds output value {}",
                amount, utxo.value
            )));
        }

        let proof = self.core.merkle_proof(&utxo.commitment).await?;
        if !proof.verify(&utxo.commitment) {
            return Err(RelayerError::Validation(
                "stored output does not match the indexed tree".into(),
            ));
        }

        let (fee_bps, fee_recipient) = match self.core.pool_config().await {
            Ok(config) if config.fee_bps <= MAX_FEE_BPS => {
                (config.fee_bps, Some(Address(config.fee_recipient)))
            }
            Ok(config) => {
                warn!(
                    "pool config fee {} bps exceeds {}, using fallback",
                    config.fee_bps, MAX_FEE_BPS
                );
                (self.fallback_fee_bps, Some(Address(config.fee_recipient)))
            }
            Err(e) => {
                warn!("pool config unavailable, using fallback fee: {}", e);
                (self.fallback_fee_bps, None)
            }
        };
        let fee = fee_for(amount, fee_bps);
        let payout = amount.checked_sub(fee).ok_or_else(|| {
            RelayerError::Validation(format!("fee {} exceeds amount {}", fee, amount))
        })?;

        let change_value = utxo.value - amount;
        let change = (change_value > 0)
            .then(|| CommitmentBundle::generate(change_value, &mut rand::thread_rng()));

        let nullifier_hash = utxo.nullifier.hash();
        let inputs = WithdrawInputs {
            nullifier_hash,
            state_root: proof.root,
            new_commitment: change
                .as_ref()
                .map(|c| c.commitment)
                .unwrap_or(sluice_pool::Commitment::ZERO),
        };

        let data = encode_withdraw(token, &inputs, &recipient.0, payout, fee);
        let mut accounts = vec![
            self.core.addresses().ledger(),
            self.vault_for(token),
            self.core.addresses().nullifier_record(&nullifier_hash),
            self.core.addresses().config(),
            *recipient,
        ];
        if let Some(fee_recipient) = fee_recipient {
            accounts.push(fee_recipient);
        }

        let signature = self.core.submit(data, accounts).await?;
        self.confirm(&signature).await?;

        info!(
            "withdrawal confirmed: {} (payout {}, fee {})",
            signature, payout, fee
        );
        Ok(WithdrawReceipt {
            signature,
            fee,
            payout,
            change,
        })
    }

    /// poll signature status until confirmation, failure, timeout, or
    /// expiry of the blockhash validity window
    async fn confirm(&self, signature: &str) -> Result<()> {
        let blockhash = self.core.rpc().latest_blockhash().await?;
        let deadline = Instant::now() + self.confirm_timeout;

        loop {
            match self.core.rpc().signature_status(signature).await? {
                SignatureStatus::Confirmed => return Ok(()),
                SignatureStatus::Failed(e) => return Err(RelayerError::SubmissionFailed(e)),
                SignatureStatus::Pending => {}
            }

            if Instant::now() >= deadline {
                return Err(RelayerError::ConfirmationTimeout(format!(
                    "{} not confirmed within {:?}",
                    signature, self.confirm_timeout
                )));
            }
            if self.core.rpc().block_height().await? > blockhash.last_valid_height {
                return Err(RelayerError::ConfirmationTimeout(
                    "blockhash expired before confirmation".into(),
                ));
            }
            tokio::time::sleep(self.confirm_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_floors() {
        // 300 at 25 bps floors to 0
        assert_eq!(fee_for(300, 25), 0);
        assert_eq!(fee_for(400, 25), 1);
        assert_eq!(fee_for(10_000, 25), 25);
        assert_eq!(fee_for(0, 25), 0);
        // no overflow near u64::MAX
        assert_eq!(fee_for(u64::MAX, 10_000), u64::MAX);
    }
}
