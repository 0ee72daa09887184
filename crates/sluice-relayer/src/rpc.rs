//! typed port to the remote ledger
//!
//! the orchestration layer depends only on this trait; the http adapter
//! and the test ledger both implement it.

use serde::{Deserialize, Serialize};

use crate::error::{RelayerError, Result};

/// 32-byte account address on the remote ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| RelayerError::Validation(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RelayerError::Validation("address must be 32 bytes".into()))?;
        Ok(Self(bytes))
    }
}

/// one signed instruction submitted to the ledger program
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instruction {
    pub program: Address,
    pub accounts: Vec<Address>,
    pub data: Vec<u8>,
}

/// log records emitted by one transaction, oldest record first
#[derive(Clone, Debug)]
pub struct TxLogs {
    pub signature: String,
    pub records: Vec<Vec<u8>>,
}

/// blockhash plus the height up to which it stays valid
#[derive(Clone, Copy, Debug)]
pub struct Blockhash {
    pub hash: [u8; 32],
    pub last_valid_height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    Pending,
    Confirmed,
    Failed(String),
}

/// narrow view of the remote ledger used by the relayer
#[async_trait::async_trait]
pub trait LedgerRpc: Send + Sync {
    /// raw account bytes, None when the account does not exist
    async fn read_account(&self, address: &Address) -> Result<Option<Vec<u8>>>;

    /// transactions touching an account, most recent first
    async fn logs_for_account(&self, address: &Address, limit: usize) -> Result<Vec<TxLogs>>;

    /// submit a signed instruction; returns the transaction signature
    async fn submit_instruction(
        &self,
        instruction: &Instruction,
        signature: &[u8; 64],
        signer: &Address,
    ) -> Result<String>;

    async fn signature_status(&self, signature: &str) -> Result<SignatureStatus>;

    async fn block_height(&self) -> Result<u64>;

    async fn latest_blockhash(&self) -> Result<Blockhash>;
}
