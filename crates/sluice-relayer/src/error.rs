//! error types for the relayer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u128 },

    #[error("no single unspent output covers {required}; combining outputs is not supported on-chain")]
    NoSingleOutputCovers { required: u64 },

    #[error("commitment not found: {0}")]
    CommitmentNotFound(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("confirmation timed out: {0}")]
    ConfirmationTimeout(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("pool error: {0}")]
    Pool(#[from] sluice_pool::PoolError),
}

pub type Result<T> = std::result::Result<T, RelayerError>;
