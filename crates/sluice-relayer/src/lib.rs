//! sluice relayer
//!
//! async orchestration over the pool primitives: indexes insertion
//! events from the remote ledger, keeps the local merkle tree current,
//! builds and confirms deposit/withdraw transactions, and exposes a
//! wallet-facing facade.
//!
//! the remote ledger is reached only through the [`rpc::LedgerRpc`]
//! port; production uses the json-rpc adapter in [`http`], tests plug
//! in their own implementation.

pub mod addresses;
pub mod builder;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod rpc;
pub mod signer;

pub use addresses::ProgramAddresses;
pub use builder::{DepositReceipt, PoolTxBuilder, WithdrawReceipt};
pub use client::{DepositOutcome, PoolClient, WithdrawOutcome};
pub use config::RelayerConfig;
pub use core::{IndexOutcome, IndexedCommitment, RelayerCore};
pub use error::{RelayerError, Result};
pub use http::HttpLedgerRpc;
pub use rpc::{Address, Blockhash, Instruction, LedgerRpc, SignatureStatus, TxLogs};
pub use signer::RelayerSigner;
