//! sluice CLI
//!
//! wallet-side entry point for the privacy pool: deposit, withdraw,
//! balance, sync and root inspection against a remote ledger.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use sluice_pool::{TokenKind, UtxoStore};
use sluice_relayer::{
    Address, HttpLedgerRpc, PoolClient, ProgramAddresses, RelayerConfig, RelayerCore,
    RelayerSigner,
};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "privacy pool client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// remote ledger json-rpc endpoint
    #[arg(long, env = "SLUICE_RPC_URL")]
    rpc_url: Option<String>,

    /// hex-encoded pool program id
    #[arg(long, env = "SLUICE_PROGRAM_ID")]
    program_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// deposit into the pool
    Deposit {
        #[arg(long)]
        amount: u64,

        /// hex-encoded token mint; native asset when omitted
        #[arg(long)]
        mint: Option<String>,
    },

    /// withdraw from the pool
    Withdraw {
        #[arg(long)]
        amount: u64,

        /// hex-encoded recipient address
        #[arg(long)]
        recipient: String,

        #[arg(long)]
        mint: Option<String>,
    },

    /// show the unspent balance
    Balance {
        #[arg(long)]
        mint: Option<String>,
    },

    /// index new insertion events and rebuild the local tree
    Sync,

    /// show local and remote tree roots
    Root,
}

fn token_kind(mint: &Option<String>) -> anyhow::Result<TokenKind> {
    match mint {
        None => Ok(TokenKind::Native),
        Some(s) => {
            let bytes: [u8; 32] = hex::decode(s)
                .context("mint must be hex")?
                .try_into()
                .map_err(|_| anyhow::anyhow!("mint must be 32 bytes"))?;
            Ok(TokenKind::Token { mint: bytes })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice=info,sluice_relayer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RelayerConfig::from_env();
    if let Some(url) = cli.rpc_url {
        config.rpc_url = url;
    }
    if let Some(program) = cli.program_id {
        config.program_id = program;
    }

    let signer = match &config.signer_key {
        Some(key) => RelayerSigner::from_hex(key)?,
        None => {
            info!("no signing key configured, using an ephemeral key");
            RelayerSigner::generate()
        }
    };

    let program = Address::from_hex(&config.program_id)?;
    let rpc = Arc::new(HttpLedgerRpc::new(&config.rpc_url));
    let core = Arc::new(RelayerCore::new(
        rpc,
        signer,
        ProgramAddresses::new(program),
        &config,
    ));
    let store = UtxoStore::open(&config.store_path)?;
    let client = PoolClient::new(core, store, &config);

    match cli.command {
        Commands::Deposit { amount, mint } => {
            let token = token_kind(&mint)?;
            let outcome = client.deposit(token, amount).await;
            if !outcome.success {
                bail!("deposit failed: {}", outcome.error.unwrap_or_default());
            }
            let utxo = outcome.utxo.context("deposit outcome missing utxo")?;
            println!("signature:  {}", outcome.signature.unwrap_or_default());
            println!("commitment: {}", utxo.commitment.to_hex());
            println!("leaf index: {}", utxo.leaf_index);
        }

        Commands::Withdraw {
            amount,
            recipient,
            mint,
        } => {
            let token = token_kind(&mint)?;
            let recipient = Address::from_hex(&recipient)?;
            let outcome = client.withdraw(token, amount, &recipient).await;
            if !outcome.success {
                bail!("withdrawal failed: {}", outcome.error.unwrap_or_default());
            }
            println!("signature: {}", outcome.signature.unwrap_or_default());
            println!("payout:    {}", outcome.payout);
            println!("fee:       {}", outcome.fee);
            if let Some(change) = outcome.change {
                println!(
                    "change:    {} at leaf {}",
                    change.value, change.leaf_index
                );
            }
        }

        Commands::Balance { mint } => {
            let token = token_kind(&mint)?;
            println!("{}", client.balance(&token).await);
        }

        Commands::Sync => {
            let outcome = client.sync().await?;
            println!(
                "indexed {} new commitments ({} total), root {}",
                outcome.new_commitments,
                outcome.total_indexed,
                hex::encode(outcome.root)
            );
        }

        Commands::Root => {
            let (local, remote) = client.roots().await?;
            println!("local:  {}", hex::encode(local));
            println!("remote: {}", hex::encode(remote));
            if local != remote {
                println!("(diverged; run `sluice sync` to push the local checkpoint)");
            }
        }
    }

    Ok(())
}
