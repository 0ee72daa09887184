//! relayer core
//!
//! owns the local merkle ledger and the commitment index, reconstructed
//! from the remote ledger's insertion events. one core instance per
//! process; callers share it behind an Arc and never touch the tree
//! directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sluice_pool::wire::encode_update_root;
use sluice_pool::{Commitment, LeafEvent, LedgerState, MerkleLedger, MerkleProof, PoolConfigState};

use crate::addresses::ProgramAddresses;
use crate::config::RelayerConfig;
use crate::error::{RelayerError, Result};
use crate::rpc::{Address, Instruction, LedgerRpc};
use crate::signer::RelayerSigner;

/// one insertion event, as indexed from transaction logs
#[derive(Clone, Debug)]
pub struct IndexedCommitment {
    pub index: u64,
    pub commitment: Commitment,
    pub encrypted_output: Vec<u8>,
    pub amount: u64,
    pub mint: Option<[u8; 32]>,
    /// signature of the transaction that emitted the event
    pub signature: String,
}

/// result of one indexing pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexOutcome {
    pub new_commitments: usize,
    pub total_indexed: usize,
    pub root: [u8; 32],
}

struct CoreState {
    tree: MerkleLedger,
    entries: Vec<IndexedCommitment>,
    /// dedup key: an encrypted output appears in exactly one event
    by_output: HashMap<Vec<u8>, usize>,
    by_commitment: HashMap<Commitment, usize>,
    by_index: BTreeMap<u64, usize>,
    cached_state: Option<(Instant, LedgerState)>,
    /// outcome of the most recently completed pass, adopted by
    /// coalesced waiters; errors are kept as strings so they clone
    last_pass: Option<std::result::Result<IndexOutcome, String>>,
}

pub struct RelayerCore {
    rpc: Arc<dyn LedgerRpc>,
    signer: RelayerSigner,
    addresses: ProgramAddresses,
    cache_ttl: Duration,
    log_fetch_limit: usize,
    state: Mutex<CoreState>,
    /// bumped once per completed indexing pass; a waiter that parked on
    /// the mutex and observes a bump adopts that pass instead of
    /// running its own
    pass_epoch: AtomicU64,
}

impl RelayerCore {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        signer: RelayerSigner,
        addresses: ProgramAddresses,
        config: &RelayerConfig,
    ) -> Self {
        Self {
            rpc,
            signer,
            addresses,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            log_fetch_limit: config.log_fetch_limit,
            state: Mutex::new(CoreState {
                tree: MerkleLedger::new(config.tree_height),
                entries: Vec::new(),
                by_output: HashMap::new(),
                by_commitment: HashMap::new(),
                by_index: BTreeMap::new(),
                cached_state: None,
                last_pass: None,
            }),
            pass_epoch: AtomicU64::new(0),
        }
    }

    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addresses
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    pub fn relayer_address(&self) -> Address {
        self.signer.address()
    }

    /// index all insertion events and rebuild the tree if anything new
    /// appeared
    ///
    /// concurrent callers coalesce onto a single pass: whoever holds
    /// the state lock runs it, everyone parked behind them receives
    /// that pass's outcome once the lock is released.
    pub async fn index_commitments(&self) -> Result<IndexOutcome> {
        let entry_epoch = self.pass_epoch.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if self.pass_epoch.load(Ordering::Acquire) != entry_epoch {
            if let Some(last) = &state.last_pass {
                debug!("adopting coalesced indexing pass");
                return last.clone().map_err(RelayerError::Rpc);
            }
        }

        let result = self.run_index_pass(&mut state).await;
        state.last_pass = Some(match &result {
            Ok(outcome) => Ok(outcome.clone()),
            Err(e) => Err(e.to_string()),
        });
        self.pass_epoch.fetch_add(1, Ordering::Release);
        result
    }

    async fn run_index_pass(&self, state: &mut CoreState) -> Result<IndexOutcome> {
        let txs = self
            .rpc
            .logs_for_account(&self.addresses.ledger(), self.log_fetch_limit)
            .await?;

        // remote returns most recent first; replay oldest first
        let mut new_commitments = 0;
        for tx in txs.iter().rev() {
            for record in &tx.records {
                let Some(event) = LeafEvent::parse(record) else {
                    continue;
                };
                if state.by_output.contains_key(&event.encrypted_output) {
                    continue;
                }
                let pos = state.entries.len();
                state.by_output.insert(event.encrypted_output.clone(), pos);
                state.by_commitment.insert(event.commitment, pos);
                state.by_index.insert(event.index, pos);
                state.entries.push(IndexedCommitment {
                    index: event.index,
                    commitment: event.commitment,
                    encrypted_output: event.encrypted_output,
                    amount: event.amount,
                    mint: event.mint,
                    signature: tx.signature.clone(),
                });
                new_commitments += 1;
            }
        }

        if new_commitments > 0 || state.tree.is_empty() {
            state.tree.mark_stale();
            let leaves = Self::ordered_leaf_set(state);
            state.tree.rebuild(leaves);

            // root push-back is best effort; a racing client may have
            // already checkpointed a superseding root
            if let Err(e) = self.update_root_on_chain(state).await {
                warn!("root push-back failed: {}", e);
            }
        }

        let outcome = IndexOutcome {
            new_commitments,
            total_indexed: state.entries.len(),
            root: state.tree.root(),
        };
        info!(
            "indexing pass: {} new, {} total",
            outcome.new_commitments, outcome.total_indexed
        );
        Ok(outcome)
    }

    /// leaves ordered by remote index; unobserved positions get the
    /// all-zero sentinel so every leaf keeps its remote position
    fn ordered_leaf_set(state: &CoreState) -> Vec<[u8; 32]> {
        let Some((&max_index, _)) = state.by_index.iter().next_back() else {
            return Vec::new();
        };
        (0..=max_index)
            .map(|i| {
                state
                    .by_index
                    .get(&i)
                    .map(|&pos| state.entries[pos].commitment.to_bytes())
                    .unwrap_or([0u8; 32])
            })
            .collect()
    }

    async fn update_root_on_chain(&self, state: &mut CoreState) -> Result<()> {
        if state.tree.is_empty() {
            return Ok(());
        }
        let local = state.tree.root();
        // the cache may predate a checkpoint pushed by another client;
        // compare against the live root so a matching one is a no-op
        let remote = self.ledger_state_locked(state, true).await?;
        if remote.current_root == local {
            debug!("remote root already current");
            return Ok(());
        }

        let data = encode_update_root(&local);
        let signature = self.submit(data, vec![self.addresses.ledger()]).await?;
        info!("pushed root checkpoint: {}", signature);
        // the remote state just changed under the cache
        state.cached_state = None;
        Ok(())
    }

    /// authoritative ledger state, cached for the configured ttl
    pub async fn ledger_state(&self) -> Result<LedgerState> {
        let mut state = self.state.lock().await;
        self.ledger_state_locked(&mut state, false).await
    }

    async fn ledger_state_locked(
        &self,
        state: &mut CoreState,
        force_refresh: bool,
    ) -> Result<LedgerState> {
        if !force_refresh {
            if let Some((read_at, cached)) = &state.cached_state {
                if read_at.elapsed() < self.cache_ttl {
                    return Ok(cached.clone());
                }
            }
        }
        let data = self
            .rpc
            .read_account(&self.addresses.ledger())
            .await?
            .ok_or_else(|| RelayerError::Rpc("ledger account not found".into()))?;
        let parsed = LedgerState::parse(&data)?;
        state.cached_state = Some((Instant::now(), parsed.clone()));
        Ok(parsed)
    }

    pub async fn pool_config(&self) -> Result<PoolConfigState> {
        let data = self
            .rpc
            .read_account(&self.addresses.config())
            .await?
            .ok_or_else(|| RelayerError::Rpc("pool config account not found".into()))?;
        Ok(PoolConfigState::parse(&data)?)
    }

    /// inclusion proof for an indexed commitment
    ///
    /// an unknown commitment forces one re-index pass before failing:
    /// the insertion may simply not have been observed yet.
    pub async fn merkle_proof(&self, commitment: &Commitment) -> Result<MerkleProof> {
        {
            let state = self.state.lock().await;
            if let Some(proof) = Self::proof_locked(&state, commitment) {
                return Ok(proof);
            }
        }

        self.index_commitments().await?;

        let state = self.state.lock().await;
        Self::proof_locked(&state, commitment)
            .ok_or_else(|| RelayerError::CommitmentNotFound(commitment.to_hex()))
    }

    fn proof_locked(state: &CoreState, commitment: &Commitment) -> Option<MerkleProof> {
        let pos = *state.by_commitment.get(commitment)?;
        state.tree.proof(state.entries[pos].index)
    }

    pub async fn find_by_commitment(&self, commitment: &Commitment) -> Option<IndexedCommitment> {
        let state = self.state.lock().await;
        let pos = *state.by_commitment.get(commitment)?;
        Some(state.entries[pos].clone())
    }

    pub async fn find_by_output(&self, encrypted_output: &[u8]) -> Option<IndexedCommitment> {
        let state = self.state.lock().await;
        let pos = *state.by_output.get(encrypted_output)?;
        Some(state.entries[pos].clone())
    }

    /// indexed entries with `start <= index < end`, ordered by index
    pub async fn outputs_in_range(&self, start: u64, end: u64) -> Vec<IndexedCommitment> {
        let state = self.state.lock().await;
        state
            .by_index
            .range(start..end)
            .map(|(_, &pos)| state.entries[pos].clone())
            .collect()
    }

    /// wait for a commitment to show up through indexing, re-indexing
    /// between bounded attempts
    pub async fn wait_for_commitment(
        &self,
        commitment: &Commitment,
        attempts: usize,
    ) -> Result<IndexedCommitment> {
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            if let Err(e) = self.index_commitments().await {
                warn!("indexing attempt {} failed: {}", attempt + 1, e);
            }
            if let Some(entry) = self.find_by_commitment(commitment).await {
                return Ok(entry);
            }
        }
        Err(RelayerError::CommitmentNotFound(commitment.to_hex()))
    }

    pub async fn local_root(&self) -> [u8; 32] {
        self.state.lock().await.tree.root()
    }

    pub async fn total_indexed(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// whether the per-leaf record account exists remotely
    pub async fn leaf_record_exists(&self, index: u64) -> Result<bool> {
        let account = self
            .rpc
            .read_account(&self.addresses.leaf_record(index))
            .await?;
        Ok(account.is_some())
    }

    /// sign and submit instruction data under the pool program
    pub async fn submit(&self, data: Vec<u8>, accounts: Vec<Address>) -> Result<String> {
        let instruction = Instruction {
            program: self.addresses.program(),
            accounts,
            data,
        };
        let message = bincode::serialize(&instruction)
            .map_err(|e| RelayerError::SubmissionFailed(e.to_string()))?;
        let signature = self.signer.sign(&message);
        self.rpc
            .submit_instruction(&instruction, &signature, &self.signer.address())
            .await
    }
}
