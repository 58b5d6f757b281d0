//! Authoritative in-memory chain state: parsed blocks, colored transactions,
//! unspent colored outputs, spent-info records, and burned fees.
//!
//! There is exactly one writer (the parser worker). Other threads read
//! through [`ChainSnapshot`]s published after every committed block.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

use crate::error::ChainError;
use crate::types::{Amount, BsqBlock, SpentInfo, Tx, TxId, TxOutput, TxOutputKey};

/// Cheap immutable summary of the chain state, published after each commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSnapshot {
    /// Height and hash of the most recently committed block.
    pub tip: Option<(u32, String)>,
    /// Number of committed colored blocks.
    pub block_count: usize,
    /// Number of recorded colored transactions.
    pub tx_count: usize,
    /// Number of verified colored outputs not yet spent.
    pub unspent_output_count: usize,
    /// Total colored value issued by the genesis transaction.
    pub issued_amount: Amount,
    /// Total colored value burned as implicit fees.
    pub burned_amount: Amount,
}

/// Clonable, lock-free handle to the latest [`ChainSnapshot`].
///
/// Hand this to UI/query threads; `load` never blocks the writer.
#[derive(Clone)]
pub struct SnapshotHandle(Arc<ArcSwap<ChainSnapshot>>);

impl SnapshotHandle {
    /// Returns the most recently published snapshot.
    pub fn load(&self) -> Arc<ChainSnapshot> {
        self.0.load_full()
    }
}

/// Mutations staged by the parser for one block, applied all-or-nothing.
#[derive(Debug, Default)]
pub(crate) struct BlockDelta {
    pub(crate) genesis: Option<Tx>,
    pub(crate) txs: Vec<Tx>,
    pub(crate) verified_outputs: HashMap<TxOutputKey, TxOutput>,
    pub(crate) spent: Vec<(TxOutput, SpentInfo)>,
    pub(crate) spent_keys: HashSet<TxOutputKey>,
    pub(crate) burned: Vec<(TxId, Amount)>,
}

impl BlockDelta {
    pub(crate) fn stage_verified_output(&mut self, output: TxOutput) {
        self.verified_outputs.insert(output.key(), output);
    }

    pub(crate) fn stage_spent(&mut self, output: TxOutput, spent_info: SpentInfo) {
        self.spent_keys.insert(output.key());
        self.spent.push((output, spent_info));
    }

    pub(crate) fn is_spent(&self, key: &TxOutputKey) -> bool {
        self.spent_keys.contains(key)
    }
}

/// A parsed colored block together with its staged mutations, ready for
/// [`ChainState::commit_block`].
#[derive(Debug)]
pub struct StagedBlock {
    pub(crate) block: BsqBlock,
    pub(crate) delta: BlockDelta,
}

impl StagedBlock {
    /// The colored block this staging belongs to.
    pub fn block(&self) -> &BsqBlock {
        &self.block
    }
}

/// In-memory authoritative store of the colored chain.
///
/// All mutations flow through the methods below; the parser borrows the
/// state for reads and stages its writes in a [`StagedBlock`].
pub struct ChainState {
    blocks: Vec<BsqBlock>,
    tx_map: HashMap<TxId, Tx>,
    spendable_outputs: HashMap<TxOutputKey, TxOutput>,
    spent_info: HashMap<TxOutputKey, (TxOutput, SpentInfo)>,
    burned_fees: HashMap<TxId, Amount>,
    genesis_tx: Option<Tx>,
    published: Arc<ArcSwap<ChainSnapshot>>,
}

impl ChainState {
    /// Creates an empty chain state.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            tx_map: HashMap::new(),
            spendable_outputs: HashMap::new(),
            spent_info: HashMap::new(),
            burned_fees: HashMap::new(),
            genesis_tx: None,
            published: Arc::new(ArcSwap::from_pointee(ChainSnapshot::default())),
        }
    }

    /// True iff the store is empty (first block ever) or `previous_hash`
    /// equals the hash of the most recently appended block.
    pub fn is_block_connecting(&self, previous_hash: &str) -> bool {
        self.blocks.last().map_or(true, |tip| tip.hash == previous_hash)
    }

    /// Appends a fully parsed colored block and publishes a fresh snapshot.
    pub fn add_block(&mut self, block: BsqBlock) -> Result<(), ChainError> {
        if !self.is_block_connecting(&block.previous_hash) {
            return Err(ChainError::ChainLinkage {
                height: block.height,
                hash: block.hash,
            });
        }
        trace!(height = block.height, txs = block.txs.len(), "block committed");
        self.blocks.push(block);
        self.publish_snapshot();
        Ok(())
    }

    /// Records the genesis transaction. Idempotent for the same tx; a
    /// different candidate fails with [`ChainError::GenesisConflict`].
    pub fn set_genesis_tx(&mut self, tx: Tx) -> Result<(), ChainError> {
        match &self.genesis_tx {
            Some(existing) if existing.id != tx.id => Err(ChainError::GenesisConflict {
                existing: existing.id.clone(),
                candidate: tx.id,
            }),
            _ => {
                self.genesis_tx = Some(tx);
                Ok(())
            }
        }
    }

    /// Inserts a transaction into the colored-tx map. Idempotent.
    pub fn add_tx(&mut self, tx: Tx) {
        self.tx_map.insert(tx.id.clone(), tx);
    }

    /// Marks an output as verified colored and unspent. Idempotent; an
    /// output already recorded as spent is not resurrected.
    pub fn add_verified_tx_output(&mut self, output: TxOutput) {
        let key = output.key();
        if self.spent_info.contains_key(&key) {
            return;
        }
        self.spendable_outputs.insert(key, output);
    }

    /// Returns the output iff it is verified colored and no spend has been
    /// recorded against it.
    pub fn get_spendable_tx_output(&self, tx_id: &str, index: u32) -> Option<TxOutput> {
        self.spendable_outputs
            .get(&TxOutputKey::new(tx_id, index))
            .cloned()
    }

    /// Records consumption of a previously spendable output.
    pub fn add_spent_tx_with_spent_info(&mut self, output: &TxOutput, spent_info: SpentInfo) {
        let key = output.key();
        self.spendable_outputs.remove(&key);
        self.spent_info.insert(key, (output.clone(), spent_info));
    }

    /// Records the colored-value burn for a transaction. `amount` must be
    /// positive.
    pub fn add_burned_fee(&mut self, tx_id: impl Into<TxId>, amount: Amount) {
        debug_assert!(amount > 0, "burned fee must be positive");
        self.burned_fees.insert(tx_id.into(), amount);
    }

    /// Applies a staged block atomically: linkage and genesis conflicts are
    /// checked first, then every staged mutation and the block record are
    /// applied together.
    pub fn commit_block(&mut self, staged: StagedBlock) -> Result<BsqBlock, ChainError> {
        let StagedBlock { block, delta } = staged;

        if !self.is_block_connecting(&block.previous_hash) {
            return Err(ChainError::ChainLinkage {
                height: block.height,
                hash: block.hash,
            });
        }
        if let (Some(staged_genesis), Some(existing)) = (&delta.genesis, &self.genesis_tx) {
            if staged_genesis.id != existing.id {
                return Err(ChainError::GenesisConflict {
                    existing: existing.id.clone(),
                    candidate: staged_genesis.id.clone(),
                });
            }
        }

        if let Some(genesis) = delta.genesis {
            self.set_genesis_tx(genesis)?;
        }
        for tx in delta.txs {
            self.add_tx(tx);
        }
        for output in delta.verified_outputs.into_values() {
            self.add_verified_tx_output(output);
        }
        for (output, spent_info) in delta.spent {
            self.add_spent_tx_with_spent_info(&output, spent_info);
        }
        for (tx_id, amount) in delta.burned {
            self.add_burned_fee(tx_id, amount);
        }
        self.add_block(block.clone())?;
        Ok(block)
    }

    /// Height of the most recently committed block.
    pub fn chain_head_height(&self) -> Option<u32> {
        self.blocks.last().map(|b| b.height)
    }

    /// Hash of the most recently committed block.
    pub fn chain_tip_hash(&self) -> Option<&str> {
        self.blocks.last().map(|b| b.hash.as_str())
    }

    /// Committed colored blocks in append order.
    pub fn blocks(&self) -> &[BsqBlock] {
        &self.blocks
    }

    /// Looks up a colored transaction by id.
    pub fn get_tx(&self, tx_id: &str) -> Option<&Tx> {
        self.tx_map.get(tx_id)
    }

    /// Number of recorded colored transactions.
    pub fn tx_count(&self) -> usize {
        self.tx_map.len()
    }

    /// Number of verified colored outputs not yet spent.
    pub fn unspent_output_count(&self) -> usize {
        self.spendable_outputs.len()
    }

    /// The recorded genesis transaction, if any.
    pub fn genesis_tx(&self) -> Option<&Tx> {
        self.genesis_tx.as_ref()
    }

    /// Spent-info record for an output, if it has been consumed.
    pub fn get_spent_info(&self, key: &TxOutputKey) -> Option<&SpentInfo> {
        self.spent_info.get(key).map(|(_, info)| info)
    }

    /// Burned fee recorded for a transaction, zero if none.
    pub fn get_burned_fee(&self, tx_id: &str) -> Amount {
        self.burned_fees.get(tx_id).copied().unwrap_or(0)
    }

    /// Sum of all recorded burned fees.
    pub fn total_burned_amount(&self) -> Amount {
        self.burned_fees.values().sum()
    }

    /// Total colored value issued by the genesis transaction.
    pub fn issued_amount(&self) -> Amount {
        self.genesis_tx
            .as_ref()
            .map(|tx| tx.outputs.iter().map(|o| o.value).sum())
            .unwrap_or(0)
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<ChainSnapshot> {
        self.published.load_full()
    }

    /// A clonable handle other threads can poll without touching the writer.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        SnapshotHandle(Arc::clone(&self.published))
    }

    fn publish_snapshot(&self) {
        let snapshot = ChainSnapshot {
            tip: self
                .blocks
                .last()
                .map(|b| (b.height, b.hash.clone())),
            block_count: self.blocks.len(),
            tx_count: self.tx_map.len(),
            unspent_output_count: self.spendable_outputs.len(),
            issued_amount: self.issued_amount(),
            burned_amount: self.total_burned_amount(),
        };
        self.published.store(Arc::new(snapshot));
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}
