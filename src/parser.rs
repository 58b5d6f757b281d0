//! Block classification: decide which transactions of a block carry colored
//! value and stage the resulting chain-state mutations.
//!
//! Coloring is transitive: an output is colored iff it descends from the
//! genesis tx through colored inputs. Within one block, transactions may
//! spend each other's outputs, so classification runs a fixed point that
//! defers any tx whose inputs point at another tx of the same block until
//! that producer has been classified.
use std::collections::HashSet;

use tracing::{debug, error, warn};

use crate::chain_state::{BlockDelta, ChainState, StagedBlock};
use crate::config::ChainConfig;
use crate::error::ChainError;
use crate::types::{Amount, BsqBlock, SpentInfo, Tx, TxId, TxOutput, TxOutputKey};

/// Classifies one block's transactions under the coloring rule.
///
/// The parser never touches committed state: all writes are staged in the
/// returned [`StagedBlock`] and applied by
/// [`ChainState::commit_block`](crate::ChainState::commit_block).
#[derive(Debug, Clone)]
pub struct BsqParser {
    config: ChainConfig,
}

impl BsqParser {
    /// Creates a parser for the given configuration.
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }

    /// The configuration this parser runs with.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Classifies `txs` (in block order) for the block at `height` and
    /// returns the colored block plus its staged mutations.
    ///
    /// # Errors
    /// Returns [`ChainError::InvariantViolation`] if the intra-block fixed
    /// point exceeds the configured round cap or the partition arithmetic
    /// breaks; the block is rejected and no state is mutated.
    pub fn parse(
        &self,
        chain: &ChainState,
        height: u32,
        hash: &str,
        previous_hash: &str,
        txs: Vec<Tx>,
    ) -> Result<StagedBlock, ChainError> {
        debug!(height, tx_count = txs.len(), "parse block");

        let mut delta = BlockDelta::default();
        let mut colored: Vec<Tx> = Vec::new();

        for tx in &txs {
            self.check_for_genesis_tx(height, tx, &mut delta, &mut colored);
        }
        self.resolve_connected_txs(chain, height, txs, &mut delta, &mut colored)?;

        Ok(StagedBlock {
            block: BsqBlock {
                height,
                hash: hash.to_owned(),
                previous_hash: previous_hash.to_owned(),
                txs: colored,
            },
            delta,
        })
    }

    /// Genesis txs are colored by definition: every output is verified at
    /// full face value and the input-driven rule never applies.
    fn check_for_genesis_tx(
        &self,
        height: u32,
        tx: &Tx,
        delta: &mut BlockDelta,
        colored: &mut Vec<Tx>,
    ) {
        if tx.id == self.config.genesis_tx_id && height == self.config.genesis_block_height {
            for output in &tx.outputs {
                delta.stage_verified_output(output.clone());
            }
            delta.genesis = Some(tx.clone());
            delta.txs.push(tx.clone());
            colored.push(tx.clone());
        }
    }

    /// Worklist fixed point over intra-block dependencies.
    ///
    /// Worst case all txs in a block chain onto each other and only one
    /// resolves per round, so the round cap equals the maximum number of txs
    /// a block can hold. Real blocks rarely need more than a couple dozen
    /// rounds.
    fn resolve_connected_txs(
        &self,
        chain: &ChainState,
        height: u32,
        txs: Vec<Tx>,
        delta: &mut BlockDelta,
        colored: &mut Vec<Tx>,
    ) -> Result<(), ChainError> {
        let mut worklist = txs;
        let mut round: u32 = 0;

        loop {
            let worklist_len = worklist.len();
            let intra_block_producers = intra_block_spending_tx_ids(&worklist);

            let mut ready: Vec<Tx> = Vec::new();
            let mut deferred: Vec<Tx> = Vec::new();
            for tx in worklist {
                let depends_on_same_block = tx
                    .inputs
                    .iter()
                    .any(|input| intra_block_producers.contains(input.spending_tx_id.as_str()));
                if depends_on_same_block {
                    deferred.push(tx);
                } else {
                    ready.push(tx);
                }
            }

            if ready.len() + deferred.len() != worklist_len {
                return self.invariant_violation(
                    height,
                    format!(
                        "partition mismatch: {} ready + {} deferred != {} txs",
                        ready.len(),
                        deferred.len(),
                        worklist_len
                    ),
                );
            }

            if round > self.config.warn_recursion_threshold {
                warn!(
                    height,
                    round,
                    ready = ready.len(),
                    deferred = deferred.len(),
                    "unusually deep intra-block dependency chain"
                );
            }

            for tx in ready {
                if self.is_colored_tx(chain, delta, height, &tx) {
                    colored.push(tx);
                }
            }

            if deferred.is_empty() {
                return Ok(());
            }
            if round >= self.config.max_intra_block_recursions {
                return self.invariant_violation(
                    height,
                    format!(
                        "exceeded max fixed-point rounds ({}) with {} txs unresolved",
                        self.config.max_intra_block_recursions,
                        deferred.len()
                    ),
                );
            }
            round += 1;
            worklist = deferred;
        }
    }

    /// The per-tx coloring rule.
    ///
    /// Spends every spendable colored input in declared order, then assigns
    /// the collected value to outputs by index until it runs out; any
    /// remainder is recorded as a burned fee.
    fn is_colored_tx(
        &self,
        chain: &ChainState,
        delta: &mut BlockDelta,
        height: u32,
        tx: &Tx,
    ) -> bool {
        let mut available: Amount = 0;
        for (input_index, input) in tx.inputs.iter().enumerate() {
            // An input with no spendable colored output contributes nothing:
            // it is either plain base-chain value or already spent.
            if let Some(output) = get_spendable(chain, delta, &input.spent_output_key()) {
                available += output.value;
                delta.stage_spent(
                    output,
                    SpentInfo {
                        block_height: height,
                        spending_tx_id: tx.id.clone(),
                        input_index: input_index as u32,
                    },
                );
            }
        }

        if available == 0 {
            return false;
        }

        delta.txs.push(tx.clone());

        // Output order decides who gets the colored value: an output is
        // colored as long as enough input value remains.
        for output in &tx.outputs {
            if available < output.value {
                break;
            }
            delta.stage_verified_output(output.clone());
            available -= output.value;
            if available == 0 {
                break;
            }
        }

        if available > 0 {
            debug!(tx_id = %tx.id, amount = available, "unassigned colored value burned");
            delta.burned.push((tx.id.clone(), available));
        }

        true
    }

    fn invariant_violation(&self, height: u32, detail: String) -> Result<(), ChainError> {
        error!(height, %detail, "parser invariant violated");
        if self.config.dev_mode {
            panic!("parser invariant violated at height {height}: {detail}");
        }
        Err(ChainError::InvariantViolation { height, detail })
    }
}

/// Ids of txs in `txs` whose outputs are referenced as inputs by another tx
/// of the same set.
fn intra_block_spending_tx_ids(txs: &[Tx]) -> HashSet<TxId> {
    let tx_ids: HashSet<&str> = txs.iter().map(|tx| tx.id.as_str()).collect();
    txs.iter()
        .flat_map(|tx| tx.inputs.iter())
        .filter(|input| tx_ids.contains(input.spending_tx_id.as_str()))
        .map(|input| input.spending_tx_id.clone())
        .collect()
}

/// Spendable lookup that overlays the staged delta on committed state:
/// outputs spent in this block are gone, outputs created in this block are
/// visible.
fn get_spendable(chain: &ChainState, delta: &BlockDelta, key: &TxOutputKey) -> Option<TxOutput> {
    if delta.is_spent(key) {
        return None;
    }
    if let Some(output) = delta.verified_outputs.get(key) {
        return Some(output.clone());
    }
    chain.get_spendable_tx_output(&key.tx_id, key.index)
}
