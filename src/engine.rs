//! Orchestrator for colored-chain ingestion:
//! 1) check the incoming block connects to the chain tip (orphan detection),
//! 2) fetch its transactions and classify them under the coloring rule,
//! 3) commit the colored block atomically and notify the listener.
use crate::{
    block_source::BlockSource,
    chain_state::{ChainState, SnapshotHandle},
    config::ChainConfig,
    error::ChainError,
    hooks::BlockListener,
    parser::BsqParser,
    types::{BsqBlock, RawBlock},
};
use anyhow::Context;
use tracing::{debug, warn};

/// Core engine. `S` = upstream block source, `L` = per-block listener.
///
/// Runs on a dedicated worker task: blocks are parsed strictly one at a time
/// in ascending height order, and the engine is the only writer of its
/// [`ChainState`]. Dropping an in-flight future abandons the current block
/// before commit, so cancellation never leaves partial state.
pub struct BsqEngine<S, L> {
    chain: ChainState,
    parser: BsqParser,
    source: S,
    listener: L,
}

impl<S, L> BsqEngine<S, L>
where
    S: BlockSource + 'static,
    L: BlockListener + 'static,
{
    /// Creates an engine with an empty chain state.
    pub fn new(source: S, listener: L, config: ChainConfig) -> Self {
        Self {
            chain: ChainState::new(),
            parser: BsqParser::new(config),
            source,
            listener,
        }
    }

    /// Read access to the chain state (single writer: this engine).
    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    /// The configuration the engine parses with.
    pub fn config(&self) -> &ChainConfig {
        self.parser.config()
    }

    /// Lock-free handle to the latest chain snapshot, for other threads.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.chain.snapshot_handle()
    }

    /// Catch-up sweep: fetch, classify, and commit every block in
    /// `[start_height, chain_head_height]`, notifying the listener after
    /// each commit.
    ///
    /// # Errors
    /// [`ChainError::OrphanDetected`] if a block does not connect (run a
    /// re-org and resume at a lower start height); [`ChainError::Source`]
    /// if the upstream node fails. Either way the failing block left no
    /// state behind.
    pub async fn parse_blocks(
        &mut self,
        start_height: u32,
        chain_head_height: u32,
    ) -> Result<(), ChainError> {
        for height in start_height..=chain_head_height {
            let raw = self
                .source
                .request_block(height)
                .await
                .with_context(|| format!("request_block({height})"))
                .map_err(ChainError::Source)?;
            let block = self.ingest_raw_block(raw).await?;
            self.listener
                .on_block_committed(block)
                .await
                .map_err(ChainError::Listener)?;
        }
        Ok(())
    }

    /// Ingests blocks that arrive already materialized (e.g. deserialized
    /// from an external feed): each record's txs are re-classified, the
    /// rebuilt colored block is committed, and the listener notified. The
    /// block source is not consulted.
    pub async fn parse_bsq_blocks(&mut self, blocks: Vec<BsqBlock>) -> Result<(), ChainError> {
        for input in blocks {
            debug!(height = input.height, "parse pre-materialized block");
            if !self.chain.is_block_connecting(&input.previous_hash) {
                warn!(
                    height = input.height,
                    "block does not connect to our chain, re-org needed"
                );
                return Err(ChainError::OrphanDetected {
                    height: input.height,
                });
            }
            let staged = self.parser.parse(
                &self.chain,
                input.height,
                &input.hash,
                &input.previous_hash,
                input.txs,
            )?;
            let block = self.chain.commit_block(staged)?;
            self.listener
                .on_block_committed(block)
                .await
                .map_err(ChainError::Listener)?;
        }
        Ok(())
    }

    /// One-shot path for a "new block arrived" notification: fetches the
    /// block's transactions, classifies, commits, and returns the colored
    /// block.
    pub async fn parse_block(&mut self, raw: RawBlock) -> Result<BsqBlock, ChainError> {
        self.ingest_raw_block(raw).await
    }

    /// Shared fetch-classify-commit step. The linkage check runs before any
    /// transaction is requested, so an orphan costs no tx round-trips.
    async fn ingest_raw_block(&mut self, raw: RawBlock) -> Result<BsqBlock, ChainError> {
        debug!(height = raw.height, tx_count = raw.tx_ids.len(), "parse block");

        if !self.chain.is_block_connecting(&raw.previous_hash) {
            warn!(
                height = raw.height,
                "block does not connect to our chain, re-org needed"
            );
            return Err(ChainError::OrphanDetected { height: raw.height });
        }

        let mut txs = Vec::with_capacity(raw.tx_ids.len());
        for tx_id in &raw.tx_ids {
            let tx = self
                .source
                .request_transaction(tx_id, raw.height)
                .await
                .with_context(|| format!("request_transaction({tx_id}, height={})", raw.height))
                .map_err(ChainError::Source)?;
            txs.push(tx);
        }

        let staged = self
            .parser
            .parse(&self.chain, raw.height, &raw.hash, &raw.previous_hash, txs)?;
        self.chain.commit_block(staged)
    }
}
