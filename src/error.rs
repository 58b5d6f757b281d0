use thiserror::Error;

/// Errors surfaced by the engine and the chain state.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The upstream block source failed to deliver a block or transaction.
    /// No chain state was mutated.
    #[error("block source failed: {0}")]
    Source(anyhow::Error),

    /// The incoming block does not connect to the current chain tip. The
    /// caller is expected to run a re-org procedure and resume at a lower
    /// start height. No chain state was mutated.
    #[error("orphan block at height {height}: previous hash does not match the chain tip")]
    OrphanDetected {
        /// Height of the rejected block.
        height: u32,
    },

    /// A second, different genesis transaction was observed.
    #[error("conflicting genesis tx: already recorded {existing}, got {candidate}")]
    GenesisConflict {
        /// Id of the genesis tx already recorded.
        existing: String,
        /// Id of the conflicting candidate.
        candidate: String,
    },

    /// `add_block` was handed a block that no longer extends the tip at
    /// commit time. State is left untouched.
    #[error("block {hash} at height {height} does not extend the chain tip")]
    ChainLinkage {
        /// Height of the rejected block.
        height: u32,
        /// Hash of the rejected block.
        hash: String,
    },

    /// A parser invariant was violated (fixed-point cap exceeded, partition
    /// arithmetic mismatch). The block is rejected; state is left untouched.
    #[error("parser invariant violated at height {height}: {detail}")]
    InvariantViolation {
        /// Height of the rejected block.
        height: u32,
        /// Description of the violated invariant.
        detail: String,
    },

    /// The per-block listener returned an error. The block had already
    /// committed when the listener ran.
    #[error("block listener failed: {0}")]
    Listener(anyhow::Error),
}
