use crate::types::TxId;

/// Configuration used to drive the chain parser.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Height at which the genesis transaction is expected.
    pub genesis_block_height: u32,
    /// Id of the genesis transaction.
    pub genesis_tx_id: TxId,
    /// Hard cap on fixed-point rounds over intra-block dependencies.
    ///
    /// Min tx size is 189 bytes, so 1 MB holds at most about 5300 txs; a
    /// dependency chain can never be deeper than that.
    pub max_intra_block_recursions: u32,
    /// Rounds above this count emit a warning (default: 100).
    pub warn_recursion_threshold: u32,
    /// When set, invariant violations panic instead of rejecting the block.
    pub dev_mode: bool,
}

impl ChainConfig {
    /// Creates a configuration for the given genesis identity, with default
    /// recursion bounds and `dev_mode` off.
    pub fn new(genesis_block_height: u32, genesis_tx_id: impl Into<TxId>) -> Self {
        Self {
            genesis_block_height,
            genesis_tx_id: genesis_tx_id.into(),
            ..Self::default()
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_block_height: 0,
            genesis_tx_id: TxId::new(),
            max_intra_block_recursions: 5300,
            warn_recursion_threshold: 100,
            dev_mode: false,
        }
    }
}
