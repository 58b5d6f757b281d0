//! Abstractions for fetching blocks and transactions from the underlying
//! chain node (RPC or P2P).
use async_trait::async_trait;

use crate::types::{RawBlock, Tx};

/// Upstream provider of raw blocks and transactions.
///
/// The engine trusts the node for base-chain validity; this trait only moves
/// data. Both calls perform network I/O and are the engine's only suspension
/// points.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch the block at `height`: header linkage plus ordered tx ids.
    async fn request_block(&self, height: u32) -> anyhow::Result<RawBlock>;

    /// Fetch the full transaction `tx_id`, known to sit at `block_height`.
    async fn request_transaction(&self, tx_id: &str, block_height: u32) -> anyhow::Result<Tx>;
}
