//! Caller glue: receive a notification for every committed colored block.
use async_trait::async_trait;

use crate::types::BsqBlock;

#[async_trait]
/// Receives each colored block after it has been committed to chain state.
pub trait BlockListener: Send + Sync {
    /// Called on the parser worker once per committed block, in height
    /// order. Chain state already contains the block when this runs; hand
    /// off to another context yourself if you need to.
    async fn on_block_committed(&self, block: BsqBlock) -> anyhow::Result<()>;
}
