#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! bsq-chain: a colored-coin (BSQ) chain parser engine for UTXO chains.
//!
//! ## What you implement
//! - [`BlockSource`]: fetch raw blocks and transactions from your node.
//! - [`BlockListener`]: handle **on_block_committed** callbacks.
//!
//! ## What the engine does
//! - Checks every incoming block connects to the chain tip (orphan
//!   detection for re-orgs).
//! - Classifies each block's transactions under the coloring rule, seeded
//!   from a configured genesis tx, resolving intra-block dependencies with
//!   a bounded fixed point.
//! - Commits colored blocks atomically into an in-memory [`ChainState`] and
//!   publishes lock-free snapshots for other threads.
//!
//! ## Minimal usage
//! ```rust,no_run
//! use bsq_chain::prelude::*;
//! # struct MySource;
//! # struct MyListener;
//! # #[async_trait::async_trait] impl BlockSource for MySource {
//! #     async fn request_block(&self, _h: u32) -> anyhow::Result<bsq_chain::types::RawBlock> { unimplemented!() }
//! #     async fn request_transaction(&self, _id: &str, _h: u32) -> anyhow::Result<bsq_chain::types::Tx> { unimplemented!() }
//! # }
//! # #[async_trait::async_trait] impl BlockListener for MyListener {
//! #     async fn on_block_committed(&self, _b: bsq_chain::types::BsqBlock) -> anyhow::Result<()> { Ok(()) }
//! # }
//! # async fn demo() -> Result<(), bsq_chain::ChainError> {
//! let config = ChainConfig::new(571_747, "81855ad8681d0d86d1e91e00167939cb6694d2c422acd208a0072939487f6999");
//! let mut engine = BsqEngine::new(MySource, MyListener, config);
//! engine.parse_blocks(571_747, 580_000).await?;
//! # Ok(()) }
//! ```

/// Engine that checks linkage, classifies blocks, commits, and notifies.
pub mod engine;

/// Traits and types for fetching blocks and transactions from the node.
pub mod block_source;

/// Caller callbacks: receive every committed colored block.
pub mod hooks;

/// Authoritative in-memory chain state and its snapshots.
pub mod chain_state;

/// Block classification: the coloring rule and intra-block fixed point.
pub mod parser;

/// Parser configuration (genesis identity, fixed-point bounds).
pub mod config;

/// Error kinds surfaced by the engine and chain state.
pub mod error;

/// Domain records: transactions, outputs, spent info, blocks.
pub mod types;

pub use block_source::BlockSource;
pub use chain_state::{ChainSnapshot, ChainState, SnapshotHandle};
pub use config::ChainConfig;
pub use engine::BsqEngine;
pub use error::ChainError;
pub use hooks::BlockListener;
pub use parser::BsqParser;

/// Common re-exports for end users (engine + traits + config)
pub mod prelude {
    pub use crate::{BlockListener, BlockSource, BsqEngine, ChainConfig, ChainError, ChainState};
}
