use async_trait::async_trait;
use bsq_chain::prelude::*;
use bsq_chain::types::{Amount, BsqBlock, RawBlock, Tx, TxInput, TxOutput};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const GENESIS_HEIGHT: u32 = 100;
const GENESIS_TX_ID: &str = "G";

/// ------- Scripted in-memory BlockSource -------
#[derive(Default)]
struct ScriptedSource {
    blocks: HashMap<u32, RawBlock>,
    txs: HashMap<String, Tx>,
}

impl ScriptedSource {
    fn add_block(&mut self, height: u32, hash: &str, previous_hash: &str, txs: Vec<Tx>) {
        self.blocks.insert(
            height,
            RawBlock {
                height,
                hash: hash.to_owned(),
                previous_hash: previous_hash.to_owned(),
                tx_ids: txs.iter().map(|t| t.id.clone()).collect(),
            },
        );
        for tx in txs {
            self.txs.insert(tx.id.clone(), tx);
        }
    }
}

#[async_trait]
impl BlockSource for ScriptedSource {
    async fn request_block(&self, height: u32) -> anyhow::Result<RawBlock> {
        self.blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no block at height {height}"))
    }
    async fn request_transaction(&self, tx_id: &str, _block_height: u32) -> anyhow::Result<Tx> {
        self.txs
            .get(tx_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown tx {tx_id}"))
    }
}

/// ------- Listener that records every committed block -------
struct RecordingListener {
    committed: Arc<Mutex<Vec<BsqBlock>>>,
}

#[async_trait]
impl BlockListener for RecordingListener {
    async fn on_block_committed(&self, block: BsqBlock) -> anyhow::Result<()> {
        self.committed.lock().unwrap().push(block);
        Ok(())
    }
}

/// Listener that always fails, to exercise error propagation.
struct FailingListener;

#[async_trait]
impl BlockListener for FailingListener {
    async fn on_block_committed(&self, _block: BsqBlock) -> anyhow::Result<()> {
        anyhow::bail!("listener down")
    }
}

fn output(tx_id: &str, index: u32, value: Amount) -> TxOutput {
    TxOutput {
        tx_id: tx_id.to_owned(),
        index,
        value,
        address: None,
    }
}

fn input(tx_id: &str, index: u32) -> TxInput {
    TxInput {
        spending_tx_id: tx_id.to_owned(),
        spending_output_index: index,
    }
}

fn tx(id: &str, height: u32, inputs: Vec<TxInput>, outputs: Vec<(u32, Amount)>) -> Tx {
    Tx {
        id: id.to_owned(),
        block_height: height,
        inputs,
        outputs: outputs
            .into_iter()
            .map(|(index, value)| output(id, index, value))
            .collect(),
    }
}

/// Five blocks: genesis, a clean spend, a burn, an output cutoff, and an
/// intra-block dependency chain (consumer listed before producer).
fn scripted_chain() -> ScriptedSource {
    let mut source = ScriptedSource::default();
    source.add_block(
        100,
        "h100",
        "h99",
        vec![tx(GENESIS_TX_ID, 100, vec![input("coinbase", 0)], vec![(0, 1000), (1, 500)])],
    );
    source.add_block(
        101,
        "h101",
        "h100",
        vec![
            tx("T1", 101, vec![input("G", 0)], vec![(0, 700), (1, 300)]),
            // plain base-chain tx, must not show up in the colored view
            tx("N", 101, vec![input("btc-only", 7)], vec![(0, 999)]),
        ],
    );
    source.add_block(
        102,
        "h102",
        "h101",
        vec![tx("T2", 102, vec![input("G", 1)], vec![(0, 400)])],
    );
    source.add_block(
        103,
        "h103",
        "h102",
        vec![tx("T3", 103, vec![input("T1", 0)], vec![(0, 300), (1, 500), (2, 100)])],
    );
    source.add_block(
        104,
        "h104",
        "h103",
        vec![
            tx("A", 104, vec![input("B", 0)], vec![(0, 250)]),
            tx("B", 104, vec![input("T1", 1)], vec![(0, 250)]),
        ],
    );
    source
}

fn engine_with(
    source: ScriptedSource,
) -> (BsqEngine<ScriptedSource, RecordingListener>, Arc<Mutex<Vec<BsqBlock>>>) {
    let committed = Arc::new(Mutex::new(Vec::new()));
    let listener = RecordingListener {
        committed: committed.clone(),
    };
    let config = ChainConfig::new(GENESIS_HEIGHT, GENESIS_TX_ID);
    (BsqEngine::new(source, listener, config), committed)
}

#[tokio::test]
async fn catch_up_sweep_commits_in_height_order() -> Result<(), ChainError> {
    let (mut engine, committed) = engine_with(scripted_chain());

    engine.parse_blocks(100, 104).await?;

    let got = committed.lock().unwrap();
    assert_eq!(got.len(), 5);

    // strict parent linkage across every consecutive pair
    for pair in got.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].hash);
        assert_eq!(pair[1].height, pair[0].height + 1);
    }

    // colored-tx lists: the plain tx "N" is filtered out, the intra-block
    // pair resolves producer-first
    let ids: Vec<Vec<&str>> = got
        .iter()
        .map(|b| b.txs.iter().map(|t| t.id.as_str()).collect())
        .collect();
    assert_eq!(ids, vec![vec!["G"], vec!["T1"], vec!["T2"], vec!["T3"], vec!["B", "A"]]);

    let chain = engine.chain();
    assert_eq!(chain.chain_head_height(), Some(104));
    assert_eq!(chain.chain_tip_hash(), Some("h104"));
    assert!(chain.get_tx("N").is_none());

    // burns: T2 left 100 unassigned, T3 left 400, B left 50
    assert_eq!(chain.get_burned_fee("T2"), 100);
    assert_eq!(chain.get_burned_fee("T3"), 400);
    assert_eq!(chain.get_burned_fee("B"), 50);
    assert_eq!(chain.total_burned_amount(), 550);

    // the unspent colored set is exactly the outputs still in circulation
    assert_eq!(chain.get_spendable_tx_output("T2", 0).unwrap().value, 400);
    assert_eq!(chain.get_spendable_tx_output("T3", 0).unwrap().value, 300);
    assert_eq!(chain.get_spendable_tx_output("A", 0).unwrap().value, 250);
    assert!(chain.get_spendable_tx_output("G", 0).is_none());
    assert!(chain.get_spendable_tx_output("T1", 0).is_none());
    assert!(chain.get_spendable_tx_output("T3", 1).is_none());
    assert_eq!(chain.unspent_output_count(), 3);

    // issuance minus burns equals circulating value
    let circulating: Amount = 400 + 300 + 250;
    assert_eq!(chain.issued_amount() - chain.total_burned_amount(), circulating);

    Ok(())
}

#[tokio::test]
async fn snapshot_is_published_after_each_commit() -> Result<(), ChainError> {
    let (mut engine, _committed) = engine_with(scripted_chain());
    let handle = engine.snapshot_handle();
    assert_eq!(handle.load().tip, None);

    engine.parse_blocks(100, 102).await?;

    let snap = handle.load();
    assert_eq!(snap.tip, Some((102, "h102".to_owned())));
    assert_eq!(snap.block_count, 3);
    assert_eq!(snap.issued_amount, 1500);
    assert_eq!(snap.burned_amount, 100);
    Ok(())
}

#[tokio::test]
async fn orphan_block_is_rejected_without_mutation() -> Result<(), ChainError> {
    let (mut engine, committed) = engine_with(scripted_chain());
    engine.parse_blocks(100, 100).await?;

    let orphan = RawBlock {
        height: 101,
        hash: "h101-fork".to_owned(),
        previous_hash: "HX".to_owned(),
        tx_ids: vec![],
    };
    let err = engine.parse_block(orphan).await.unwrap_err();
    assert!(matches!(err, ChainError::OrphanDetected { height: 101 }));

    // no mutation: tip unchanged, linkage against the real tip still holds
    assert!(engine.chain().is_block_connecting("h100"));
    assert_eq!(engine.chain().chain_head_height(), Some(100));
    assert_eq!(committed.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn live_path_returns_the_colored_block() -> Result<(), ChainError> {
    let source = scripted_chain();
    let raw_101 = source.blocks.get(&101).cloned().unwrap();
    let (mut engine, _committed) = engine_with(source);
    engine.parse_blocks(100, 100).await?;

    let block = engine.parse_block(raw_101).await?;
    assert_eq!(block.height, 101);
    assert_eq!(block.txs.len(), 1);
    assert_eq!(block.txs[0].id, "T1");
    assert_eq!(engine.chain().chain_head_height(), Some(101));
    Ok(())
}

#[tokio::test]
async fn pre_materialized_blocks_are_reclassified() -> Result<(), ChainError> {
    let (mut engine, committed) = engine_with(ScriptedSource::default());

    // raw-block-equivalent records: the non-colored tx is present and must
    // be filtered out by re-classification
    let blocks = vec![
        BsqBlock {
            height: 100,
            hash: "h100".to_owned(),
            previous_hash: "h99".to_owned(),
            txs: vec![tx(GENESIS_TX_ID, 100, vec![input("coinbase", 0)], vec![(0, 1000), (1, 500)])],
        },
        BsqBlock {
            height: 101,
            hash: "h101".to_owned(),
            previous_hash: "h100".to_owned(),
            txs: vec![
                tx("N", 101, vec![input("btc-only", 7)], vec![(0, 999)]),
                tx("T1", 101, vec![input("G", 0)], vec![(0, 700), (1, 300)]),
            ],
        },
    ];

    engine.parse_bsq_blocks(blocks).await?;

    let got = committed.lock().unwrap();
    assert_eq!(got.len(), 2);
    let ids: Vec<&str> = got[1].txs.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["T1"]);
    assert!(engine.chain().get_tx("N").is_none());
    assert_eq!(engine.chain().get_spendable_tx_output("T1", 1).unwrap().value, 300);
    Ok(())
}

#[tokio::test]
async fn pre_materialized_orphan_stops_ingestion() {
    let (mut engine, committed) = engine_with(ScriptedSource::default());

    let blocks = vec![
        BsqBlock {
            height: 100,
            hash: "h100".to_owned(),
            previous_hash: "h99".to_owned(),
            txs: vec![tx(GENESIS_TX_ID, 100, vec![input("coinbase", 0)], vec![(0, 1000)])],
        },
        BsqBlock {
            height: 101,
            hash: "h101".to_owned(),
            previous_hash: "NOT-h100".to_owned(),
            txs: vec![],
        },
    ];

    let err = engine.parse_bsq_blocks(blocks).await.unwrap_err();
    assert!(matches!(err, ChainError::OrphanDetected { height: 101 }));
    // the connecting prefix before the orphan still committed
    assert_eq!(committed.lock().unwrap().len(), 1);
    assert_eq!(engine.chain().chain_head_height(), Some(100));
}

#[tokio::test]
async fn source_failure_surfaces_without_mutation() -> Result<(), ChainError> {
    let (mut engine, committed) = engine_with(scripted_chain());
    engine.parse_blocks(100, 100).await?;

    // height 200 is not scripted
    let err = engine.parse_blocks(200, 200).await.unwrap_err();
    assert!(matches!(err, ChainError::Source(_)));
    assert_eq!(engine.chain().chain_head_height(), Some(100));
    assert_eq!(committed.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn unresolvable_dependency_cycle_rejects_only_that_block() -> Result<(), ChainError> {
    let mut source = scripted_chain();
    source.add_block(
        105,
        "h105",
        "h104",
        vec![
            tx("C1", 105, vec![input("C2", 0)], vec![(0, 10)]),
            tx("C2", 105, vec![input("C1", 0)], vec![(0, 10)]),
        ],
    );

    let committed = Arc::new(Mutex::new(Vec::new()));
    let listener = RecordingListener {
        committed: committed.clone(),
    };
    let mut config = ChainConfig::new(GENESIS_HEIGHT, GENESIS_TX_ID);
    config.max_intra_block_recursions = 16;
    let mut engine = BsqEngine::new(source, listener, config);

    let err = engine.parse_blocks(100, 105).await.unwrap_err();
    assert!(matches!(err, ChainError::InvariantViolation { height: 105, .. }));

    // everything up to the bad block committed; the bad block left nothing
    assert_eq!(engine.chain().chain_head_height(), Some(104));
    assert_eq!(committed.lock().unwrap().len(), 5);
    assert!(engine.chain().get_tx("C1").is_none());
    assert!(engine.chain().get_tx("C2").is_none());
    Ok(())
}

#[tokio::test]
async fn listener_failure_is_reported_after_commit() -> Result<(), ChainError> {
    let config = ChainConfig::new(GENESIS_HEIGHT, GENESIS_TX_ID);
    let mut engine = BsqEngine::new(scripted_chain(), FailingListener, config);

    let err = engine.parse_blocks(100, 100).await.unwrap_err();
    assert!(matches!(err, ChainError::Listener(_)));
    // the block itself had already committed when the listener ran
    assert_eq!(engine.chain().chain_head_height(), Some(100));
    Ok(())
}
