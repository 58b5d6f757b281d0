use std::fmt;

/// Hex-string transaction id, as delivered by the upstream node.
pub type TxId = String;

/// Colored value in the smallest indivisible unit of the asset.
pub type Amount = u64;

/// Identity of a transaction output: `(tx_id, output_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxOutputKey {
    /// Id of the transaction that produced the output.
    pub tx_id: TxId,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl TxOutputKey {
    /// Builds a key from an id and an output index.
    pub fn new(tx_id: impl Into<TxId>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for TxOutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// A transaction output as seen by the parser.
///
/// Whether the output is colored is not a field: verified-colored-and-unspent
/// is an explicit set owned by [`ChainState`](crate::ChainState).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Id of the producing transaction.
    pub tx_id: TxId,
    /// Output index within the transaction.
    pub index: u32,
    /// Face value of the output.
    pub value: Amount,
    /// Destination address, when the upstream node could decode one.
    pub address: Option<String>,
}

impl TxOutput {
    /// Identity key of this output.
    pub fn key(&self) -> TxOutputKey {
        TxOutputKey::new(self.tx_id.clone(), self.index)
    }
}

/// A transaction input: an immutable reference into a prior output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Id of the transaction whose output is being spent.
    pub spending_tx_id: TxId,
    /// Index of the spent output within that transaction.
    pub spending_output_index: u32,
}

impl TxInput {
    /// Key of the output this input consumes.
    pub fn spent_output_key(&self) -> TxOutputKey {
        TxOutputKey::new(self.spending_tx_id.clone(), self.spending_output_index)
    }
}

/// A full transaction with ordered inputs and outputs.
///
/// Output order is semantically significant: colored value is assigned to
/// outputs in declared index order until the consumed value runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    /// Transaction id.
    pub id: TxId,
    /// Height of the block that contains the transaction.
    pub block_height: u32,
    /// Inputs in declared order.
    pub inputs: Vec<TxInput>,
    /// Outputs in declared index order.
    pub outputs: Vec<TxOutput>,
}

/// Records the consumer of a previously colored output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentInfo {
    /// Height of the block containing the spending transaction.
    pub block_height: u32,
    /// Id of the spending transaction.
    pub spending_tx_id: TxId,
    /// Index of the consuming input within the spending transaction.
    pub input_index: u32,
}

/// A block as delivered by the upstream node: header linkage plus the ids of
/// its transactions in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// Block height.
    pub height: u32,
    /// Block hash.
    pub hash: String,
    /// Hash of the parent block.
    pub previous_hash: String,
    /// Transaction ids in block order.
    pub tx_ids: Vec<TxId>,
}

/// The colored view of a block: header linkage plus the colored transactions
/// in the order the classification discovered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsqBlock {
    /// Block height.
    pub height: u32,
    /// Block hash.
    pub hash: String,
    /// Hash of the parent block.
    pub previous_hash: String,
    /// Colored transactions, a subset of the block's transactions.
    pub txs: Vec<Tx>,
}
