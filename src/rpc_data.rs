use super::*;

/// The slice of a `getblocktemplate` response the template engine consumes.
/// Anything coin-specific beyond this (payee lists, superblocks) reaches the
/// engine as pre-built coinbase outputs instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcData {
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: String,
    pub bits: String,
    #[serde(rename = "curtime")]
    pub current_time: u32,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub height: u64,
    #[serde(rename = "coinbasevalue", default)]
    pub coinbase_value: u64,
    #[serde(rename = "coinbaseaux", default)]
    pub coinbase_aux: BTreeMap<String, String>,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
    #[serde(default)]
    pub masternode_payments: bool,
    #[serde(default)]
    pub votes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl RpcTransaction {
    /// Segwit templates carry `txid`; legacy daemons only send `hash`.
    pub fn id(&self) -> Option<&str> {
        self.txid.as_deref().or(self.hash.as_deref())
    }
}

impl Default for RpcData {
    fn default() -> Self {
        Self {
            previous_block_hash: "00".repeat(32),
            bits: "1d00ffff".into(),
            current_time: 0,
            version: 0x2000_0000,
            target: None,
            height: 0,
            coinbase_value: 50 * COIN_VALUE,
            coinbase_aux: BTreeMap::new(),
            transactions: Vec::new(),
            masternode_payments: false,
            votes: Vec::new(),
        }
    }
}
