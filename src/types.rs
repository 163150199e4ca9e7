use serde::{Deserialize, Serialize};

/// A chain and the RPC URLs to probe for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCandidate {
    pub chain_id: u64,
    pub urls: Vec<String>,
}

/// One live RPC endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcResult {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "rpc")]
    pub url: String,
    #[serde(rename = "hasEip1559Support")]
    pub supports_fee_history: bool,
}

/// Unordered results of one scan plus progress counters.
#[derive(Debug, Clone, Default)]
pub struct ScanResultSet {
    pub chains_total: u64,
    pub chains_done: u64,
    pub urls_total: u64,
    pub urls_probed: u64,
    pub entries: Vec<RpcResult>,
}

/// Full report written by `--output` and served by `GET /api/results`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub generated_at: String,
    pub source: String,
    pub chains_scanned: u64,
    pub urls_probed: u64,
    pub live_count: u64,
    pub results: Vec<RpcResult>,
}
