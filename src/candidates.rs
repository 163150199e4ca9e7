use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::ChainCandidate;

/// Decoded chain-list document: chain id (as text) to a loosely shaped record.
pub type ChainList = Map<String, Value>;

/// Marker the registry puts in a chain's `rpcs` list when the chain is retired.
pub const RETIRED_SENTINEL: &str = "rpcWorking:false";

/// Filtering knobs for `build_candidates`.
#[derive(Debug, Clone)]
pub struct CandidateOptions {
    /// Skip entries the registry already flags with `rpcWorking: true`.
    pub skip_known_working: bool,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            skip_known_working: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChainRecord {
    rpcs: Vec<String>,
    #[serde(rename = "rpcWorking", default)]
    rpc_working: Option<Value>,
}

/// Turn the raw chain list into scan candidates.
///
/// Each entry is handled on its own; a bad key or a record of the wrong shape
/// is logged and skipped without affecting its siblings.
pub fn build_candidates(raw: &ChainList, options: &CandidateOptions) -> Vec<ChainCandidate> {
    let mut out = Vec::new();

    for (key, value) in raw {
        match candidate_from_entry(key, value, options) {
            Ok(Some(candidate)) => out.push(candidate),
            Ok(None) => {}
            Err(e) => tracing::warn!(chain = %key, "skipping chain entry: {e:#}"),
        }
    }

    out
}

fn candidate_from_entry(
    key: &str,
    value: &Value,
    options: &CandidateOptions,
) -> Result<Option<ChainCandidate>> {
    let chain_id: u64 = key
        .trim()
        .parse()
        .with_context(|| format!("invalid chain id: {key:?}"))?;
    let record = ChainRecord::deserialize(value)
        .with_context(|| format!("chain {chain_id}: unexpected record shape"))?;

    if record.rpcs.is_empty() {
        return Ok(None);
    }
    if record.rpcs.iter().any(|u| u == RETIRED_SENTINEL) {
        tracing::debug!(chain_id, "chain marked retired");
        return Ok(None);
    }
    // Only an actual boolean counts; anything else is ignored.
    let known_working = matches!(record.rpc_working, Some(Value::Bool(true)));
    if known_working && options.skip_known_working {
        tracing::debug!(chain_id, "chain already marked working");
        return Ok(None);
    }

    Ok(Some(ChainCandidate {
        chain_id,
        urls: record.rpcs,
    }))
}
