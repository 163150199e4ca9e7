use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::candidates::ChainList;

/// DefiLlama's `extraRpcs.json`, pinned so results are reproducible.
pub const DEFAULT_CHAIN_LIST_URL: &str = "https://raw.githubusercontent.com/DefiLlama/chainlist/844277a44d6c8c9bff5d2e75e7de20ee010317f0/constants/extraRpcs.json";

/// Upper bound on the chain list download.
pub const CHAIN_LIST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where to read the chain list from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainListSource {
    Url(String),
    Path(PathBuf),
}

impl ChainListSource {
    /// `http://` and `https://` strings are URLs; anything else is a file path.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::Path(PathBuf::from(s))
        }
    }
}

impl Default for ChainListSource {
    fn default() -> Self {
        Self::Url(DEFAULT_CHAIN_LIST_URL.to_string())
    }
}

impl fmt::Display for ChainListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(u) => f.write_str(u),
            Self::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Decode a chain-list document. The top level must be a JSON object.
pub fn parse_chain_list(s: &str) -> Result<ChainList> {
    let value: Value = serde_json::from_str(s).context("chain list is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("chain list must be a JSON object, got {}", json_kind(&other)),
    }
}

/// Load a chain list from a local file.
pub fn load_chain_list_from_path(path: impl AsRef<Path>) -> Result<ChainList> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read chain list: {}", path.as_ref().display()))?;
    parse_chain_list(&content)
}

/// Fetch and decode the chain list. Any failure here is fatal for a run.
pub async fn fetch_chain_list(client: &Client, source: &ChainListSource) -> Result<ChainList> {
    fetch_chain_list_with_timeout(client, source, CHAIN_LIST_TIMEOUT).await
}

pub async fn fetch_chain_list_with_timeout(
    client: &Client,
    source: &ChainListSource,
    timeout: Duration,
) -> Result<ChainList> {
    match source {
        ChainListSource::Path(p) => load_chain_list_from_path(p),
        ChainListSource::Url(url) => {
            let body = client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .with_context(|| format!("failed to fetch chain list from {url}"))?
                .text()
                .await
                .with_context(|| format!("failed to read chain list body from {url}"))?;
            parse_chain_list(&body).with_context(|| format!("failed to decode chain list from {url}"))
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
