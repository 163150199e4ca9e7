use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

/// Per-request timeout applied to every probe unless overridden.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Substring a response body must contain to count as a successful call.
///
/// This is a loose check: it does not parse the JSON-RPC envelope, so a body
/// such as `{"result":null,"error":{..}}` still passes while a bare error
/// object fails.
pub const SUCCESS_MARKER: &str = "result";

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("endpoint returned HTTP {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// `web3_clientVersion` with no params; any live node answers it.
pub fn client_version_request() -> Value {
    json!({"jsonrpc": "2.0", "method": "web3_clientVersion", "params": [], "id": 67})
}

/// `eth_feeHistory` over the last 4 blocks with the 25th/75th reward percentiles.
pub fn fee_history_request() -> Value {
    json!({"jsonrpc": "2.0", "method": "eth_feeHistory", "params": [4, "latest", [25, 75]], "id": 1})
}

pub fn is_success_body(body: &str) -> bool {
    body.contains(SUCCESS_MARKER)
}

/// The two checks the scanner runs against every candidate URL.
///
/// Implementations must never fail: every error is reported as `false`.
pub trait Prober: Send + Sync + 'static {
    fn check_liveness(&self, url: &str) -> impl Future<Output = bool> + Send;

    fn check_fee_history_support(&self, url: &str) -> impl Future<Output = bool> + Send;
}

/// `Prober` backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Reuse an existing client (and its connection pool).
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// POST `payload` to `url` once and return the body of a 2xx response.
    pub async fn try_probe(&self, url: &str, payload: &Value) -> Result<String, ProbeError> {
        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status));
        }

        resp.text().await.map_err(|e| self.classify(e))
    }

    /// Single-attempt probe. `true` only for a 2xx response containing the success marker.
    pub async fn probe(&self, url: &str, payload: &Value) -> bool {
        match self.try_probe(url, payload).await {
            Ok(body) => is_success_body(&body),
            Err(e) => {
                tracing::debug!(%url, error = %e, "probe failed");
                false
            }
        }
    }

    fn classify(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ProbeError::Request(err)
        }
    }
}

impl Prober for HttpProber {
    async fn check_liveness(&self, url: &str) -> bool {
        self.probe(url, &client_version_request()).await
    }

    async fn check_fee_history_support(&self, url: &str) -> bool {
        self.probe(url, &fee_history_request()).await
    }
}
