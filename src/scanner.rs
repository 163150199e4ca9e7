use crate::probe::Prober;
use crate::types::{ChainCandidate, RpcResult, ScanReport, ScanResultSet};
use ::time::{format_description::well_known, OffsetDateTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Chain-level concurrency ceiling used when none is given.
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// Probe every candidate URL and collect the live ones.
///
/// - At most `max_concurrency` chains are in flight, enforced with a `Semaphore`
///   (clamped to `1..=Semaphore::MAX_PERMITS`).
/// - Once a chain holds a permit, all of its URLs are probed at once.
/// - Liveness runs first; the fee-history check only runs for live URLs, and a
///   live URL is recorded whatever that check says.
/// - A failed or panicked URL task is logged and dropped; siblings keep going.
///
/// The returned entries are unordered; see [`finalize`].
pub async fn scan<P: Prober>(
    candidates: Vec<ChainCandidate>,
    max_concurrency: usize,
    prober: Arc<P>,
) -> ScanResultSet {
    scan_internal(candidates, max_concurrency, prober, None, None).await
}

#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub chains_done: Arc<AtomicU64>,
    pub urls_probed: Arc<AtomicU64>,
    pub live_count: Arc<AtomicU64>,
    pub entries: Arc<Mutex<Vec<RpcResult>>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            chains_done: Arc::new(AtomicU64::new(0)),
            urls_probed: Arc::new(AtomicU64::new(0)),
            live_count: Arc::new(AtomicU64::new(0)),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Variant that reports progress through `shared` and stops scheduling new
/// chains once `cancel` fires, including while waiting for a permit. Chains
/// already running are allowed to finish.
pub async fn scan_with_shared<P: Prober>(
    candidates: Vec<ChainCandidate>,
    max_concurrency: usize,
    prober: Arc<P>,
    cancel: CancellationToken,
    shared: SharedProgress,
) -> ScanResultSet {
    scan_internal(
        candidates,
        max_concurrency,
        prober,
        Some(cancel),
        Some(shared),
    )
    .await
}

async fn scan_internal<P: Prober>(
    candidates: Vec<ChainCandidate>,
    max_concurrency: usize,
    prober: Arc<P>,
    cancel_opt: Option<CancellationToken>,
    shared_opt: Option<SharedProgress>,
) -> ScanResultSet {
    let chains_total = candidates.len() as u64;
    let urls_total: u64 = candidates.iter().map(|c| c.urls.len() as u64).sum();
    let shared = shared_opt.unwrap_or_default();
    let cancel = cancel_opt.unwrap_or_default();

    let sem = Arc::new(Semaphore::new(max_concurrency.clamp(1, Semaphore::MAX_PERMITS)));
    let mut set = JoinSet::new();

    tracing::info!(chains_total, urls_total, max_concurrency, "starting scan");

    for candidate in candidates {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = sem.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            tracing::info!("scan cancelled, not scheduling remaining chains");
            break;
        };
        let prober = prober.clone();
        let shared = shared.clone();

        set.spawn(async move {
            let _permit = permit; // held until every URL of this chain is done
            scan_chain(candidate, prober, &shared).await;
            shared.chains_done.fetch_add(1, Ordering::Relaxed);
        });
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            tracing::warn!("chain task failed: {e}");
        }
    }

    let entries = std::mem::take(&mut *shared.entries.lock().await);
    tracing::info!(live = entries.len(), "scan finished");

    ScanResultSet {
        chains_total,
        chains_done: shared.chains_done.load(Ordering::Relaxed),
        urls_total,
        urls_probed: shared.urls_probed.load(Ordering::Relaxed),
        entries,
    }
}

async fn scan_chain<P: Prober>(candidate: ChainCandidate, prober: Arc<P>, shared: &SharedProgress) {
    let chain_id = candidate.chain_id;
    let mut set = JoinSet::new();

    for url in candidate.urls {
        set.spawn(probe_url(chain_id, url, prober.clone()));
    }

    while let Some(res) = set.join_next().await {
        shared.urls_probed.fetch_add(1, Ordering::Relaxed);
        match res {
            Ok(Some(result)) => {
                shared.live_count.fetch_add(1, Ordering::Relaxed);
                shared.entries.lock().await.push(result);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(chain_id, "endpoint task failed: {e}"),
        }
    }
}

async fn probe_url<P: Prober>(chain_id: u64, url: String, prober: Arc<P>) -> Option<RpcResult> {
    if !prober.check_liveness(&url).await {
        return None;
    }
    let supports_fee_history = prober.check_fee_history_support(&url).await;
    tracing::debug!(chain_id, %url, supports_fee_history, "endpoint alive");
    Some(RpcResult {
        chain_id,
        url,
        supports_fee_history,
    })
}

/// Order results by chain id. The sort is stable, so URLs of one chain keep
/// the order in which they were collected.
pub fn finalize(results: ScanResultSet) -> Vec<RpcResult> {
    let mut entries = results.entries;
    entries.sort_by_key(|r| r.chain_id);
    entries
}

/// Finalize `results` and wrap them with run metadata.
pub fn into_report(results: ScanResultSet, source: &str) -> ScanReport {
    let chains_scanned = results.chains_done;
    let urls_probed = results.urls_probed;
    let results = finalize(results);
    ScanReport {
        generated_at: now_rfc3339(),
        source: source.to_string(),
        chains_scanned,
        urls_probed,
        live_count: results.len() as u64,
        results,
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
