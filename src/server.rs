use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    candidates::{self, CandidateOptions},
    chainlist::{self, ChainListSource},
    probe::HttpProber,
    scanner::{self, SharedProgress},
    types::ScanReport,
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>, // shared mutable state for progress/results
    client: reqwest::Client,
    concurrency: usize,
    timeout: Duration,
}

/// Last finished report, or the live counters of the scan in progress.
#[derive(Debug)]
struct ServerState {
    status: Status,
    results: Option<ScanReport>,
    progress: Option<SharedProgress>,
    cancel: Option<CancellationToken>,
}

impl ServerState {
    fn current_status(&self) -> Status {
        let Some(p) = &self.progress else {
            return self.status.clone();
        };
        Status {
            scanned: p.urls_probed.load(Ordering::Relaxed),
            live: p.live_count.load(Ordering::Relaxed),
            ..self.status.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Status {
    pub total: u64,
    pub scanned: u64,
    pub live: u64,
    pub state: String, // "idle" | "running" | "done"
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanRequest {
    #[serde(default)]
    pub chain_list: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub include_known_working: bool,
}

impl AppState {
    /// `concurrency` and `timeout` apply to scans whose request leaves them unset.
    pub fn new(client: reqwest::Client, concurrency: usize, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServerState {
                status: Status {
                    state: "idle".into(),
                    ..Default::default()
                },
                results: None,
                progress: None,
                cancel: None,
            })),
            client,
            concurrency,
            timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/results", get(get_results))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn spawn_server(bind: &str, state: AppState) -> Result<()> {
    let app = router(state);
    tracing::info!("serving scan API on http://{}", bind);
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.inner.read().await.current_status())
}

async fn get_results(State(app): State<AppState>) -> Response {
    match app.inner.read().await.results.clone() {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> Response {
    let source = req
        .chain_list
        .as_deref()
        .map(ChainListSource::parse)
        .unwrap_or_default();

    let raw = match chainlist::fetch_chain_list(&app.client, &source).await {
        Ok(raw) => raw,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("{e:#}")).into_response(),
    };

    let options = CandidateOptions {
        skip_known_working: !req.include_known_working,
    };
    let candidates = candidates::build_candidates(&raw, &options);
    let total: u64 = candidates.iter().map(|c| c.urls.len() as u64).sum();
    let concurrency = req.concurrency.unwrap_or(app.concurrency);
    let timeout = req.timeout_ms.map(Duration::from_millis).unwrap_or(app.timeout);
    let prober = Arc::new(HttpProber::with_client(app.client.clone(), timeout));

    let progress = SharedProgress::new();
    let cancel = CancellationToken::new();

    {
        let mut s = app.inner.write().await;
        // Supersede any scan still running
        if let Some(c) = s.cancel.take() {
            c.cancel();
        }
        s.status = Status { total, scanned: 0, live: 0, state: "running".into() };
        s.results = None;
        s.progress = Some(progress.clone());
        s.cancel = Some(cancel.clone());
    }

    let app2 = app.clone();
    let source_label = source.to_string();
    tokio::spawn(async move {
        let results =
            scanner::scan_with_shared(candidates, concurrency, prober, cancel.clone(), progress).await;

        let mut s = app2.inner.write().await;
        if cancel.is_cancelled() {
            // a newer scan owns the state now
            return;
        }
        s.status.scanned = results.urls_probed;
        s.status.live = results.entries.len() as u64;
        s.status.state = "done".into();
        s.results = Some(scanner::into_report(results, &source_label));
        s.progress = None;
        s.cancel = None;
    });

    (StatusCode::ACCEPTED, Json(Status { total, scanned: 0, live: 0, state: "running".into() })).into_response()
}
