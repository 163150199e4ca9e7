use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Start an in-process JSON-RPC stub on an ephemeral port.
///
/// The first path segment selects the behaviour:
/// - `full`: answers every method
/// - `legacy`: answers `web3_clientVersion`, rejects everything else
/// - `error`: JSON-RPC error for every method
/// - `down`: HTTP 503
/// - `slow`: answers after one second
///
/// `GET /chains/stalled` serves an empty chain list after two seconds.
pub async fn spawn_rpc_stub() -> SocketAddr {
    let app = Router::new()
        .route("/{mode}", post(rpc))
        .route("/chains/stalled", get(stalled_chain_list));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn rpc(Path(mode): Path<String>, Json(req): Json<Value>) -> Response {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default().to_string();

    let ok = json!({"jsonrpc": "2.0", "id": id, "result": "StubNode/v1.0"});
    let err = json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "method not found"}});

    match mode.as_str() {
        "full" => Json(ok).into_response(),
        "legacy" if method == "web3_clientVersion" => Json(ok).into_response(),
        "legacy" | "error" => Json(err).into_response(),
        "down" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Json(ok).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn stalled_chain_list() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}
