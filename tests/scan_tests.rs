mod common;

use std::sync::Arc;
use std::time::Duration;

use chain_rpc_scan::candidates::{build_candidates, CandidateOptions};
use chain_rpc_scan::chainlist::{
    fetch_chain_list, fetch_chain_list_with_timeout, parse_chain_list, ChainListSource,
};
use chain_rpc_scan::probe::HttpProber;
use chain_rpc_scan::scanner::{finalize, scan};
use chain_rpc_scan::types::RpcResult;
use serde_json::json;

async fn run(doc: &str) -> Vec<RpcResult> {
    let raw = parse_chain_list(doc).expect("valid chain list");
    let candidates = build_candidates(&raw, &CandidateOptions::default());
    let prober = Arc::new(HttpProber::new(Duration::from_secs(2)).unwrap());
    finalize(scan(candidates, 8, prober).await)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn end_to_end_report_shape() {
    let addr = common::spawn_rpc_stub().await;
    let doc = format!(
        r#"{{"10": {{"rpcs": ["http://{addr}/full"]}}, "1": {{"rpcs": ["http://{addr}/legacy"]}}}}"#
    );

    let out = run(&doc).await;
    assert_eq!(
        serde_json::to_value(&out).unwrap(),
        json!([
            {"chainId": 1, "rpc": format!("http://{addr}/legacy"), "hasEip1559Support": false},
            {"chainId": 10, "rpc": format!("http://{addr}/full"), "hasEip1559Support": true},
        ])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dead_and_filtered_entries_produce_nothing() {
    let addr = common::spawn_rpc_stub().await;
    let doc = format!(
        r#"{{
            "5": {{"rpcs": []}},
            "7": {{"rpcs": ["http://{addr}/full"], "rpcWorking": true}},
            "8": {{"rpcs": ["http://{addr}/full", "rpcWorking:false"]}},
            "oops": {{"rpcs": ["http://{addr}/full"]}},
            "137": {{"rpcs": ["http://{addr}/down", "http://{addr}/error", "not a url", "http://{addr}/full"]}}
        }}"#
    );

    let out = run(&doc).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].chain_id, 137);
    assert_eq!(out[0].url, format!("http://{addr}/full"));
    assert!(out[0].supports_fee_history);
}

#[tokio::test]
async fn empty_inputs_yield_empty_output() {
    assert!(run(r#"{"5": {"rpcs": []}}"#).await.is_empty());
    assert!(run(r#"{"7": {"rpcs": ["http://x"], "rpcWorking": true}}"#).await.is_empty());
    assert!(run("{}").await.is_empty());
}

#[tokio::test]
async fn chain_list_from_file() {
    let path = std::env::temp_dir().join(format!("chain-rpc-scan-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"1": {"rpcs": ["http://a"]}, "2": {"rpcs": []}}"#).unwrap();

    let source = ChainListSource::parse(path.to_str().unwrap());
    let raw = fetch_chain_list(&reqwest::Client::new(), &source).await.unwrap();
    std::fs::remove_file(&path).ok();

    let candidates = build_candidates(&raw, &CandidateOptions::default());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].urls, vec!["http://a".to_string()]);
}

#[tokio::test]
async fn unreachable_chain_list_is_fatal() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let source = ChainListSource::parse(&format!("http://127.0.0.1:{port}/extraRpcs.json"));
    let err = fetch_chain_list(&reqwest::Client::new(), &source).await.unwrap_err();
    assert!(err.to_string().contains("failed to fetch chain list"));
}

#[tokio::test]
async fn stalled_chain_list_download_times_out() {
    let addr = common::spawn_rpc_stub().await;
    let source = ChainListSource::parse(&format!("http://{addr}/chains/stalled"));
    let err = fetch_chain_list_with_timeout(
        &reqwest::Client::new(),
        &source,
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("failed to fetch chain list"));
}
