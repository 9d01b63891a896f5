//! Persistent store, model artifact on disk and HTTP router together.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use sizecast::api::{build_router, AppState};
use sizecast::engine::{Method, PredictRequest, PredictionService, PredictionSettings};
use sizecast::model::load_model;
use sizecast::predict::FeatureVector;
use sizecast::storage::{HistoryStore, JsonlHistoryStore};

fn temp_dir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("sizecast_it_{}", uuid::Uuid::new_v4()));
    p
}

fn write_model(dir: &PathBuf, big_bias: f64) -> String {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("ensemble.json");
    let width = FeatureVector::len_for(8);
    let size_weights = vec![vec![0.0; width]; 2];
    let color_weights = vec![vec![0.0; width]; 3];
    let artifact = json!({
        "size": { "weights": size_weights, "bias": [0.0, big_bias] },
        "color": { "weights": color_weights, "bias": [0.0, 0.0, 1.0] }
    });
    std::fs::write(&path, artifact.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

fn draws(numbers: &[i64]) -> Vec<Value> {
    numbers
        .iter()
        .enumerate()
        .map(|(i, n)| json!({"issueNumber": format!("2026{i:04}"), "number": n, "color": "green"}))
        .collect()
}

async fn post(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = temp_dir();
    let history = dir.join("history.jsonl");

    let first = PredictionService::new(
        Arc::new(JsonlHistoryStore::new(&history)),
        None,
        PredictionSettings::default(),
    );
    assert_eq!(first.ingest(&draws(&[1, 2, 3])).await.unwrap(), 3);
    drop(first);

    let store = Arc::new(JsonlHistoryStore::new(&history));
    assert_eq!(store.len().await.unwrap(), 3);
    let service = PredictionService::new(store, None, PredictionSettings::default());
    service.ingest(&draws(&[8, 9])).await.unwrap();

    let resp = service.predict(&PredictRequest::default()).await.unwrap();
    assert_eq!(resp.method, Method::Heuristic);
    let newest: Vec<_> = resp.recent.iter().filter_map(|o| o.number).collect();
    assert_eq!(newest, vec![9, 8, 3, 2, 1]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_model_from_disk_over_http() {
    let dir = temp_dir();
    let model = load_model(&write_model(&dir, 3.0));
    assert!(model.is_some());

    let state: AppState = Arc::new(PredictionService::new(
        Arc::new(JsonlHistoryStore::new(dir.join("history.jsonl"))),
        model,
        PredictionSettings::default(),
    ));

    let (status, json) = post(&state, "/api/ingest", json!({"list": draws(&[1, 2, 3, 4])})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ingested"], 4);

    let (status, json) = post(&state, "/api/predict", json!({"use_model": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["method"], "model");
    assert_eq!(json["ensemble"]["status"], "scored");
    assert_eq!(json["ensemble"]["size"]["label"], "Big");
    assert_eq!(json["ensemble"]["color"].as_array().unwrap().len(), 3);

    // Without the flag the heuristic answers: newest two (4, 3) are Small.
    let (_, json) = post(&state, "/api/predict", json!({})).await;
    assert_eq!(json["method"], "heuristic");
    assert_eq!(json["prediction"]["size"], "Big");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_backtest_over_http() {
    let dir = temp_dir();
    let state: AppState = Arc::new(PredictionService::new(
        Arc::new(JsonlHistoryStore::new(dir.join("history.jsonl"))),
        None,
        PredictionSettings::default(),
    ));

    let numbers: Vec<i64> = (0..30).map(|i| (i * 3) % 10).collect();
    post(&state, "/api/ingest", json!({"data": {"list": draws(&numbers)}})).await;

    let (status, json) = post(&state, "/api/backtest", json!({"window": 5})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 25);
    assert_eq!(json["predictor"], "heuristic");
    let hits = json["hits"].as_u64().unwrap();
    assert!(hits <= 25);
    assert_eq!(json["samples"].as_array().unwrap().len(), 10);

    let (status, json) = post(&state, "/api/backtest", json!({"window": 40})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["have"], 30);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_or_broken_model_runs_heuristic_only() {
    let dir = temp_dir();
    assert!(load_model(&dir.join("absent.json").to_string_lossy()).is_none());

    std::fs::create_dir_all(&dir).unwrap();
    let broken = dir.join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    assert!(load_model(&broken.to_string_lossy()).is_none());

    let _ = std::fs::remove_dir_all(&dir);
}
