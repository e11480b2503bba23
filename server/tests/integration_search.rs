use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rank_core::persist::{save_index, IndexPaths};
use rank_core::query::DEFAULT_MAX_SYNONYMS;
use rank_core::{Corpus, IndexBuilder, Tokenizer};
use rank_server::{build_app, load_state, router, ServerOptions};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &Path) {
    let corpus = Corpus::from_texts(
        [("d1", "cat dog cat"), ("d2", "dog bird"), ("d3", "fish")],
        &Tokenizer::default(),
    )
    .unwrap();
    let index = IndexBuilder::default().build(&corpus).unwrap();
    save_index(&IndexPaths::new(dir), &index).unwrap();
}

fn app(dir: &Path) -> Router {
    build_tiny_index(dir);
    let thesaurus = dir.join("thesaurus.json");
    fs::write(&thesaurus, r#"{"kitten": ["cat", "kitty"]}"#).unwrap();
    let options = ServerOptions { thesaurus: Some(thesaurus), max_synonyms: 3, workers: 2 };
    build_app(&dir.to_string_lossy(), options).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempdir().unwrap();
    let (status, body) = get(app(dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let (status, body) = get(app(dir.path()), "/search?q=cat%20bird&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr[0]["doc_id"], "d1");
    assert_eq!(arr[1]["doc_id"], "d2");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert!(json["took_s"].as_f64().is_some());
}

#[tokio::test]
async fn k_is_clamped_to_at_least_one() {
    let dir = tempdir().unwrap();
    let (_, body) = get(app(dir.path()), "/search?q=dog&k=0").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn expansion_is_opt_in() {
    let dir = tempdir().unwrap();
    let app = app(dir.path());
    let (_, body) = get(app.clone(), "/search?q=kitten").await;
    let plain: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(plain["total_hits"], 0);

    let (_, body) = get(app, "/search?q=kitten&expand=true").await;
    let expanded: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(expanded["total_hits"], 1);
    assert_eq!(expanded["results"][0]["doc_id"], "d1");
}

#[tokio::test]
async fn doc_lookup_by_external_id() {
    let dir = tempdir().unwrap();
    let app = app(dir.path());
    let (status, body) = get(app.clone(), "/doc/d2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["length"], 2);

    let (status, _) = get(app, "/doc/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_keeps_query_order() {
    let dir = tempdir().unwrap();
    let payload = r#"[
        {"Id": 1, "Title": "fish", "Body": ""},
        {"Id": "two", "Title": "dog", "Body": "cat"},
        {"Id": 3, "Title": "the", "Body": "of"}
    ]"#;
    let req = Request::post("/search/batch?k=1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(app(dir.path()), req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let queries = json["queries"].as_array().unwrap();
    let ids: Vec<&str> = queries.iter().map(|q| q["query_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "two", "3"]);
    assert_eq!(queries[0]["results"][0]["doc_id"], "d3");
    assert_eq!(queries[1]["total_hits"], 2);
    assert_eq!(queries[1]["results"].as_array().unwrap().len(), 1);
    assert_eq!(queries[2]["total_hits"], 0);
}

#[tokio::test]
async fn batch_rejects_non_text_queries() {
    let dir = tempdir().unwrap();
    let req = Request::post("/search/batch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"[{"Id": 1, "Title": 5}]"#))
        .unwrap();
    let (status, _) = send(app(dir.path()), req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn missing_index_fails_to_start() {
    let dir = tempdir().unwrap();
    assert!(build_app(&dir.path().join("none").to_string_lossy(), ServerOptions::default()).is_err());
}

#[test]
fn default_options_keep_expansion_enabled() {
    let options = ServerOptions::default();
    assert_eq!(options.max_synonyms, DEFAULT_MAX_SYNONYMS);
    assert!(options.max_synonyms > 0);
}

#[tokio::test]
async fn batches_share_one_worker_pool() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let state = load_state(&dir.path().to_string_lossy(), ServerOptions { workers: 2, ..Default::default() }).unwrap();
    assert_eq!(state.pool.current_num_threads(), 2);

    let pool = Arc::clone(&state.pool);
    for _ in 0..3 {
        let req = Request::post("/search/batch")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"[{"Id": 1, "Title": "dog", "Body": ""}]"#))
            .unwrap();
        let (status, _) = send(router(state.clone()), req).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert!(Arc::ptr_eq(&pool, &state.pool));
    assert_eq!(Arc::strong_count(&pool), 2);
}
