use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rank_core::persist::{load_index, IndexPaths};
use rank_core::query::DEFAULT_MAX_SYNONYMS;
use rank_core::search::{search, search_batch, worker_pool, QueryResult};
use rank_core::{
    CancellationToken, Hit, InvertedIndex, MapThesaurus, QueryConfig, QueryProcessor, RawQuery, ScoringMode, Tokenizer,
};
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const MAX_K: usize = 100;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// JSON thesaurus used when a request asks for expansion.
    pub thesaurus: Option<PathBuf>,
    pub max_synonyms: usize,
    /// Worker threads for batch requests (0 = one per CPU).
    pub workers: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { thesaurus: None, max_synonyms: DEFAULT_MAX_SYNONYMS, workers: 0 }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub expand: bool,
}

#[derive(Deserialize)]
pub struct BatchParams {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub expand: bool,
}

fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub terms: Vec<String>,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<Hit>,
}

#[derive(Serialize)]
pub struct BatchEntry {
    pub query_id: String,
    pub total_hits: usize,
    pub results: Vec<Hit>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub took_s: f64,
    pub queries: Vec<BatchEntry>,
}

/// Shared by every request. `pool` is the only place batch queries run, so
/// concurrent batches queue for the same threads.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<InvertedIndex>,
    pub queries: QueryProcessor,
    pub pool: Arc<ThreadPool>,
}

type ApiError = (StatusCode, String);

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Load the index under `index_dir` and wire up the routes.
pub fn build_app(index_dir: &str, options: ServerOptions) -> Result<Router> {
    Ok(router(load_state(index_dir, options)?))
}

pub fn load_state(index_dir: &str, options: ServerOptions) -> Result<AppState> {
    let index = load_index(&IndexPaths::new(index_dir)).with_context(|| format!("loading index from {index_dir}"))?;
    let config = QueryConfig { max_synonyms: options.max_synonyms, ..Default::default() };
    let mut queries = QueryProcessor::new(Tokenizer::new(index.settings().tokenizer.clone()), config);
    if let Some(path) = &options.thesaurus {
        let thesaurus = MapThesaurus::load(path).with_context(|| format!("loading thesaurus {}", path.display()))?;
        tracing::info!(entries = thesaurus.len(), "thesaurus loaded");
        queries = queries.with_thesaurus(Arc::new(thesaurus));
    }
    let pool = worker_pool(options.workers)?;
    tracing::info!(workers = pool.current_num_threads(), "search pool ready");
    Ok(AppState { index: Arc::new(index), queries, pool: Arc::new(pool) })
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/search/batch", post(batch_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let query = state.queries.process_text("q", &params.q, params.expand);
    let terms: Vec<String> = query.terms.iter().cloned().collect();
    let index = state.index.clone();
    let mut hits = tokio::task::spawn_blocking(move || search(&query, &index, ScoringMode::Weighted))
        .await
        .map_err(internal)?
        .map_err(internal)?;
    let total_hits = hits.len();
    hits.truncate(params.k.clamp(1, MAX_K));
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        terms,
        took_s: elapsed.as_secs_f64(),
        total_hits,
        results: hits,
    }))
}

pub async fn batch_handler(
    State(state): State<AppState>,
    Query(params): Query<BatchParams>,
    Json(raws): Json<Vec<RawQuery>>,
) -> Result<Json<BatchResponse>, ApiError> {
    let start = Instant::now();
    let mut parsed = Vec::with_capacity(raws.len());
    for raw in &raws {
        let text = raw
            .text()
            .map_err(|reason| (StatusCode::UNPROCESSABLE_ENTITY, format!("query {}: {reason}", raw.id)))?;
        parsed.push(state.queries.process_text(&raw.id, &text, params.expand));
    }
    let (index, pool) = (state.index.clone(), state.pool.clone());
    let results: Vec<QueryResult> = tokio::task::spawn_blocking(move || {
        search_batch(&index, &parsed, ScoringMode::Weighted, &pool, &CancellationToken::new())
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    let k = params.k.clamp(1, MAX_K);
    let queries = results
        .into_iter()
        .map(|mut r| {
            let total_hits = r.hits.len();
            r.hits.truncate(k);
            BatchEntry { query_id: r.query_id, total_hits, results: r.hits }
        })
        .collect();
    Ok(Json(BatchResponse { took_s: start.elapsed().as_secs_f64(), queries }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let meta = state
        .index
        .doc_id(&doc_id)
        .and_then(|id| state.index.doc(id).map(|m| (id, m)));
    match meta {
        Some((internal_id, meta)) => Ok(Json(serde_json::json!({
            "doc_id": meta.external_id,
            "internal_id": internal_id,
            "length": meta.length,
        }))),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}
