//! Ranking engine: OR-semantics score accumulation over a borrowed index.

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::index::{DocId, InvertedIndex};
use crate::query::Query;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: String,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Sum of precomputed term weights.
    #[default]
    Weighted,
    /// Number of distinct query terms the document contains.
    MatchCount,
}

/// Sum the index weights of every query term a document contains.
/// Terms missing from the index contribute nothing.
pub fn score(query: &Query, index: &InvertedIndex) -> HashMap<DocId, f64> {
    accumulate(query, index, |w| w)
}

/// Boolean OR retrieval scored by the number of matched terms.
pub fn match_count(query: &Query, index: &InvertedIndex) -> HashMap<DocId, f64> {
    accumulate(query, index, |_| 1.0)
}

fn accumulate(query: &Query, index: &InvertedIndex, contribution: impl Fn(f64) -> f64) -> HashMap<DocId, f64> {
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for term in &query.terms {
        if let Some(postings) = index.postings(term) {
            for p in postings {
                *scores.entry(p.doc_id).or_insert(0.0) += contribution(p.weight);
            }
        }
    }
    scores
}

/// Resolve document ids and order by score descending, then external id ascending.
pub fn rank(scores: HashMap<DocId, f64>, index: &InvertedIndex) -> Result<Vec<Hit>> {
    let mut hits = scores
        .into_iter()
        .map(|(doc_id, score)| -> Result<Hit> {
            let meta = index
                .doc(doc_id)
                .ok_or_else(|| Error::Consistency(format!("scored document {doc_id} is not in the index")))?;
            Ok(Hit { doc_id: meta.external_id.clone(), score })
        })
        .collect::<Result<Vec<_>>>()?;
    hits.sort_by(compare_hits);
    Ok(hits)
}

pub(crate) fn compare_hits(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Full ranked list for one query. Truncation is left to the caller.
pub fn search(query: &Query, index: &InvertedIndex, mode: ScoringMode) -> Result<Vec<Hit>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let scores = match mode {
        ScoringMode::Weighted => score(query, index),
        ScoringMode::MatchCount => match_count(query, index),
    };
    rank(scores, index)
}

/// Worker pool for [`search_batch`] with `workers` threads (`0` picks the
/// number of CPUs). Build it once and share it between batches.
pub fn worker_pool(workers: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("search-worker-{i}"))
        .build()
        .map_err(|e| Error::Config(format!("cannot start search workers: {e}")))
}

/// Evaluate independent queries on `pool`. Results come back in query order.
pub fn search_batch(
    index: &InvertedIndex,
    queries: &[Query],
    mode: ScoringMode,
    pool: &ThreadPool,
    cancel: &CancellationToken,
) -> Result<Vec<QueryResult>> {
    let results = pool.install(|| {
        queries
            .par_iter()
            .map(|q| -> Result<QueryResult> {
                cancel.check()?;
                Ok(QueryResult { query_id: q.id.clone(), hits: search(q, index, mode)? })
            })
            .collect::<Result<Vec<_>>>()
    })?;
    tracing::info!(queries = results.len(), workers = pool.current_num_threads(), "batch search complete");
    Ok(results)
}
