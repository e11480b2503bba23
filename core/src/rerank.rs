//! Second-stage reranking of a ranked candidate list by embedding similarity.
//!
//! No embedding model ships with this crate; callers plug one in through
//! [`Embedder`].

use crate::error::{Error, Result};
use crate::search::{compare_hits, Hit};
use std::collections::HashMap;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Cosine similarity in `[-1, 1]`; zero vectors are dissimilar to everything.
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::Consistency(format!("embedding sizes differ: {} vs {}", a.len(), b.len())));
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0))
}

/// Rescore the first `depth` candidates by similarity to `query_text` and
/// reorder them; candidates past `depth` follow unchanged.
pub fn rerank(
    hits: &[Hit],
    query_text: &str,
    doc_texts: &HashMap<String, String>,
    embedder: &dyn Embedder,
    depth: usize,
) -> Result<Vec<Hit>> {
    let query_vec = embedder.embed(query_text)?;
    let depth = depth.min(hits.len());
    let mut out = hits[..depth]
        .iter()
        .map(|hit| -> Result<Hit> {
            let text = doc_texts
                .get(&hit.doc_id)
                .ok_or_else(|| Error::Consistency(format!("no text for candidate {}", hit.doc_id)))?;
            let score = similarity(&query_vec, &embedder.embed(text)?)?;
            Ok(Hit { doc_id: hit.doc_id.clone(), score })
        })
        .collect::<Result<Vec<_>>>()?;
    out.sort_by(compare_hits);
    out.extend_from_slice(&hits[depth..]);
    Ok(out)
}
