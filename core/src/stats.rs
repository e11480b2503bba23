//! Corpus-wide term statistics: document frequency and average document length.
//!
//! Accumulation is commutative, so the parallel variants produce exactly the
//! same counts as the sequential ones regardless of scheduling.

use crate::cancel::CancellationToken;
use crate::corpus::{Corpus, Document};
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

pub type DocumentFrequency = HashMap<String, u32>;

/// Count, per term, the documents containing it at least once.
pub fn document_frequency(corpus: &Corpus) -> DocumentFrequency {
    let mut df = DocumentFrequency::new();
    for doc in corpus.iter() {
        count_unique_terms(doc, &mut df);
    }
    df
}

/// `sum(len(d)) / N`. Fails on an empty corpus.
pub fn average_document_length(corpus: &Corpus) -> Result<f64> {
    if corpus.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    Ok(corpus.total_tokens() as f64 / corpus.len() as f64)
}

fn count_unique_terms(doc: &Document, df: &mut DocumentFrequency) {
    let unique: HashSet<&str> = doc.tokens.iter().map(String::as_str).collect();
    for term in unique {
        *df.entry(term.to_owned()).or_insert(0) += 1;
    }
}

/// Statistics computed once per build and shared by every weight computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusStats {
    pub num_docs: u32,
    pub total_tokens: u64,
    pub avg_doc_len: f64,
    pub df: DocumentFrequency,
}

impl CorpusStats {
    /// Single data-parallel pass: map documents to partial counts, reduce by summing.
    pub fn compute(corpus: &Corpus, cancel: &CancellationToken) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let (df, total_tokens) = corpus
            .documents()
            .par_iter()
            .try_fold(
                || (DocumentFrequency::new(), 0u64),
                |(mut df, total), doc| {
                    cancel.check()?;
                    count_unique_terms(doc, &mut df);
                    Ok::<_, Error>((df, total + doc.len() as u64))
                },
            )
            .try_reduce(
                || (DocumentFrequency::new(), 0u64),
                |(a, ta), (b, tb)| Ok((merge(a, b), ta + tb)),
            )?;
        let num_docs = corpus.len() as u32;
        let avg_doc_len = total_tokens as f64 / f64::from(num_docs);
        tracing::debug!(num_docs, terms = df.len(), avg_doc_len, "computed corpus statistics");
        Ok(Self { num_docs, total_tokens, avg_doc_len, df })
    }

    pub fn df(&self, term: &str) -> Option<u32> { self.df.get(term).copied() }
}

fn merge(a: DocumentFrequency, b: DocumentFrequency) -> DocumentFrequency {
    let (mut into, from) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    for (term, n) in from {
        *into.entry(term).or_insert(0) += n;
    }
    into
}
