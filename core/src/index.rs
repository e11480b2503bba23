use crate::cancel::CancellationToken;
use crate::corpus::{Corpus, InvalidTextPolicy, RawDocument};
use crate::error::{Error, Result};
use crate::scoring::{idf, Weighting};
use crate::stats::CorpusStats;
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    /// Token count after cleaning.
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f64,
}

/// Settings an index was built with. Queries must be cleaned with the same tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub weighting: Weighting,
    pub tokenizer: TokenizerConfig,
}

/// Term → document → weight, built once from a static corpus.
///
/// Term ids follow lexicographic term order and document ids follow corpus
/// order, so two builds over the same corpus are identical. Postings are
/// sorted by document id. There is no mutation API.
#[derive(Debug, Clone, PartialEq)]
pub struct InvertedIndex {
    dictionary: HashMap<String, TermId>,
    df: Vec<u32>,
    postings: Vec<Vec<Posting>>,
    docs: Vec<DocMeta>,
    avg_doc_len: f64,
    settings: IndexSettings,
    doc_lookup: HashMap<String, DocId>,
}

impl InvertedIndex {
    /// Reassemble an index from persisted parts, checking internal consistency.
    pub(crate) fn from_parts(
        dictionary: HashMap<String, TermId>,
        df: Vec<u32>,
        postings: Vec<Vec<Posting>>,
        docs: Vec<DocMeta>,
        avg_doc_len: f64,
        settings: IndexSettings,
    ) -> Result<Self> {
        let doc_lookup = docs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.external_id.clone(), i as DocId))
            .collect::<HashMap<_, _>>();
        let index = Self { dictionary, df, postings, docs, avg_doc_len, settings, doc_lookup };
        index.validate()?;
        Ok(index)
    }

    pub(crate) fn parts(&self) -> (&HashMap<String, TermId>, &[u32], &[Vec<Posting>], &[DocMeta]) {
        (&self.dictionary, &self.df, &self.postings, &self.docs)
    }

    fn validate(&self) -> Result<()> {
        let terms = self.dictionary.len();
        if self.df.len() != terms || self.postings.len() != terms {
            return Err(Error::Consistency(format!(
                "{terms} terms but {} df entries and {} postings lists",
                self.df.len(),
                self.postings.len()
            )));
        }
        if self.doc_lookup.len() != self.docs.len() {
            return Err(Error::Consistency("document ids are not unique".into()));
        }
        for (term, &tid) in &self.dictionary {
            let plist = self
                .postings
                .get(tid as usize)
                .ok_or_else(|| Error::Consistency(format!("term {term:?} has unknown id {tid}")))?;
            if plist.len() != self.df[tid as usize] as usize {
                return Err(Error::Consistency(format!("term {term:?}: df does not match postings")));
            }
            if let Some(p) = plist.iter().find(|p| p.doc_id as usize >= self.docs.len()) {
                return Err(Error::Consistency(format!("term {term:?} references unknown document {}", p.doc_id)));
            }
            if plist.windows(2).any(|w| w[0].doc_id >= w[1].doc_id) {
                return Err(Error::Consistency(format!("term {term:?}: postings not sorted")));
            }
        }
        Ok(())
    }

    pub fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn avg_doc_len(&self) -> f64 { self.avg_doc_len }

    pub fn settings(&self) -> &IndexSettings { &self.settings }

    pub fn contains_term(&self, term: &str) -> bool { self.dictionary.contains_key(term) }

    pub fn terms(&self) -> impl Iterator<Item = &str> { self.dictionary.keys().map(String::as_str) }

    pub fn df(&self, term: &str) -> Option<u32> {
        self.dictionary.get(term).map(|&tid| self.df[tid as usize])
    }

    /// Postings for a term, sorted by document id.
    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.dictionary.get(term).map(|&tid| self.postings[tid as usize].as_slice())
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> { self.docs.get(doc_id as usize) }

    pub fn doc_id(&self, external_id: &str) -> Option<DocId> { self.doc_lookup.get(external_id).copied() }

    pub fn weight(&self, term: &str, external_id: &str) -> Option<f64> {
        let doc_id = self.doc_id(external_id)?;
        let plist = self.postings(term)?;
        plist
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| plist[i].weight)
    }

    /// Two-level `term → external doc id → weight` view with sorted keys.
    pub fn to_nested_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.dictionary
            .iter()
            .map(|(term, &tid)| {
                let row = self.postings[tid as usize]
                    .iter()
                    .map(|p| (self.docs[p.doc_id as usize].external_id.clone(), p.weight))
                    .collect();
                (term.clone(), row)
            })
            .collect()
    }
}

/// Weight every unique (term, document) pair of `corpus` and assemble the index.
///
/// `stats` must have been computed over the same corpus.
pub fn build_index(
    corpus: &Corpus,
    stats: &CorpusStats,
    settings: IndexSettings,
    cancel: &CancellationToken,
) -> Result<InvertedIndex> {
    if corpus.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    if stats.num_docs as usize != corpus.len() {
        return Err(Error::Consistency(format!(
            "statistics cover {} documents, corpus has {}",
            stats.num_docs,
            corpus.len()
        )));
    }
    if stats.total_tokens == 0 {
        return Err(Error::EmptyCorpus);
    }
    if let Weighting::Bm25(params) = &settings.weighting {
        params.validate()?;
    }

    let mut terms: Vec<&str> = stats.df.keys().map(String::as_str).collect();
    terms.sort_unstable();
    let dictionary: HashMap<String, TermId> =
        terms.iter().enumerate().map(|(i, t)| ((*t).to_owned(), i as TermId)).collect();
    let df: Vec<u32> = terms.iter().map(|t| stats.df[*t]).collect();

    let weighting = settings.weighting;
    let n = stats.num_docs;
    let avg_doc_len = stats.avg_doc_len;

    let per_doc: Vec<Vec<(TermId, f64)>> = corpus
        .documents()
        .par_iter()
        .map(|doc| -> Result<Vec<(TermId, f64)>> {
            cancel.check()?;
            let mut tf: HashMap<&str, u32> = HashMap::new();
            for token in &doc.tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            tf.into_iter()
                .map(|(term, count)| -> Result<(TermId, f64)> {
                    let tid = *dictionary.get(term).ok_or_else(|| {
                        Error::Consistency(format!("term {term:?} of document {} missing from statistics", doc.id))
                    })?;
                    let w = weighting.weight(count, idf(n, df[tid as usize]), doc.len(), avg_doc_len);
                    Ok((tid, w))
                })
                .collect()
        })
        .collect::<Result<_>>()?;

    let mut postings: Vec<Vec<Posting>> = df.iter().map(|&d| Vec::with_capacity(d as usize)).collect();
    for (doc_id, weights) in per_doc.into_iter().enumerate() {
        for (tid, weight) in weights {
            postings[tid as usize].push(Posting { doc_id: doc_id as DocId, weight });
        }
    }

    let docs = corpus
        .iter()
        .map(|d| DocMeta { external_id: d.id.clone(), length: d.len() as u32 })
        .collect();
    let index = InvertedIndex::from_parts(dictionary, df, postings, docs, avg_doc_len, settings)?;
    tracing::info!(
        num_docs = index.num_docs(),
        num_terms = index.num_terms(),
        avg_doc_len,
        weighting = weighting.name(),
        "index build complete"
    );
    Ok(index)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub weighting: Weighting,
    pub tokenizer: TokenizerConfig,
    pub on_invalid: InvalidTextPolicy,
}

/// Orchestrates tokenization, statistics and weighting for one batch.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    config: BuildConfig,
    cancel: CancellationToken,
}

impl IndexBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config, cancel: CancellationToken::new() }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BuildConfig { &self.config }

    pub fn tokenizer(&self) -> Tokenizer { Tokenizer::new(self.config.tokenizer.clone()) }

    pub fn build_from_records(&self, records: &[RawDocument]) -> Result<InvertedIndex> {
        let corpus = Corpus::from_records(records, &self.tokenizer(), self.config.on_invalid, &self.cancel)?;
        self.build(&corpus)
    }

    pub fn build(&self, corpus: &Corpus) -> Result<InvertedIndex> {
        let stats = CorpusStats::compute(corpus, &self.cancel)?;
        let settings = IndexSettings {
            weighting: self.config.weighting,
            tokenizer: self.config.tokenizer.clone(),
        };
        build_index(corpus, &stats, settings, &self.cancel)
    }
}
