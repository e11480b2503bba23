use crate::cancel::CancellationToken;
use crate::corpus::InvalidTextPolicy;
use crate::error::{Error, Result};
use crate::input::{deserialize_id, joined_text};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_MAX_SYNONYMS: usize = 3;

/// Query record as read from the topics JSON: `{Id, Title, Body}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawQuery {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl RawQuery {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(Value::String(title.into())),
            body: Some(Value::String(body.into())),
        }
    }

    /// `"{title} {body}"`.
    pub fn text(&self) -> std::result::Result<String, String> {
        joined_text(self.title.as_ref(), self.body.as_ref())
    }
}

/// A processed query. Terms form a set: repeating a word in the query text
/// does not increase its contribution to any score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: String,
    pub terms: BTreeSet<String>,
}

impl Query {
    pub fn new<I, S>(id: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { id: id.into(), terms: terms.into_iter().map(Into::into).collect() }
    }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    pub fn len(&self) -> usize { self.terms.len() }
}

/// Synonym source used for query expansion.
pub trait Thesaurus: Send + Sync {
    /// Candidate synonyms of the surface word `term` in preference order,
    /// never `term` itself. The caller bounds how many it keeps.
    fn synonyms_of(&self, term: &str) -> Vec<String>;
}

/// Thesaurus backed by a `term -> [synonym, ...]` table, typically loaded from JSON.
/// Candidates come back in table order.
#[derive(Debug, Clone, Default)]
pub struct MapThesaurus {
    entries: HashMap<String, Vec<String>>,
}

impl MapThesaurus {
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let entries: HashMap<String, Vec<String>> = serde_json::from_reader(std::io::BufReader::new(f))?;
        tracing::debug!(entries = entries.len(), path = %path.display(), "loaded thesaurus");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Thesaurus for MapThesaurus {
    fn synonyms_of(&self, term: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let Some(candidates) = self.entries.get(term) else { return out };
        for syn in candidates {
            let syn = syn.to_lowercase();
            if syn != term && !out.contains(&syn) {
                out.push(syn);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub expand: bool,
    pub max_synonyms: usize,
    pub on_invalid: InvalidTextPolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { expand: false, max_synonyms: DEFAULT_MAX_SYNONYMS, on_invalid: InvalidTextPolicy::Abort }
    }
}

/// Turns raw query records into term sets, optionally expanded with synonyms.
#[derive(Clone)]
pub struct QueryProcessor {
    tokenizer: Tokenizer,
    thesaurus: Option<Arc<dyn Thesaurus>>,
    config: QueryConfig,
}

impl QueryProcessor {
    pub fn new(tokenizer: Tokenizer, config: QueryConfig) -> Self {
        Self { tokenizer, thesaurus: None, config }
    }

    pub fn with_thesaurus(mut self, thesaurus: Arc<dyn Thesaurus>) -> Self {
        self.thesaurus = Some(thesaurus);
        self
    }

    pub fn config(&self) -> &QueryConfig { &self.config }

    pub fn process(&self, raw: &RawQuery) -> Result<Query> {
        let text = raw
            .text()
            .map_err(|reason| Error::InvalidQuery { id: raw.id.clone(), reason })?;
        Ok(self.process_text(&raw.id, &text, self.config.expand))
    }

    /// Clean free text into a query, expanding when `expand` is set and a
    /// thesaurus is configured.
    ///
    /// The thesaurus is consulted with unstemmed words. Each synonym is cleaned
    /// like document text, so a multi-word or hyphenated synonym adds every
    /// token it yields. At most `max_synonyms` synonyms per word are kept,
    /// counting only those that add a term not already in the query.
    pub fn process_text(&self, id: &str, text: &str, expand: bool) -> Query {
        let words: BTreeSet<String> = self.tokenizer.surface_tokens(text).into_iter().collect();
        let mut terms: BTreeSet<String> = words.iter().map(|w| self.tokenizer.stem(w)).collect();
        if expand {
            match &self.thesaurus {
                Some(thesaurus) => {
                    for word in &words {
                        let mut kept = 0;
                        for syn in thesaurus.synonyms_of(word) {
                            if kept >= self.config.max_synonyms { break; }
                            let fresh: Vec<String> =
                                self.tokenizer.tokenize(&syn).into_iter().filter(|t| !terms.contains(t)).collect();
                            if fresh.is_empty() { continue; }
                            terms.extend(fresh);
                            kept += 1;
                        }
                    }
                }
                None => tracing::debug!(query_id = id, "expansion requested without a thesaurus"),
            }
        }
        Query { id: id.to_owned(), terms }
    }

    /// Process a batch in input order, applying the invalid-text policy.
    pub fn process_all(&self, raws: &[RawQuery], cancel: &CancellationToken) -> Result<Vec<Query>> {
        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
            cancel.check()?;
            match self.process(raw) {
                Ok(q) => out.push(q),
                Err(Error::InvalidQuery { id, reason }) if self.config.on_invalid == InvalidTextPolicy::Skip => {
                    tracing::warn!(query_id = %id, %reason, "skipping invalid query");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}
