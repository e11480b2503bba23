use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::input::{deserialize_id, joined_text};
use crate::tokenizer::Tokenizer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// What to do with a record whose text cannot be tokenized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidTextPolicy {
    /// Fail the whole batch on the first invalid record.
    #[default]
    Abort,
    /// Log and drop the record.
    Skip,
}

/// Document record as read from the input JSON: `{Id, Text}` or `{Id, Title, Body}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawDocument {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: Some(Value::String(text.into())), title: None, body: None }
    }

    /// Raw text of the record; `Text` wins over `Title`/`Body`.
    pub fn raw_text(&self) -> std::result::Result<String, String> {
        match &self.text {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(format!("Text: expected text, found {}", crate::tokenizer::json_kind(other))),
            None => joined_text(self.title.as_ref(), self.body.as_ref()),
        }
    }

    pub fn tokenize(&self, tokenizer: &Tokenizer) -> Result<Document> {
        let text = self
            .raw_text()
            .map_err(|reason| Error::InvalidDocument { id: self.id.clone(), reason })?;
        Ok(Document::new(self.id.clone(), tokenizer.tokenize(&text)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    /// Token sequence in text order, duplicates retained.
    pub tokens: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, tokens: Vec<String>) -> Self {
        Self { id: id.into(), tokens }
    }

    pub fn len(&self) -> usize { self.tokens.len() }

    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }
}

/// Ordered, immutable document collection with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(Error::DuplicateDocument(doc.id.clone()));
            }
        }
        Ok(Self { documents })
    }

    /// Build a corpus from `(id, text)` pairs.
    pub fn from_texts<'a, I, S>(pairs: I, tokenizer: &Tokenizer) -> Result<Self>
    where
        I: IntoIterator<Item = (S, &'a str)>,
        S: Into<String>,
    {
        let docs = pairs.into_iter().map(|(id, text)| Document::new(id, tokenizer.tokenize(text))).collect();
        Self::new(docs)
    }

    /// Tokenize raw records in parallel. Record order is preserved; with
    /// [`InvalidTextPolicy::Abort`] the first invalid record in input order is reported.
    pub fn from_records(
        records: &[RawDocument],
        tokenizer: &Tokenizer,
        policy: InvalidTextPolicy,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let tokenized: Vec<Result<Document>> = records
            .par_iter()
            .map(|rec| {
                cancel.check()?;
                rec.tokenize(tokenizer)
            })
            .collect();

        let mut documents = Vec::with_capacity(tokenized.len());
        let mut skipped = 0usize;
        for res in tokenized {
            match res {
                Ok(doc) => documents.push(doc),
                Err(Error::InvalidDocument { id, reason }) if policy == InvalidTextPolicy::Skip => {
                    tracing::warn!(doc_id = %id, %reason, "skipping invalid document");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(documents = documents.len(), skipped, "tokenized corpus");
        Self::new(documents)
    }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> { self.documents.iter() }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn total_tokens(&self) -> usize { self.documents.iter().map(Document::len).sum() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<RawDocument> {
        serde_json::from_value(json!([
            {"Id": 1, "Text": "cat dog cat"},
            {"Id": "2", "Text": 99},
            {"Id": 3, "Title": "dog", "Body": "bird"},
        ]))
        .unwrap()
    }

    #[test]
    fn abort_reports_first_invalid_record() {
        let err = Corpus::from_records(&records(), &Tokenizer::default(), InvalidTextPolicy::Abort, &CancellationToken::new())
            .unwrap_err();
        match err {
            Error::InvalidDocument { id, .. } => assert_eq!(id, "2"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn skip_drops_invalid_record() {
        let corpus = Corpus::from_records(&records(), &Tokenizer::default(), InvalidTextPolicy::Skip, &CancellationToken::new())
            .unwrap();
        let ids: Vec<_> = corpus.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(corpus.documents()[1].tokens, vec!["dog", "bird"]);
    }

    #[test]
    fn cancelled_scan_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = Corpus::from_records(&records(), &Tokenizer::default(), InvalidTextPolicy::Skip, &cancel);
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let docs = vec![Document::new("a", vec![]), Document::new("a", vec!["x".into()])];
        assert!(matches!(Corpus::new(docs), Err(Error::DuplicateDocument(id)) if id == "a"));
    }

    #[test]
    fn missing_text_is_invalid() {
        let rec: RawDocument = serde_json::from_value(json!({"Id": 4})).unwrap();
        assert!(matches!(rec.tokenize(&Tokenizer::default()), Err(Error::InvalidDocument { .. })));
    }
}
