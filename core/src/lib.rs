//! BM25 / TF-IDF inverted-index ranking engine.
//!
//! Pipeline: [`corpus`] tokenizes raw records, [`stats`] computes document
//! frequencies and average length, [`index`] weights every (term, document)
//! pair, [`query`] turns topics into term sets, [`search`] accumulates and
//! ranks, and [`run_file`] writes TREC runs.

pub mod cancel;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod index;
pub mod input;
pub mod persist;
pub mod query;
pub mod rerank;
pub mod run_file;
pub mod scoring;
pub mod search;
pub mod stats;
pub mod tokenizer;

pub use cancel::CancellationToken;
pub use corpus::{Corpus, Document, InvalidTextPolicy, RawDocument};
pub use error::{Error, Result};
pub use index::{build_index, BuildConfig, DocId, DocMeta, IndexBuilder, IndexSettings, InvertedIndex, Posting, TermId};
pub use query::{MapThesaurus, Query, QueryConfig, QueryProcessor, RawQuery, Thesaurus};
pub use run_file::RunFileConfig;
pub use scoring::{Bm25Params, Weighting};
pub use search::{Hit, QueryResult, ScoringMode};
pub use stats::CorpusStats;
pub use tokenizer::{Tokenizer, TokenizerConfig};
