//! TREC run output: `<qid> 0 <docid> <rank> <score> <tag>` per line.

use crate::error::{Error, Result};
use crate::search::QueryResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_RUN_TAG: &str = "Run1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunFileConfig {
    /// Maximum documents emitted per query.
    pub limit: usize,
    pub run_tag: String,
}

impl Default for RunFileConfig {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT, run_tag: DEFAULT_RUN_TAG.to_string() }
    }
}

impl RunFileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.run_tag.is_empty() || self.run_tag.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!("run tag {:?} must be a single non-empty word", self.run_tag)));
        }
        Ok(())
    }
}

pub fn format_line(query_id: &str, doc_id: &str, rank: usize, score: f64, run_tag: &str) -> String {
    format!("{query_id} 0 {doc_id} {rank} {score:.6} {run_tag}")
}

/// Write one block per query, in the given order. Returns the number of lines written.
pub fn write_run<W: Write>(out: &mut W, results: &[QueryResult], config: &RunFileConfig) -> Result<usize> {
    config.validate()?;
    let mut lines = 0;
    for result in results {
        for (i, hit) in result.hits.iter().take(config.limit).enumerate() {
            for id in [&result.query_id, &hit.doc_id] {
                if id.is_empty() || id.chars().any(char::is_whitespace) {
                    return Err(Error::Config(format!("identifier {id:?} cannot be written to a run file")));
                }
            }
            writeln!(out, "{}", format_line(&result.query_id, &hit.doc_id, i + 1, hit.score, &config.run_tag))?;
            lines += 1;
        }
    }
    Ok(lines)
}

pub fn save_run(path: &Path, results: &[QueryResult], config: &RunFileConfig) -> Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let lines = write_run(&mut out, results, config)?;
    out.flush()?;
    tracing::info!(path = %path.display(), queries = results.len(), lines, "wrote run file");
    Ok(lines)
}
