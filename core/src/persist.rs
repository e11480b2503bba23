use crate::error::{Error, Result};
use crate::index::{DocMeta, IndexSettings, InvertedIndex, Posting, TermId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub avg_doc_len: f64,
    pub settings: IndexSettings,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path)?;
    Ok(bincode::deserialize_from(BufReader::new(f))?)
}

pub fn save_dictionary(paths: &IndexPaths, dict: &(&HashMap<String, TermId>, &[u32])) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bincode(&paths.dictionary(), dict)
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<(HashMap<String, TermId>, Vec<u32>)> {
    read_bincode(&paths.dictionary())
}

pub fn save_docs(paths: &IndexPaths, docs: &[DocMeta]) -> Result<()> {
    write_bincode(&paths.docs(), &docs)
}

pub fn load_docs(paths: &IndexPaths) -> Result<Vec<DocMeta>> {
    read_bincode(&paths.docs())
}

pub fn save_postings(paths: &IndexPaths, postings: &[Vec<Posting>]) -> Result<()> {
    write_bincode(&paths.postings(), &postings)
}

pub fn load_postings(paths: &IndexPaths) -> Result<Vec<Vec<Posting>>> {
    read_bincode(&paths.postings())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta())?;
    let meta: MetaFile = serde_json::from_reader(BufReader::new(f))?;
    Ok(meta)
}

/// Persist every part of the index under `paths.root`.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile> {
    let (dictionary, df, postings, docs) = index.parts();
    save_dictionary(paths, &(dictionary, df))?;
    save_docs(paths, docs)?;
    save_postings(paths, postings)?;
    let meta = MetaFile {
        num_docs: index.num_docs(),
        num_terms: index.num_terms() as u32,
        avg_doc_len: index.avg_doc_len(),
        settings: index.settings().clone(),
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "saved index");
    Ok(meta)
}

/// Load a persisted index and verify it against its meta file.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::Consistency(format!(
            "index format version {} is not supported (expected {FORMAT_VERSION})",
            meta.version
        )));
    }
    let (dictionary, df) = load_dictionary(paths)?;
    let docs = load_docs(paths)?;
    let postings = load_postings(paths)?;
    if docs.len() != meta.num_docs as usize || dictionary.len() != meta.num_terms as usize {
        return Err(Error::Consistency(format!(
            "meta.json describes {} documents and {} terms, found {} and {}",
            meta.num_docs,
            meta.num_terms,
            docs.len(),
            dictionary.len()
        )));
    }
    let index = InvertedIndex::from_parts(dictionary, df, postings, docs, meta.avg_doc_len, meta.settings)?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "loaded index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::index::IndexBuilder;
    use crate::tokenizer::Tokenizer;
    use tempfile::tempdir;

    fn tiny_index() -> InvertedIndex {
        let corpus = Corpus::from_texts([("D1", "cat dog cat"), ("D2", "dog bird")], &Tokenizer::default()).unwrap();
        IndexBuilder::default().build(&corpus).unwrap()
    }

    #[test]
    fn roundtrips_through_disk() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let index = tiny_index();
        let meta = save_index(&paths, &index).unwrap();
        assert_eq!(meta.num_docs, 2);
        assert_eq!(load_index(&paths).unwrap(), index);
    }

    #[test]
    fn rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut meta = save_index(&paths, &tiny_index()).unwrap();
        meta.version = 99;
        save_meta(&paths, &meta).unwrap();
        assert!(matches!(load_index(&paths), Err(Error::Consistency(_))));
    }

    #[test]
    fn rejects_postings_for_unknown_documents() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &tiny_index()).unwrap();
        let docs = load_docs(&paths).unwrap();
        save_docs(&paths, &docs[..1]).unwrap();
        let mut meta = load_meta(&paths).unwrap();
        meta.num_docs = 1;
        save_meta(&paths, &meta).unwrap();
        assert!(matches!(load_index(&paths), Err(Error::Consistency(_))));
    }

    #[test]
    fn missing_index_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(load_index(&IndexPaths::new(dir.path().join("nope"))), Err(Error::Io(_))));
    }
}
