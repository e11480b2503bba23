#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] bincode::Error),

    #[error("corpus contains no indexable documents")]
    EmptyCorpus,

    #[error("document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("query {id}: {reason}")]
    InvalidQuery { id: String, reason: String },

    #[error("duplicate document id {0}")]
    DuplicateDocument(String),

    #[error("index inconsistency: {0}")]
    Consistency(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = core::result::Result<T, Error>;
