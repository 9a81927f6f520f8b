use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Vector search unavailable: {0}")]
    VectorUnavailable(String),

    #[error("{0}")]
    Other(String),
}
