use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Content loader error: {0}")]
    LoaderError(#[from] theme_protocol::LoaderError),

    #[error("Search error: {0}")]
    SearchError(#[from] theme_search::SearchError),

    #[error("Invalid topic glob: {0}")]
    GlobError(#[from] globset::Error),

    #[error("{0}")]
    Other(String),
}
