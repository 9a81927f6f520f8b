use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThemeMapError>;

#[derive(Error, Debug)]
pub enum ThemeMapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] theme_code_chunker::ChunkerError),

    #[error("No theme map for project: {0}")]
    ProjectNotFound(String),

    #[error("Summarizer failed: {0}")]
    Summarizer(String),

    #[error("Reindex scheduler for {0} is gone")]
    SchedulerClosed(String),

    #[error("{0}")]
    Other(String),
}
