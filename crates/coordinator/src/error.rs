use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid policy config: {0}")]
    Config(String),

    #[error("Unknown strategy tier: {0}")]
    UnknownTier(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
