use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors raised by individual chunking strategies.
///
/// These never escape [`crate::Chunker::chunk`]: a failing strategy hands over
/// to the next one in its chain.
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Structural parse failed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Embedded JSON (schema block or config file) is not valid
    #[error("Malformed JSON at byte {offset}: {message}")]
    MalformedJson { offset: usize, message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChunkerError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn malformed_json(offset: usize, msg: impl Into<String>) -> Self {
        Self::MalformedJson {
            offset,
            message: msg.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
