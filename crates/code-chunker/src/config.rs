use serde::{Deserialize, Serialize};

/// Configuration for structural chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Number of `(path, content hash)` entries kept in the chunk cache
    pub cache_capacity: usize,

    /// Try grammar-aware passes before the regex approximations.
    /// Disabling this is mostly useful to exercise the fallbacks.
    pub grammar_pass: bool,

    /// Treat `//` as a comment in style files (SCSS / Sass only)
    pub scss_line_comments: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 512,
            grammar_pass: true,
            scss_line_comments: true,
        }
    }
}

impl ChunkerConfig {
    /// Regex-only chunking, no grammar passes
    pub fn regex_only() -> Self {
        Self {
            grammar_pass: false,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(ChunkerConfig::default().validate().is_ok());
        assert!(ChunkerConfig::regex_only().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = ChunkerConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
