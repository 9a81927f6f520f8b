use serde::{Deserialize, Serialize};

/// Theme map indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Files larger than this are treated as generated output
    pub max_file_bytes: usize,

    /// Any line longer than this marks the file as minified
    pub max_line_length: usize,

    /// Rules sharing a class prefix before it counts as a file pattern
    pub pattern_min_rules: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024,
            max_line_length: 2_000,
            pattern_min_rules: 3,
        }
    }
}

impl IndexerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_file_bytes == 0 {
            return Err("max_file_bytes must be greater than 0".to_string());
        }
        if self.max_line_length == 0 {
            return Err("max_line_length must be greater than 0".to_string());
        }
        if self.pattern_min_rules < 2 {
            return Err("pattern_min_rules must be at least 2".to_string());
        }
        Ok(())
    }
}
