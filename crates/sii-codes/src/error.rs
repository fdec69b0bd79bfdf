//! Error types for code-set loading and lookup.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodesError>;

#[derive(Debug, Error)]
pub enum CodesError {
    #[error("code-set directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("failed to read code set at {path}: {source}")]
    LoadError {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to parse code set at {path}: {source}")]
    ParseError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("code set not found: {set_id}")]
    NotFound { set_id: String },

    #[error("invalid code set: {reason}")]
    Invalid { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodesError::NotFound {
            set_id: "declaration-proposal".to_string(),
        };
        assert_eq!(err.to_string(), "code set not found: declaration-proposal");
    }
}
