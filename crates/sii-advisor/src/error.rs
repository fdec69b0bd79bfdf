//! Error types for the advisory client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// API error with status code
    #[error("advisory API error: status {status}, {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// The response carried no completion content
    #[error("advisory response had no content")]
    MissingContent,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdvisorError::Api {
            status: 429,
            message: "Too Many Requests".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "advisory API error: status 429, Too Many Requests"
        );

        assert_eq!(
            AdvisorError::MissingContent.to_string(),
            "advisory response had no content"
        );
    }
}
