use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScraperError>;

/// Errors that invalidate an operation (as opposed to the soft outcomes
/// carried by [`crate::nav::NavigationOutcome`]).
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("browser error: {0}")]
    Browser(#[from] sii_browser::BrowserError),

    #[error("session error: {0}")]
    Session(#[from] sii_session::SessionError),

    #[error("code-set error: {0}")]
    Codes(#[from] sii_codes::CodesError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("document not produced: {0}")]
    DocumentNotProduced(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScraperError::Parse("registry table has no rows".to_string());
        assert_eq!(err.to_string(), "parse error: registry table has no rows");
    }

    #[test]
    fn test_session_error_converts() {
        let err: ScraperError = sii_session::SessionError::Closed.into();
        assert!(matches!(err, ScraperError::Session(_)));
    }
}
