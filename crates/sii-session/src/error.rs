use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials rejected or login page shape unrecognized.
    /// Fatal per session; never retried automatically.
    #[error("authentication rejected: {reason}")]
    Authentication { reason: String },

    /// The post-login page never settled within the bounded wait.
    #[error("authentication timed out after {seconds}s")]
    AuthenticationTimeout { seconds: u64 },

    /// Browser/context could not be created or was already torn down.
    #[error("session browser error: {0}")]
    Browser(#[from] sii_browser::BrowserError),

    /// Operated on a session that was already released.
    #[error("session already closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Authentication {
            reason: "clave incorrecta".to_string(),
        };
        assert_eq!(err.to_string(), "authentication rejected: clave incorrecta");

        let err = SessionError::AuthenticationTimeout { seconds: 20 };
        assert!(err.to_string().contains("20s"));
    }

    #[test]
    fn test_browser_error_converts() {
        let err: SessionError = sii_browser::BrowserError::Closed.into();
        assert!(matches!(err, SessionError::Browser(_)));
    }
}
