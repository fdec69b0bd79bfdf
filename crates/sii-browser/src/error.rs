use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    Chromium(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout after {budget_ms}ms: {waiting_for}")]
    Timeout {
        waiting_for: String,
        budget_ms: u64,
    },

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("screenshot failed: {0}")]
    Screenshot(String),

    #[error("browser already closed")]
    Closed,
}

impl BrowserError {
    /// A timeout against a wait budget, labeled with what was awaited.
    pub fn timeout(waiting_for: impl Into<String>, budget: std::time::Duration) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            budget_ms: budget.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = BrowserError::Navigation("page not found".to_string());
        assert_eq!(err.to_string(), "navigation failed: page not found");
    }

    #[test]
    fn test_timeout_error_carries_budget() {
        let err = BrowserError::timeout("form text", Duration::from_secs(30));
        assert!(err.to_string().contains("30000ms"));
        assert!(err.to_string().contains("form text"));
    }
}
