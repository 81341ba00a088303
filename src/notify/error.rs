use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl NotifyError {
    /// Rate limits, server errors and connection problems are worth another
    /// attempt; other client errors mean the webhook itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::HttpStatus { status } => *status == 429 || *status >= 500,
            NotifyError::Http(_) => true,
        }
    }
}
