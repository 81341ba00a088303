use thiserror::Error;

/// Failure of a single details request. Never crosses the fetcher boundary:
/// callers only see [`super::FetchOutcome`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to Steam timed out")]
    Timeout,

    #[error("Request to Steam failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Steam returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Failed to decode Steam response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Decode(e)
        } else {
            FetchError::Http(e)
        }
    }
}
