//! Error types for flashline-fetch.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{url} unavailable (HTTP {status})")]
    Unavailable { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("signature larger than {limit} bytes")]
    SignatureTooLarge { limit: usize },

    #[error("max retries exceeded ({count} attempts): {last}")]
    MaxRetriesExceeded { count: u32, last: String },
}

impl FetchError {
    /// Whether another attempt could succeed: transport faults and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Unavailable { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
