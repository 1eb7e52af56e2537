//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} returned {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} found nothing for query '{query}'")]
    NoResults {
        provider: &'static str,
        query: String,
    },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("Plan rejected: {0}")]
    Plan(#[from] vreel_models::PlanError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn api(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider,
            status,
            message: message.into(),
        }
    }

    pub fn no_results(provider: &'static str, query: impl Into<String>) -> Self {
        Self::NoResults {
            provider,
            query: query.into(),
        }
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) | ProviderError::DownloadFailed(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
