//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Plan error: {0}")]
    Plan(#[from] vreel_models::PlanError),

    #[error("Media error: {0}")]
    Media(#[from] vreel_media::MediaError),

    #[error("Provider error: {0}")]
    Provider(#[from] vreel_providers::ProviderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn planning_failed(msg: impl Into<String>) -> Self {
        Self::PlanningFailed(msg.into())
    }

    pub fn assembly_failed(msg: impl Into<String>) -> Self {
        Self::AssemblyFailed(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    ///
    /// Config and plan-validation failures never improve on retry; network
    /// and render failures can.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::RenderFailed(_) | WorkerError::Media(_) | WorkerError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_not_retryable() {
        assert!(!WorkerError::config_error("missing key").is_retryable());
        assert!(!WorkerError::planning_failed("no plan").is_retryable());
    }

    #[test]
    fn test_render_error_retryable() {
        assert!(WorkerError::render_failed("encoder crashed").is_retryable());
    }
}
