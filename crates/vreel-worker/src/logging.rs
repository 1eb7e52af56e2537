//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for pipeline runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Run logger for structured logging with consistent formatting.
///
/// Carries the run id and current stage so lifecycle events share the
/// same contextual fields.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    stage: String,
}

impl RunLogger {
    /// Create a logger for a fresh run.
    pub fn new(stage: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same run, different stage.
    pub fn stage(&self, stage: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            stage: stage.to_string(),
        }
    }

    /// Log the start of a stage.
    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run started: {}", message
        );
    }

    /// Log a progress update.
    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run progress: {}", message
        );
    }

    /// Log a warning.
    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run warning: {}", message
        );
    }

    /// Log an error.
    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run error: {}", message
        );
    }

    /// Log stage completion.
    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run completed: {}", message
        );
    }

    /// Get the run id.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Create a tracing span carrying the run context.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            stage = %self.stage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_keeps_run_id() {
        let logger = RunLogger::new("planning");
        let next = logger.stage("assembly");

        assert_eq!(logger.run_id(), next.run_id());
        assert_eq!(next.stage, "assembly");
    }
}
