//! Pipeline-level metrics.
//!
//! Counters for the run orchestration itself; provider-level request
//! metrics live in `vreel-providers`.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Segments that completed normalization and compositing.
    pub const SEGMENTS_PROCESSED_TOTAL: &str = "pipeline_segments_processed_total";

    /// Degradations taken, labeled by stage (visual, tts, captions, music, render).
    pub const FALLBACKS_TOTAL: &str = "pipeline_fallbacks_total";

    /// Wall-clock seconds spent in the final encode.
    pub const RENDER_SECONDS: &str = "pipeline_render_seconds";
}

/// Record one fully processed segment.
pub fn record_segment_processed() {
    counter!(names::SEGMENTS_PROCESSED_TOTAL).increment(1);
}

/// Record a degradation at the given stage.
pub fn record_fallback(stage: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "stage" => stage).increment(1);
}

/// Record the final encode duration.
pub fn record_render_seconds(seconds: f64) {
    histogram!(names::RENDER_SECONDS).record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::SEGMENTS_PROCESSED_TOTAL.contains("segments"));
        assert!(names::FALLBACKS_TOTAL.contains("fallbacks"));
        assert!(names::RENDER_SECONDS.contains("render"));
    }
}
