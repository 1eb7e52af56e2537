//! Timeline assembly.
//!
//! One linear scan over the plan's segments fixes each clip's duration and
//! start offset. Narration duration is authoritative when present; visuals
//! are stretched or trimmed to match, never the reverse.

use tracing::warn;

use crate::error::{MediaError, MediaResult};

/// Inputs the assembler needs about one segment.
#[derive(Debug, Clone)]
pub struct SegmentPlanInput {
    /// Measured narration duration, when the segment has usable audio
    pub narration_duration: Option<f64>,
    /// Plan-supplied estimate used when narration is absent
    pub estimated_duration: f64,
}

/// One segment placed on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSegment {
    /// Position in the plan's declared order
    pub index: usize,
    /// Final clip duration in seconds
    pub duration: f64,
    /// Start offset on the master timeline
    pub start: f64,
    /// Fade-in length; 0.0 for the first segment
    pub fade_in: f64,
}

/// The assembled timeline.
#[derive(Debug, Clone)]
pub struct Timeline {
    /// Segments in plan order with offsets assigned
    pub segments: Vec<PlannedSegment>,
    /// Sum of placed segment durations
    pub visual_duration: f64,
    /// Total narration duration across all inputs, dropped tails included
    pub narration_duration: f64,
    /// Final output duration: max(visual, narration)
    pub total_duration: f64,
}

/// Assembly knobs.
#[derive(Debug, Clone)]
pub struct TimelinePolicy {
    /// Segments never run shorter than this
    pub min_clip_duration: f64,
    /// Fade-in applied to every segment after the first
    pub transition_duration: f64,
    /// Segment-count ceiling from the resource monitor
    pub max_segments: usize,
}

/// Plan the timeline for the given segments.
///
/// Segments beyond `max_segments` are dropped from the tail with a warning,
/// but their narration still counts toward the total duration so audio is
/// never silently cut.
pub fn plan_timeline(
    inputs: &[SegmentPlanInput],
    policy: &TimelinePolicy,
) -> MediaResult<Timeline> {
    if inputs.is_empty() {
        return Err(MediaError::EmptyTimeline);
    }

    let narration_duration: f64 = inputs.iter().filter_map(|i| i.narration_duration).sum();

    let placed_count = inputs.len().min(policy.max_segments.max(1));
    if placed_count < inputs.len() {
        warn!(
            total = inputs.len(),
            placed = placed_count,
            "Segment cap reached, dropping tail segments from the visual timeline"
        );
    }

    let mut segments = Vec::with_capacity(placed_count);
    let mut position = 0.0_f64;

    for (index, input) in inputs.iter().take(placed_count).enumerate() {
        let raw = input
            .narration_duration
            .unwrap_or(input.estimated_duration);
        let duration = raw.max(policy.min_clip_duration);

        segments.push(PlannedSegment {
            index,
            duration,
            start: position,
            fade_in: if index == 0 {
                0.0
            } else {
                policy.transition_duration
            },
        });

        position += duration;
    }

    if segments.is_empty() {
        return Err(MediaError::EmptyTimeline);
    }

    Ok(Timeline {
        segments,
        visual_duration: position,
        narration_duration,
        total_duration: position.max(narration_duration),
    })
}
