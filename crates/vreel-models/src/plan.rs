//! Video plan schema and boundary validation.
//!
//! The planner returns JSON matching [`VideoPlan`]. Segments are a tagged
//! sum type so a hook, a body section, and a call to action each declare
//! exactly the fields they need; anything malformed is rejected here, at the
//! parse boundary, instead of being probed for downstream.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for plan parsing/validation.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors produced when a plan fails boundary validation.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan JSON is not parseable: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("plan has an empty video title")]
    EmptyTitle,

    #[error("plan contains no segments")]
    NoSegments,

    #[error("segment {index} ({kind}) has empty narration text")]
    MissingNarration { index: usize, kind: &'static str },

    #[error("segment {index} has an empty visual search query")]
    MissingVisualQuery { index: usize },

    #[error("segment {index} has a non-positive duration estimate")]
    InvalidEstimate { index: usize },

    #[error("plan contains no narration text in any segment")]
    NoNarration,
}

/// Camera-motion pacing hint attached to a segment by the planner.
///
/// Carried through the schema so plans round-trip losslessly; rendering
/// currently does not consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionHint {
    #[default]
    None,
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
}

impl fmt::Display for MotionHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MotionHint::None => "none",
            MotionHint::ZoomIn => "zoom_in",
            MotionHint::ZoomOut => "zoom_out",
            MotionHint::PanLeft => "pan_left",
            MotionHint::PanRight => "pan_right",
        };
        write!(f, "{}", s)
    }
}

/// One planned scene of the output video.
///
/// `narration_text` may be empty only for a visual-first hook; sections and
/// calls to action always narrate. Every variant must name a visual search
/// query; there is no silent fallback query at this layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSegment {
    /// The opening beat. Narration is optional (visual-first hooks exist),
    /// so a duration estimate is required to pace it.
    Hook {
        /// Very short opening line; empty means visual-only.
        #[serde(default)]
        narration_text: String,
        /// Stock-footage search query for the hook visuals.
        visual_search_query: String,
        /// Words to render in the highlight color when captioned.
        #[serde(default)]
        keywords_for_highlighting: Vec<String>,
        /// Pacing hint from the planner.
        #[serde(default)]
        motion: MotionHint,
        /// Estimated on-screen seconds; authoritative only when narration
        /// is absent.
        #[serde(default = "default_hook_estimate")]
        duration_estimate_seconds: f64,
        /// Optional static text shown for the whole hook.
        #[serde(skip_serializing_if = "Option::is_none")]
        overlay_text: Option<String>,
    },

    /// A body scene: one narrated sentence with matching visuals.
    Section {
        /// Short theme label (2-3 words), used for logging only.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// The voice-over sentence for this scene.
        narration_text: String,
        /// Stock-footage search query matching the narration.
        visual_search_query: String,
        /// Words to render in the highlight color when captioned.
        #[serde(default)]
        keywords_for_highlighting: Vec<String>,
        /// Pacing hint from the planner.
        #[serde(default)]
        motion: MotionHint,
        /// Fallback seconds when narration audio is unavailable.
        #[serde(default = "default_section_estimate")]
        duration_estimate_seconds: f64,
    },

    /// The closing call to action. Narrated, and rendered with the CTA text
    /// as a static overlay.
    CallToAction {
        /// The spoken call to action (max ~10 words).
        narration_text: String,
        /// Background visuals; a neutral query by default.
        #[serde(default = "default_cta_query")]
        visual_search_query: String,
        /// Text shown on screen; defaults to the narration when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        overlay_text: Option<String>,
    },
}

fn default_hook_estimate() -> f64 {
    2.5
}

fn default_section_estimate() -> f64 {
    4.0
}

fn default_cta_query() -> String {
    "abstract background".to_string()
}

impl PlanSegment {
    /// The segment kind as used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanSegment::Hook { .. } => "hook",
            PlanSegment::Section { .. } => "section",
            PlanSegment::CallToAction { .. } => "call_to_action",
        }
    }

    /// Narration text; empty string means no narration for this segment.
    pub fn narration_text(&self) -> &str {
        match self {
            PlanSegment::Hook { narration_text, .. }
            | PlanSegment::Section { narration_text, .. }
            | PlanSegment::CallToAction { narration_text, .. } => narration_text,
        }
    }

    /// Whether this segment has anything to narrate.
    pub fn has_narration(&self) -> bool {
        !self.narration_text().trim().is_empty()
    }

    /// The stock-footage search query.
    pub fn visual_search_query(&self) -> &str {
        match self {
            PlanSegment::Hook {
                visual_search_query,
                ..
            }
            | PlanSegment::Section {
                visual_search_query,
                ..
            }
            | PlanSegment::CallToAction {
                visual_search_query,
                ..
            } => visual_search_query,
        }
    }

    /// Keywords rendered in the caption highlight color.
    pub fn keywords(&self) -> &[String] {
        match self {
            PlanSegment::Hook {
                keywords_for_highlighting,
                ..
            }
            | PlanSegment::Section {
                keywords_for_highlighting,
                ..
            } => keywords_for_highlighting,
            PlanSegment::CallToAction { .. } => &[],
        }
    }

    /// Planner pacing hint.
    pub fn motion(&self) -> MotionHint {
        match self {
            PlanSegment::Hook { motion, .. } | PlanSegment::Section { motion, .. } => *motion,
            PlanSegment::CallToAction { .. } => MotionHint::None,
        }
    }

    /// Fallback duration estimate used when narration audio is unavailable.
    pub fn duration_estimate(&self) -> f64 {
        match self {
            PlanSegment::Hook {
                duration_estimate_seconds,
                ..
            }
            | PlanSegment::Section {
                duration_estimate_seconds,
                ..
            } => *duration_estimate_seconds,
            // A CTA always narrates, so its estimate mirrors a short section.
            PlanSegment::CallToAction { .. } => 3.0,
        }
    }

    /// Static overlay text for this segment, if any. A call to action always
    /// shows its text on screen, falling back to the narration line.
    pub fn overlay_text(&self) -> Option<&str> {
        match self {
            PlanSegment::Hook { overlay_text, .. } => overlay_text.as_deref(),
            PlanSegment::Section { .. } => None,
            PlanSegment::CallToAction {
                overlay_text,
                narration_text,
                ..
            } => Some(overlay_text.as_deref().unwrap_or(narration_text)),
        }
    }
}

/// The planner's structured output: an ordered script with per-scene visual
/// direction. This is the only durable artifact besides the rendered video,
/// persisted as pretty JSON and loadable back for re-rendering.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoPlan {
    /// Display title; also the sanitized stem of the output filename.
    pub video_title: String,

    /// Ordered scenes: ideally one hook, 2-4 sections, one call to action.
    pub segments: Vec<PlanSegment>,

    /// Mood/genre suggestion passed to the music search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music_suggestion: Option<String>,
}

impl VideoPlan {
    /// Parse a plan from JSON and validate it in one step.
    ///
    /// Every load boundary (planner response, persisted plan file) goes
    /// through here so an invalid plan can never enter the pipeline.
    pub fn from_json(json: &str) -> PlanResult<Self> {
        let plan: VideoPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Serialize to pretty JSON for the persisted plan files.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Validate the plan.
    pub fn validate(&self) -> PlanResult<()> {
        if self.video_title.trim().is_empty() {
            return Err(PlanError::EmptyTitle);
        }

        if self.segments.is_empty() {
            return Err(PlanError::NoSegments);
        }

        for (index, segment) in self.segments.iter().enumerate() {
            if segment.visual_search_query().trim().is_empty() {
                return Err(PlanError::MissingVisualQuery { index });
            }

            // Only a hook may stay silent.
            if !segment.has_narration() && !matches!(segment, PlanSegment::Hook { .. }) {
                return Err(PlanError::MissingNarration {
                    index,
                    kind: segment.kind(),
                });
            }

            let estimate = segment.duration_estimate();
            if !estimate.is_finite() || estimate <= 0.0 {
                return Err(PlanError::InvalidEstimate { index });
            }
        }

        if !self.segments.iter().any(|s| s.has_narration()) {
            return Err(PlanError::NoNarration);
        }

        Ok(())
    }

    /// Total narration characters, a rough pacing signal for logs.
    pub fn narration_chars(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.narration_text().trim().len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> VideoPlan {
        VideoPlan {
            video_title: "Why Octopuses Dream".to_string(),
            segments: vec![
                PlanSegment::Hook {
                    narration_text: "This animal dreams in color.".to_string(),
                    visual_search_query: "octopus close up dark water".to_string(),
                    keywords_for_highlighting: vec!["dreams".to_string()],
                    motion: MotionHint::ZoomIn,
                    duration_estimate_seconds: 2.5,
                    overlay_text: None,
                },
                PlanSegment::Section {
                    title: Some("Sleep cycles".to_string()),
                    narration_text: "Scientists recorded their skin changing while asleep."
                        .to_string(),
                    visual_search_query: "octopus changing color skin".to_string(),
                    keywords_for_highlighting: vec!["skin".to_string()],
                    motion: MotionHint::PanLeft,
                    duration_estimate_seconds: 4.0,
                },
                PlanSegment::CallToAction {
                    narration_text: "Follow for more deep sea facts!".to_string(),
                    visual_search_query: "abstract background".to_string(),
                    overlay_text: None,
                },
            ],
            background_music_suggestion: Some("calm ambient underwater".to_string()),
        }
    }

    #[test]
    fn test_valid_plan_roundtrip() {
        let plan = sample_plan();
        assert!(plan.validate().is_ok());

        let json = plan.to_json_pretty().unwrap();
        let loaded = VideoPlan::from_json(&json).unwrap();
        assert_eq!(loaded.video_title, plan.video_title);
        assert_eq!(loaded.segments.len(), 3);
        assert_eq!(loaded.segments[0].kind(), "hook");
        assert_eq!(loaded.segments[2].kind(), "call_to_action");
    }

    #[test]
    fn test_tagged_kind_in_json() {
        let json = sample_plan().to_json_pretty().unwrap();
        assert!(json.contains("\"kind\": \"hook\""));
        assert!(json.contains("\"kind\": \"section\""));
        assert!(json.contains("\"kind\": \"call_to_action\""));
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut plan = sample_plan();
        plan.video_title = "  ".to_string();
        assert!(matches!(plan.validate(), Err(PlanError::EmptyTitle)));
    }

    #[test]
    fn test_no_segments_rejected() {
        let mut plan = sample_plan();
        plan.segments.clear();
        assert!(matches!(plan.validate(), Err(PlanError::NoSegments)));
    }

    #[test]
    fn test_section_without_narration_rejected() {
        let mut plan = sample_plan();
        plan.segments[1] = PlanSegment::Section {
            title: None,
            narration_text: "".to_string(),
            visual_search_query: "city".to_string(),
            keywords_for_highlighting: vec![],
            motion: MotionHint::None,
            duration_estimate_seconds: 4.0,
        };
        assert!(matches!(
            plan.validate(),
            Err(PlanError::MissingNarration { index: 1, .. })
        ));
    }

    #[test]
    fn test_silent_hook_allowed() {
        let mut plan = sample_plan();
        plan.segments[0] = PlanSegment::Hook {
            narration_text: String::new(),
            visual_search_query: "eye opening extreme close up".to_string(),
            keywords_for_highlighting: vec![],
            motion: MotionHint::None,
            duration_estimate_seconds: 2.5,
            overlay_text: Some("Wait for it".to_string()),
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_all_silent_rejected() {
        let plan = VideoPlan {
            video_title: "Silent".to_string(),
            segments: vec![PlanSegment::Hook {
                narration_text: String::new(),
                visual_search_query: "abstract".to_string(),
                keywords_for_highlighting: vec![],
                motion: MotionHint::None,
                duration_estimate_seconds: 2.5,
                overlay_text: None,
            }],
            background_music_suggestion: None,
        };
        assert!(matches!(plan.validate(), Err(PlanError::NoNarration)));
    }

    #[test]
    fn test_missing_required_field_fails_parse() {
        // A section without a visual query must fail at serde level or
        // validation, never reach the pipeline.
        let json = r#"{
            "video_title": "T",
            "segments": [
                {"kind": "section", "narration_text": "hello world"}
            ]
        }"#;
        assert!(VideoPlan::from_json(json).is_err());
    }

    #[test]
    fn test_cta_overlay_defaults_to_narration() {
        let plan = sample_plan();
        assert_eq!(
            plan.segments[2].overlay_text(),
            Some("Follow for more deep sea facts!")
        );
    }

    #[test]
    fn test_invalid_estimate_rejected() {
        let mut plan = sample_plan();
        plan.segments[0] = PlanSegment::Hook {
            narration_text: "hi".to_string(),
            visual_search_query: "q".to_string(),
            keywords_for_highlighting: vec![],
            motion: MotionHint::None,
            duration_estimate_seconds: 0.0,
            overlay_text: None,
        };
        assert!(matches!(
            plan.validate(),
            Err(PlanError::InvalidEstimate { index: 0 })
        ));
    }
}
