//! Shared data models for the Vreel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video plans (the planner's structured output) and their validation
//! - Word-level caption timings
//! - Media assets and narration segments
//! - Render quality profiles
//! - Caption styling

pub mod asset;
pub mod caption_style;
pub mod plan;
pub mod quality;
pub mod timing;
pub mod utils;

// Re-export common types
pub use asset::{MediaAsset, MediaKind, NarrationSegment};
pub use caption_style::CaptionStyle;
pub use plan::{MotionHint, PlanError, PlanResult, PlanSegment, VideoPlan};
pub use quality::{QualityTier, RenderQualityProfile};
pub use timing::{WordTiming, MAX_WORD_TIMING_SECS};
pub use utils::sanitize_filename;
