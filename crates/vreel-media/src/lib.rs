#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for rendering vertical videos.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multi-input support
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeout support via tokio
//! - Asset normalization to the vertical canvas with flat-color fallback
//! - Karaoke caption rendering to ASS documents
//! - Segment compositing, timeline assembly, audio mixing, and the final
//!   tiered encode with its fallback ladder
//! - System resource sampling for adaptive quality and concurrency

pub mod captions;
pub mod command;
pub mod compose;
pub mod error;
pub mod fs_utils;
pub mod mixer;
pub mod normalize;
pub mod probe;
pub mod progress;
pub mod render;
pub mod resources;
pub mod timeline;

pub use captions::{build_cues, hex_to_ass_color, render_ass_document, write_ass_file, CaptionCue};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{
    build_compose_filter, compose_segment, jittered_caption_baseline, wrap_overlay_text,
};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use mixer::{build_mix_filter, mix_audio, AudioTrack, MixPolicy};
pub use normalize::{
    extract_audio_window, fallback_clip, normalize_asset, normalize_or_fallback,
    plan_normalization, CropAxis, NormalizationPlan, NormalizeSpec, FALLBACK_COLOR,
};
pub use probe::{probe_asset, probe_audio_duration, probe_media, MediaProbe};
pub use progress::FfmpegProgress;
pub use render::{
    build_concat_filter, emergency_clip, render_final, verify_output, RenderFallback,
    RenderOutcome, RenderRequest, MIN_OUTPUT_BYTES,
};
pub use resources::{ResourceLimits, ResourceMonitor, ResourceSnapshot};
pub use timeline::{plan_timeline, PlannedSegment, SegmentPlanInput, Timeline, TimelinePolicy};
