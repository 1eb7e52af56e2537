//! Render quality profiles.
//!
//! A profile is pure derived configuration: the resource monitor picks a tier
//! once per render and everything downstream reads the resolved numbers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default video codec (H.264).
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate.
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

/// Quality tier, selected from current resource headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// Resolved encoder settings for one render.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderQualityProfile {
    /// The tier this profile was derived from.
    pub tier: QualityTier,

    /// Output frame rate.
    pub fps: u32,

    /// Encoder thread count.
    pub threads: u32,

    /// Target video bitrate (e.g. "4000k").
    pub video_bitrate: String,

    /// x264 speed preset.
    pub preset: String,

    /// Video codec; `libx264` unless a hardware codec is configured.
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Audio codec.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl RenderQualityProfile {
    /// Resolve the settings for a tier.
    pub fn for_tier(tier: QualityTier) -> Self {
        let (fps, threads, video_bitrate, preset) = match tier {
            QualityTier::High => (30, 4, "4000k", "medium"),
            QualityTier::Medium => (24, 2, "2500k", "fast"),
            QualityTier::Low => (24, 1, "1500k", "ultrafast"),
        };

        Self {
            tier,
            fps,
            threads,
            video_bitrate: video_bitrate.to_string(),
            preset: preset.to_string(),
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }

    /// Override the video codec (e.g. a hardware encoder from config).
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// The conservative retry profile: lowest tier, universally supported
    /// software codec, fastest preset. Used after a primary encode failure.
    pub fn conservative_fallback() -> Self {
        let mut profile = Self::for_tier(QualityTier::Low);
        profile.video_bitrate = "1000k".to_string();
        profile.codec = DEFAULT_VIDEO_CODEC.to_string();
        profile
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-r".to_string(),
            self.fps.to_string(),
            "-threads".to_string(),
            self.threads.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_settings() {
        let high = RenderQualityProfile::for_tier(QualityTier::High);
        assert_eq!(high.fps, 30);
        assert_eq!(high.threads, 4);
        assert_eq!(high.video_bitrate, "4000k");
        assert_eq!(high.preset, "medium");

        let low = RenderQualityProfile::for_tier(QualityTier::Low);
        assert_eq!(low.fps, 24);
        assert_eq!(low.preset, "ultrafast");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = RenderQualityProfile::for_tier(QualityTier::Medium).to_ffmpeg_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-b:v".to_string()));
        assert!(args.contains(&"2500k".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
    }

    #[test]
    fn test_conservative_fallback_is_software() {
        let profile = RenderQualityProfile::for_tier(QualityTier::High).with_codec("h264_nvenc");
        assert_eq!(profile.codec, "h264_nvenc");

        let fallback = RenderQualityProfile::conservative_fallback();
        assert_eq!(fallback.codec, DEFAULT_VIDEO_CODEC);
        assert_eq!(fallback.tier, QualityTier::Low);
        assert_eq!(fallback.preset, "ultrafast");
    }
}
