//! Pipeline configuration.
//!
//! All knobs come from the environment with sensible defaults; `.env` is
//! loaded by the binary before this runs. Invalid values fall back to the
//! default with a logged warning. Missing API keys disable optional
//! providers (stock, music) or fail construction for required ones
//! (planner/ASR, the selected TTS provider).

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use vreel_media::{NormalizeSpec, ResourceLimits, TimelinePolicy};
use vreel_models::CaptionStyle;
use vreel_providers::TtsProvider;

use crate::error::{WorkerError, WorkerResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving finished videos
    pub output_dir: PathBuf,
    /// Directory receiving persisted plan JSON
    pub plans_dir: PathBuf,
    /// Root under which each run scopes its temp directory
    pub temp_root: PathBuf,

    /// Canvas width in pixels (even)
    pub canvas_width: u32,
    /// Canvas height in pixels (even)
    pub canvas_height: u32,
    /// Output frame rate
    pub fps: u32,

    /// Segments never run shorter than this
    pub min_clip_duration: f64,
    /// Longest window decoded from any one stock video
    pub max_source_duration: f64,
    /// Fade-in length between segments
    pub transition_duration: f64,
    /// Music amplitude after ducking
    pub music_volume: f64,
    /// Aspect ratios within this difference scale without cropping
    pub aspect_tolerance: f64,

    /// TTS provider, locked for the whole run
    pub tts_provider: TtsProvider,
    /// Voice id for the selected provider
    pub tts_voice: String,

    /// Model used for the creator planning pass
    pub creator_model: String,
    /// Model used for the critic refinement pass
    pub critic_model: String,

    /// OpenAI-compatible API key (planner, ASR, OpenAI TTS)
    pub openai_api_key: String,
    /// Speechify API key; required only when that provider is selected
    pub speechify_api_key: Option<String>,
    /// Pexels API key; missing disables stock footage
    pub pexels_api_key: Option<String>,
    /// Pixabay API key; missing disables background music
    pub pixabay_api_key: Option<String>,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
    /// Per-invocation FFmpeg timeout in seconds
    pub ffmpeg_timeout_secs: u64,

    /// Hardware encoder override (e.g. `h264_nvenc`)
    pub video_codec_override: Option<String>,

    /// Caption styling
    pub caption_style: CaptionStyle,

    /// Optional persona JSON folded into the planner prompt
    pub persona_file: Option<PathBuf>,

    /// Fraction of total memory treated as the safe ceiling
    pub memory_safe_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_videos"),
            plans_dir: PathBuf::from("video_plans"),
            temp_root: PathBuf::from("temp_video_assets"),
            canvas_width: 1080,
            canvas_height: 1920,
            fps: 30,
            min_clip_duration: 2.0,
            max_source_duration: 12.0,
            transition_duration: 0.3,
            music_volume: 0.07,
            aspect_tolerance: 0.05,
            tts_provider: TtsProvider::OpenAi,
            tts_voice: TtsProvider::OpenAi.default_voice().to_string(),
            creator_model: "gpt-4o".to_string(),
            critic_model: "gpt-4o".to_string(),
            openai_api_key: String::new(),
            speechify_api_key: None,
            pexels_api_key: None,
            pixabay_api_key: None,
            request_timeout_secs: 45,
            ffmpeg_timeout_secs: 600,
            video_codec_override: None,
            caption_style: CaptionStyle::default(),
            persona_file: None,
            memory_safe_fraction: 0.75,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let tts_provider = match env_string("TTS_PROVIDER") {
            Some(raw) => TtsProvider::from_str(&raw).map_err(WorkerError::from)?,
            None => defaults.tts_provider,
        };
        let tts_voice =
            env_string("TTS_VOICE").unwrap_or_else(|| tts_provider.default_voice().to_string());

        let openai_api_key = env_string("OPENAI_API_KEY").ok_or_else(|| {
            WorkerError::config_error("OPENAI_API_KEY is required (planner, ASR, TTS)")
        })?;

        let speechify_api_key = env_string("SPEECHIFY_API_KEY");
        if tts_provider == TtsProvider::Speechify && speechify_api_key.is_none() {
            return Err(WorkerError::config_error(
                "SPEECHIFY_API_KEY is required when TTS_PROVIDER=speechify",
            ));
        }

        let pexels_api_key = env_string("PEXELS_API_KEY");
        if pexels_api_key.is_none() {
            warn!("PEXELS_API_KEY not set, all visuals will use fallback clips");
        }
        let pixabay_api_key = env_string("PIXABAY_API_KEY");
        if pixabay_api_key.is_none() {
            warn!("PIXABAY_API_KEY not set, videos will render without music");
        }

        let mut caption_style = defaults.caption_style.clone();
        if let Some(font) = env_string("CAPTION_FONT") {
            caption_style.font_family = font;
        }
        caption_style.font_size = parse_or(
            env_string("CAPTION_FONT_SIZE"),
            "CAPTION_FONT_SIZE",
            caption_style.font_size,
        );
        if let Some(color) = env_string("CAPTION_HIGHLIGHT_COLOR") {
            caption_style.highlight_color = color;
        }

        let config = Self {
            output_dir: env_path("OUTPUT_DIR", defaults.output_dir),
            plans_dir: env_path("PLANS_DIR", defaults.plans_dir),
            temp_root: env_path("TEMP_DIR", defaults.temp_root),
            canvas_width: even_dimension(parse_or(
                env_string("VIDEO_WIDTH"),
                "VIDEO_WIDTH",
                defaults.canvas_width,
            )),
            canvas_height: even_dimension(parse_or(
                env_string("VIDEO_HEIGHT"),
                "VIDEO_HEIGHT",
                defaults.canvas_height,
            )),
            fps: parse_or(env_string("TARGET_FPS"), "TARGET_FPS", defaults.fps).max(1),
            min_clip_duration: parse_or(
                env_string("MIN_CLIP_DURATION"),
                "MIN_CLIP_DURATION",
                defaults.min_clip_duration,
            ),
            max_source_duration: parse_or(
                env_string("MAX_STOCK_VIDEO_DURATION"),
                "MAX_STOCK_VIDEO_DURATION",
                defaults.max_source_duration,
            ),
            transition_duration: parse_or(
                env_string("TRANSITION_DURATION"),
                "TRANSITION_DURATION",
                defaults.transition_duration,
            ),
            music_volume: parse_or(
                env_string("MUSIC_VOLUME"),
                "MUSIC_VOLUME",
                defaults.music_volume,
            )
            .clamp(0.0, 1.0),
            aspect_tolerance: parse_or(
                env_string("ASPECT_TOLERANCE"),
                "ASPECT_TOLERANCE",
                defaults.aspect_tolerance,
            ),
            tts_provider,
            tts_voice,
            creator_model: env_string("PLANNER_CREATOR_MODEL")
                .unwrap_or_else(|| defaults.creator_model.clone()),
            critic_model: env_string("PLANNER_CRITIC_MODEL")
                .unwrap_or_else(|| defaults.critic_model.clone()),
            openai_api_key,
            speechify_api_key,
            pexels_api_key,
            pixabay_api_key,
            request_timeout_secs: parse_or(
                env_string("REQUEST_TIMEOUT"),
                "REQUEST_TIMEOUT",
                defaults.request_timeout_secs,
            ),
            ffmpeg_timeout_secs: parse_or(
                env_string("FFMPEG_TIMEOUT"),
                "FFMPEG_TIMEOUT",
                defaults.ffmpeg_timeout_secs,
            ),
            video_codec_override: env_string("VIDEO_CODEC"),
            caption_style,
            persona_file: env_string("PERSONA_FILE").map(PathBuf::from),
            memory_safe_fraction: parse_or(
                env_string("MEMORY_SAFE_FRACTION"),
                "MEMORY_SAFE_FRACTION",
                defaults.memory_safe_fraction,
            )
            .clamp(0.1, 1.0),
        };

        Ok(config)
    }

    /// The normalizer spec derived from this config.
    pub fn normalize_spec(&self) -> NormalizeSpec {
        NormalizeSpec {
            width: self.canvas_width,
            height: self.canvas_height,
            fps: self.fps,
            max_source_duration: self.max_source_duration,
            aspect_tolerance: self.aspect_tolerance,
        }
    }

    /// The timeline policy for a run, given the monitor's segment cap.
    pub fn timeline_policy(&self, max_segments: usize) -> TimelinePolicy {
        TimelinePolicy {
            min_clip_duration: self.min_clip_duration,
            transition_duration: self.transition_duration,
            max_segments,
        }
    }

    /// Resource thresholds with the configured ceiling fraction applied.
    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            safe_ceiling_fraction: self.memory_safe_fraction,
            ..ResourceLimits::default()
        }
    }
}

/// Read an env var, treating empty/whitespace values as unset.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    env_string(key).map(PathBuf::from).unwrap_or(default)
}

/// Parse a raw env value, falling back to the default on garbage.
fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %value, "Invalid value, using default");
                default
            }
        },
        None => default,
    }
}

/// Encoders require even dimensions for yuv420p output.
fn even_dimension(value: u32) -> u32 {
    (value & !1).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_accepts_valid() {
        assert_eq!(parse_or(Some("7".to_string()), "K", 5u32), 7);
        assert_eq!(parse_or(Some("2.5".to_string()), "K", 1.0f64), 2.5);
    }

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        assert_eq!(parse_or(Some("abc".to_string()), "K", 5u32), 5);
        assert_eq!(parse_or::<u32>(None, "K", 5), 5);
    }

    #[test]
    fn test_even_dimension() {
        assert_eq!(even_dimension(1080), 1080);
        assert_eq!(even_dimension(1081), 1080);
        assert_eq!(even_dimension(1), 2);
    }

    #[test]
    fn test_defaults_are_product_shape() {
        let config = PipelineConfig::default();
        assert_eq!(config.canvas_width, 1080);
        assert_eq!(config.canvas_height, 1920);
        assert_eq!(config.fps, 30);
        assert!((config.music_volume - 0.07).abs() < 1e-9);
        assert_eq!(config.tts_provider, TtsProvider::OpenAi);
    }

    #[test]
    fn test_derived_normalize_spec() {
        let config = PipelineConfig::default();
        let spec = config.normalize_spec();
        assert_eq!(spec.width, 1080);
        assert_eq!(spec.height, 1920);
        assert!((spec.max_source_duration - 12.0).abs() < 1e-9);
    }
}
