//! Asset normalization.
//!
//! Every sourced visual (stock video, still image, fallback) is converted to
//! a clip of the exact target duration, canvas, and frame rate before it
//! enters the timeline. The trim/crop math lives in a pure planning step so
//! it can be tested without running FFmpeg.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use vreel_models::{MediaAsset, MediaKind};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Fill color for fallback clips (dark blue, RGB 40,40,80).
pub const FALLBACK_COLOR: u32 = 0x282850;

/// Font size for the fallback failure message.
const FALLBACK_FONT_SIZE: u32 = 60;

/// Hold extensions shorter than this are skipped.
const HOLD_EPSILON: f64 = 0.01;

/// Target geometry and limits for normalization.
#[derive(Debug, Clone)]
pub struct NormalizeSpec {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: u32,
    /// Longest source window decoded from any one video
    pub max_source_duration: f64,
    /// Aspect ratios within this absolute difference scale without cropping
    pub aspect_tolerance: f64,
}

impl NormalizeSpec {
    /// Canvas aspect ratio (width / height).
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Which axis gets center-cropped after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropAxis {
    /// Aspect within tolerance; plain resize, no crop.
    None,
    /// Source relatively wider; scale to height, crop width.
    Width,
    /// Source relatively taller; scale to width, crop height.
    Height,
}

/// Deterministic plan for normalizing one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationPlan {
    /// Source kind the plan was built for
    pub kind: MediaKind,
    /// Centered trim window start in the source (videos only)
    pub trim_start: f64,
    /// Length of the decoded source window
    pub usable: f64,
    /// Last-frame hold appended to reach the target
    pub hold: f64,
    /// Final clip duration
    pub target_duration: f64,
    /// Crop branch chosen from the aspect comparison
    pub crop: CropAxis,
}

/// Compute the trim window, hold, and crop branch for one asset.
///
/// Videos decode a centered window of `min(native, target, max_source)`
/// seconds and hold the last frame for the remainder; playback speed is
/// never altered. Stills hold for the whole target duration.
pub fn plan_normalization(
    asset: &MediaAsset,
    target_duration: f64,
    spec: &NormalizeSpec,
) -> NormalizationPlan {
    let crop = pick_crop_axis(asset.aspect(), spec.aspect(), spec.aspect_tolerance);

    match asset.kind {
        MediaKind::Image => NormalizationPlan {
            kind: MediaKind::Image,
            trim_start: 0.0,
            usable: target_duration,
            hold: 0.0,
            target_duration,
            crop,
        },
        MediaKind::Video => {
            let usable = asset
                .duration
                .min(target_duration)
                .min(spec.max_source_duration)
                .max(0.0);
            let trim_start = ((asset.duration - usable) / 2.0).max(0.0);
            let hold = (target_duration - usable).max(0.0);
            NormalizationPlan {
                kind: MediaKind::Video,
                trim_start,
                usable,
                hold,
                target_duration,
                crop,
            }
        }
    }
}

fn pick_crop_axis(source_aspect: f64, target_aspect: f64, tolerance: f64) -> CropAxis {
    if (source_aspect - target_aspect).abs() <= tolerance {
        CropAxis::None
    } else if source_aspect > target_aspect {
        CropAxis::Width
    } else {
        CropAxis::Height
    }
}

impl NormalizationPlan {
    /// Build the video filter chain realizing this plan.
    pub fn video_filter(&self, spec: &NormalizeSpec) -> String {
        let mut chain = match self.crop {
            CropAxis::None => format!("scale={}:{}", spec.width, spec.height),
            CropAxis::Width => format!(
                "scale=-2:{},crop={}:{}",
                spec.height, spec.width, spec.height
            ),
            CropAxis::Height => {
                format!("scale={}:-2,crop={}:{}", spec.width, spec.width, spec.height)
            }
        };

        chain.push_str(&format!(",fps={},setsar=1", spec.fps));

        if self.kind == MediaKind::Video && self.hold > HOLD_EPSILON {
            chain.push_str(&format!(
                ",tpad=stop_mode=clone:stop_duration={:.3}",
                self.hold
            ));
        }

        chain
    }
}

/// Normalize one asset into a silent clip at `output`.
///
/// The narration track is assembled separately; inherent source audio is
/// recovered with [`extract_audio_window`] when a segment needs it.
pub async fn normalize_asset(
    runner: &FfmpegRunner,
    asset: &MediaAsset,
    target_duration: f64,
    spec: &NormalizeSpec,
    output: &Path,
) -> MediaResult<NormalizationPlan> {
    if !asset.path.exists() {
        return Err(MediaError::FileNotFound(asset.path.clone()));
    }

    let plan = plan_normalization(asset, target_duration, spec);
    debug!(
        asset = %asset.path.display(),
        kind = ?plan.kind,
        trim_start = format!("{:.3}", plan.trim_start),
        usable = format!("{:.3}", plan.usable),
        hold = format!("{:.3}", plan.hold),
        crop = ?plan.crop,
        "Normalizing asset"
    );

    let cmd = match plan.kind {
        MediaKind::Image => FfmpegCommand::new(output)
            .input_args(["-loop", "1"])
            .input(&asset.path)
            .duration(plan.target_duration),
        MediaKind::Video => FfmpegCommand::new(output)
            .seek(plan.trim_start)
            .input_duration(plan.usable)
            .input(&asset.path),
    };

    let cmd = cmd
        .video_filter(plan.video_filter(spec))
        .video_codec("libx264")
        .preset("veryfast")
        .output_args(["-crf", "18", "-pix_fmt", "yuv420p"])
        .no_audio();

    runner.run(&cmd).await?;
    Ok(plan)
}

/// Normalize an asset, substituting a flat-color clip when anything fails.
///
/// A single corrupt download must never fail the whole render. Returns the
/// plan that was executed, or `None` when the fallback clip was substituted
/// (fallbacks have no source window, so no audio can be recovered from them).
pub async fn normalize_or_fallback(
    runner: &FfmpegRunner,
    asset: &MediaAsset,
    target_duration: f64,
    spec: &NormalizeSpec,
    output: &Path,
) -> MediaResult<Option<NormalizationPlan>> {
    match normalize_asset(runner, asset, target_duration, spec, output).await {
        Ok(plan) => Ok(Some(plan)),
        Err(err) => {
            warn!(
                asset = %asset.path.display(),
                error = %err,
                "Asset normalization failed, substituting fallback clip"
            );
            let name = asset
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "asset".to_string());
            fallback_clip(runner, target_duration, spec, &format!("Failed: {name}"), output)
                .await?;
            Ok(None)
        }
    }
}

/// Produce a flat-color clip of the exact duration and canvas, with the
/// failure message drawn centered.
pub async fn fallback_clip(
    runner: &FfmpegRunner,
    duration: f64,
    spec: &NormalizeSpec,
    message: &str,
    output: &Path,
) -> MediaResult<()> {
    let source = format!(
        "color=c=0x{:06X}:s={}x{}:r={}:d={:.3}",
        FALLBACK_COLOR, spec.width, spec.height, spec.fps, duration
    );

    let cmd = FfmpegCommand::new(output)
        .lavfi_input(source)
        .video_filter(format!(
            "drawtext=text='{}':fontsize={}:fontcolor=white:x=(w-text_w)/2:y=(h-text_h)/2",
            crate::compose::escape_drawtext(message),
            FALLBACK_FONT_SIZE,
        ))
        .video_codec("libx264")
        .preset("ultrafast")
        .output_args(["-pix_fmt", "yuv420p"])
        .no_audio();

    runner.run(&cmd).await
}

/// Extract the same centered audio window a plan decodes, as WAV.
///
/// Used for segments that keep the source clip's own audio.
pub async fn extract_audio_window(
    runner: &FfmpegRunner,
    asset: &MediaAsset,
    plan: &NormalizationPlan,
    output: &Path,
) -> MediaResult<PathBuf> {
    if !asset.has_audio {
        return Err(MediaError::invalid_media(format!(
            "no audio stream in {}",
            asset.path.display()
        )));
    }

    let cmd = FfmpegCommand::new(output)
        .seek(plan.trim_start)
        .input_duration(plan.usable)
        .input(&asset.path)
        .no_video()
        .audio_codec("pcm_s16le");

    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}
