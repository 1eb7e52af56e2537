//! Final render.
//!
//! Concatenates composited segment clips, attaches the mixed audio track,
//! and encodes at a resource-selected quality tier. Encoding failures walk
//! a fallback ladder: conservative codec first, then a minimal emergency
//! clip, so the caller always gets a playable file.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use vreel_models::RenderQualityProfile;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::normalize::FALLBACK_COLOR;

/// Outputs smaller than this are treated as failed encodes.
pub const MIN_OUTPUT_BYTES: u64 = 1024;
/// Holds below this length are skipped in the concat graph.
const HOLD_EPSILON: f64 = 0.01;
/// Emergency clip length in seconds.
const EMERGENCY_DURATION: f64 = 10.0;
const EMERGENCY_TEXT: &str = "Render Failed";
const EMERGENCY_FONT_SIZE: u32 = 60;

/// Which rung of the fallback ladder produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFallback {
    /// Primary profile succeeded
    None,
    /// Conservative codec retry succeeded
    ConservativeCodec,
    /// Both encodes failed; emergency clip written
    EmergencyClip,
}

/// Result of a final render.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Path of the written file
    pub path: PathBuf,
    /// Fallback rung used
    pub fallback: RenderFallback,
}

/// Everything the final encode needs.
#[derive(Debug)]
pub struct RenderRequest<'a> {
    /// Composited segment clips in timeline order
    pub segments: &'a [PathBuf],
    /// Fade-in length per segment, same order
    pub fades: &'a [f64],
    /// Mixed audio track
    pub audio: &'a Path,
    /// Sum of segment durations
    pub visual_duration: f64,
    /// Final output duration
    pub total_duration: f64,
    /// Canvas width and height
    pub width: u32,
    pub height: u32,
}

/// Build the concat filter graph for the segment clips.
///
/// Each segment after the first fades in from black; when the narration
/// runs past the visuals the last frame holds to cover the gap.
pub fn build_concat_filter(fades: &[f64], visual_duration: f64, total_duration: f64) -> String {
    let mut filters: Vec<String> = Vec::new();
    let mut labels = String::new();

    for (i, fade) in fades.iter().enumerate() {
        if *fade > 0.0 {
            filters.push(format!("[{i}:v]fade=t=in:st=0:d={fade:.3}[v{i}]"));
        } else {
            filters.push(format!("[{i}:v]null[v{i}]"));
        }
        labels.push_str(&format!("[v{i}]"));
    }

    filters.push(format!(
        "{}concat=n={}:v=1:a=0[vcat]",
        labels,
        fades.len()
    ));

    let tail_hold = total_duration - visual_duration;
    if tail_hold > HOLD_EPSILON {
        filters.push(format!(
            "[vcat]tpad=stop_mode=clone:stop_duration={:.3}[vout]",
            tail_hold
        ));
    } else {
        filters.push("[vcat]null[vout]".to_string());
    }

    filters.join(";")
}

/// Encode the final video, walking the fallback ladder on failure.
pub async fn render_final(
    runner: &FfmpegRunner,
    request: &RenderRequest<'_>,
    profile: &RenderQualityProfile,
    output: &Path,
) -> MediaResult<RenderOutcome> {
    if request.segments.is_empty() {
        return Err(MediaError::EmptyTimeline);
    }

    info!(
        segments = request.segments.len(),
        tier = %profile.tier,
        total = format!("{:.2}s", request.total_duration),
        "Rendering final video"
    );

    match encode_once(runner, request, profile, output).await {
        Ok(()) => {
            return Ok(RenderOutcome {
                path: output.to_path_buf(),
                fallback: RenderFallback::None,
            })
        }
        Err(err) => {
            warn!(error = %err, "Primary encode failed, retrying with conservative profile");
        }
    }

    let conservative = RenderQualityProfile::conservative_fallback();
    match encode_once(runner, request, &conservative, output).await {
        Ok(()) => {
            return Ok(RenderOutcome {
                path: output.to_path_buf(),
                fallback: RenderFallback::ConservativeCodec,
            })
        }
        Err(err) => {
            error!(error = %err, "Conservative encode failed, writing emergency clip");
        }
    }

    emergency_clip(runner, request.width, request.height, conservative.fps, output).await?;
    Ok(RenderOutcome {
        path: output.to_path_buf(),
        fallback: RenderFallback::EmergencyClip,
    })
}

async fn encode_once(
    runner: &FfmpegRunner,
    request: &RenderRequest<'_>,
    profile: &RenderQualityProfile,
    output: &Path,
) -> MediaResult<()> {
    let filter = build_concat_filter(
        request.fades,
        request.visual_duration,
        request.total_duration,
    );

    let mut cmd = FfmpegCommand::new(output);
    for segment in request.segments {
        cmd = cmd.input(segment);
    }
    cmd = cmd.input(request.audio);

    let audio_input = request.segments.len();
    let cmd = cmd
        .filter_complex(filter)
        .map("[vout]")
        .map(format!("{}:a", audio_input))
        .output_args(profile.to_ffmpeg_args())
        .duration(request.total_duration);

    let total_ms = (request.total_duration * 1000.0) as i64;
    runner
        .run_with_progress(&cmd, move |progress| {
            debug!(
                percent = format!("{:.1}", progress.percentage(total_ms)),
                speed = format!("{:.2}x", progress.speed),
                "Encode progress"
            );
        })
        .await?;

    verify_output(output).await
}

/// Reject outputs too small to be a real video file.
pub async fn verify_output(path: &Path) -> MediaResult<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;

    if metadata.len() < MIN_OUTPUT_BYTES {
        return Err(MediaError::OutputVerification(format!(
            "{} is only {} bytes",
            path.display(),
            metadata.len()
        )));
    }
    Ok(())
}

/// Write a minimal flat-color clip with an error caption.
pub async fn emergency_clip(
    runner: &FfmpegRunner,
    width: u32,
    height: u32,
    fps: u32,
    output: &Path,
) -> MediaResult<PathBuf> {
    let background = format!(
        "color=c=0x{:06X}:s={}x{}:r={}:d={:.1}",
        FALLBACK_COLOR, width, height, fps, EMERGENCY_DURATION
    );

    let cmd = FfmpegCommand::new(output)
        .lavfi_input(background)
        .lavfi_input("anullsrc=r=48000:cl=stereo")
        .video_filter(format!(
            "drawtext=text='{}':fontsize={}:fontcolor=white:x=(w-text_w)/2:y=(h-text_h)/2",
            EMERGENCY_TEXT, EMERGENCY_FONT_SIZE
        ))
        .video_codec("libx264")
        .preset("ultrafast")
        .output_args(["-pix_fmt", "yuv420p"])
        .audio_codec("aac")
        .shortest();

    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_filter_fades_all_but_first() {
        let filter = build_concat_filter(&[0.0, 0.3, 0.3], 9.5, 9.5);

        assert!(filter.contains("[0:v]null[v0]"));
        assert!(filter.contains("[1:v]fade=t=in:st=0:d=0.300[v1]"));
        assert!(filter.contains("[2:v]fade=t=in:st=0:d=0.300[v2]"));
        assert!(filter.contains("[v0][v1][v2]concat=n=3:v=1:a=0[vcat]"));
        assert!(!filter.contains("tpad"));
    }

    #[test]
    fn test_concat_filter_holds_tail_for_long_narration() {
        let filter = build_concat_filter(&[0.0, 0.3], 20.0, 25.0);
        assert!(filter.contains("tpad=stop_mode=clone:stop_duration=5.000"));
        assert!(filter.ends_with("[vout]"));
    }

    #[test]
    fn test_single_segment_graph() {
        let filter = build_concat_filter(&[0.0], 4.0, 4.0);
        assert!(filter.contains("concat=n=1:v=1:a=0"));
    }

    #[tokio::test]
    async fn test_verify_rejects_tiny_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, b"stub").await.unwrap();

        let err = verify_output(&path).await.unwrap_err();
        assert!(matches!(err, MediaError::OutputVerification(_)));
    }

    #[tokio::test]
    async fn test_verify_accepts_real_sized_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, vec![0u8; 4096]).await.unwrap();

        assert!(verify_output(&path).await.is_ok());
    }
}
