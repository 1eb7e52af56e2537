//! Segment compositing.
//!
//! Layers a static text overlay and a caption track onto one normalized
//! clip. Audio never passes through here; the mixer owns the audio graph.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

use vreel_models::CaptionStyle;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Vertical anchor of the caption baseline as a fraction of canvas height.
const CAPTION_BASELINE_FRACTION: f64 = 0.75;
/// Per-segment vertical jitter applied to the caption baseline.
const CAPTION_JITTER_PX: i32 = 20;
/// Overlay text is drawn at this fraction of canvas height.
const OVERLAY_Y_FRACTION: f64 = 0.2;
/// Font size for static overlay text.
pub const OVERLAY_FONT_SIZE: u32 = 70;
/// Estimated glyph width as a fraction of font size, for line wrapping.
const EST_CHAR_WIDTH_FRACTION: f64 = 0.56;
/// Overlay lines wrap at this fraction of canvas width.
const OVERLAY_MAX_WIDTH_FRACTION: f64 = 0.85;

/// Pick the caption baseline for one segment with a small random jitter.
pub fn jittered_caption_baseline(canvas_height: u32) -> u32 {
    let base = (canvas_height as f64 * CAPTION_BASELINE_FRACTION).round() as i64;
    let jitter = rand::rng().random_range(-CAPTION_JITTER_PX..=CAPTION_JITTER_PX) as i64;
    (base + jitter).clamp(0, canvas_height as i64) as u32
}

/// Greedy word wrap for overlay text using an estimated glyph width.
pub fn wrap_overlay_text(text: &str, font_size: u32, canvas_width: u32) -> String {
    let max_px = canvas_width as f64 * OVERLAY_MAX_WIDTH_FRACTION;
    let char_px = font_size as f64 * EST_CHAR_WIDTH_FRACTION;
    let max_chars = ((max_px / char_px) as usize).max(1);

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Build the video filter chain for one segment's overlay and captions.
///
/// Returns `None` when the segment has neither layer and the base clip can
/// be used as-is.
pub fn build_compose_filter(
    overlay_text: Option<&str>,
    caption_file: Option<&Path>,
    style: &CaptionStyle,
    canvas_width: u32,
    canvas_height: u32,
) -> Option<String> {
    let mut filters: Vec<String> = Vec::new();

    if let Some(text) = overlay_text {
        let wrapped = wrap_overlay_text(text, OVERLAY_FONT_SIZE, canvas_width);
        let escaped = escape_drawtext(&wrapped);
        let y = (canvas_height as f64 * OVERLAY_Y_FRACTION).round() as u32;
        filters.push(format!(
            "drawtext=text='{}':font='{}':fontsize={}:fontcolor=white:\
             borderw=4:bordercolor=black:x=(w-text_w)/2:y={}",
            escaped, style.font_family, OVERLAY_FONT_SIZE, y
        ));
    }

    if let Some(path) = caption_file {
        filters.push(format!(
            "ass='{}'",
            escape_single_quotes(&path.to_string_lossy())
        ));
    }

    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

/// Composite overlay and captions onto `base`, writing to `output`.
///
/// Returns the path to use for the segment: `output` when compositing ran,
/// or `base` when there was nothing to draw or drawing failed. Overlay
/// richness degrades; the segment itself never fails here.
pub async fn compose_segment(
    runner: &FfmpegRunner,
    base: &Path,
    overlay_text: Option<&str>,
    caption_file: Option<&Path>,
    style: &CaptionStyle,
    canvas_width: u32,
    canvas_height: u32,
    output: &Path,
) -> MediaResult<PathBuf> {
    let Some(filter) =
        build_compose_filter(overlay_text, caption_file, style, canvas_width, canvas_height)
    else {
        debug!(base = %base.display(), "No overlay layers, using base clip");
        return Ok(base.to_path_buf());
    };

    let cmd = FfmpegCommand::new(output)
        .input(base)
        .video_filter(filter)
        .video_codec("libx264")
        .preset("veryfast")
        .output_args(["-crf", "18", "-pix_fmt", "yuv420p"])
        .no_audio();

    match runner.run(&cmd).await {
        Ok(()) => Ok(output.to_path_buf()),
        Err(err) => {
            warn!(
                base = %base.display(),
                error = %err,
                "Segment compositing failed, keeping base clip"
            );
            Ok(base.to_path_buf())
        }
    }
}

/// Escape text for a quoted drawtext argument.
pub(crate) fn escape_drawtext(text: &str) -> String {
    escape_single_quotes(&text.replace('\\', "\\\\").replace(':', "\\:"))
}

fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "'\\''")
}
