//! FFprobe media information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use vreel_models::{MediaAsset, MediaKind};

use crate::error::{MediaError, MediaResult};

/// Extensions treated as still images when building assets.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

/// Raw probe result for a media file.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    /// Duration in seconds (0.0 for stills)
    pub duration: f64,
    /// Width in pixels (0 for audio-only files)
    pub width: u32,
    /// Height in pixels (0 for audio-only files)
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Whether the file carries a video stream
    pub has_video: bool,
    /// Whether the file carries an audio stream
    pub has_audio: bool,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe any media file for stream and format information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaProbe> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    // Check FFprobe exists
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("FFprobe failed for {}", path.display()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .and_then(|s| s.avg_frame_rate.as_ref().or(s.r_frame_rate.as_ref()))
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    Ok(MediaProbe {
        duration,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        fps,
        has_video: video_stream.is_some(),
        has_audio,
        size,
    })
}

/// Probe a visual file and build a [`MediaAsset`] from it.
///
/// Still images are recognized by extension and get a zero duration;
/// everything else must carry a video stream.
pub async fn probe_asset(path: impl AsRef<Path>) -> MediaResult<MediaAsset> {
    let path = path.as_ref();
    let probe = probe_media(path).await?;

    let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if !probe.has_video {
        return Err(MediaError::invalid_media(format!(
            "no video stream in {}",
            path.display()
        )));
    }

    if probe.width == 0 || probe.height == 0 {
        return Err(MediaError::invalid_media(format!(
            "zero-sized frame in {}",
            path.display()
        )));
    }

    Ok(MediaAsset {
        path: path.to_path_buf(),
        duration: if is_image { 0.0 } else { probe.duration },
        width: probe.width,
        height: probe.height,
        kind: if is_image {
            MediaKind::Image
        } else {
            MediaKind::Video
        },
        has_audio: probe.has_audio,
    })
}

/// Measure the duration of an audio file in seconds.
pub async fn probe_audio_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let probe = probe_media(path).await?;

    if !probe.has_audio {
        return Err(MediaError::invalid_media(format!(
            "no audio stream in {}",
            path.display()
        )));
    }
    if probe.duration <= 0.0 {
        return Err(MediaError::invalid_media(format!(
            "zero-length audio in {}",
            path.display()
        )));
    }

    Ok(probe.duration)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_media("/nonexistent/clip.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
