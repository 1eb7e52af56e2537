//! Audio mixing.
//!
//! Narration clips land on the master track at their timeline offsets;
//! background music is loudness-normalized, ducked, and looped or trimmed
//! to the exact track length. Missing music never blocks the mix.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Loudness normalization targets for music (EBU R128).
const MUSIC_LOUDNORM: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// One narration clip with its placement on the timeline.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    /// Audio file path
    pub path: PathBuf,
    /// Start offset on the master timeline in seconds
    pub offset: f64,
}

/// Mixing parameters.
#[derive(Debug, Clone)]
pub struct MixPolicy {
    /// Music amplitude after ducking, 0.0 to 1.0
    pub duck_volume: f64,
    /// Exact duration of the mixed output in seconds
    pub total_duration: f64,
    /// Output audio codec
    pub audio_codec: String,
    /// Output audio bitrate
    pub audio_bitrate: String,
}

/// Build the filter graph mixing narration offsets with optional music.
///
/// Narration files occupy input indexes `0..offsets.len()`; when present,
/// music is the next input and is expected to arrive looped (the runner
/// adds `-stream_loop -1`), so trimming to the total duration covers both
/// the too-short and too-long cases.
pub fn build_mix_filter(narration_offsets: &[f64], has_music: bool, policy: &MixPolicy) -> String {
    let mut filters: Vec<String> = Vec::new();
    let mut mix_labels: Vec<String> = Vec::new();

    for (i, offset) in narration_offsets.iter().enumerate() {
        let delay_ms = (offset.max(0.0) * 1000.0).round() as u64;
        filters.push(format!(
            "[{i}:a]aresample=async=1:first_pts=0,adelay={delay_ms}|{delay_ms}[n{i}]"
        ));
        mix_labels.push(format!("[n{i}]"));
    }

    if has_music {
        let music_idx = narration_offsets.len();
        filters.push(format!(
            "[{idx}:a]{loudnorm},volume={duck:.3},atrim=duration={total:.3},asetpts=PTS-STARTPTS[music]",
            idx = music_idx,
            loudnorm = MUSIC_LOUDNORM,
            duck = policy.duck_volume,
            total = policy.total_duration,
        ));
        mix_labels.push("[music]".to_string());
    }

    match mix_labels.len() {
        0 => {
            // Nothing usable at all; emit silence of the right length.
            filters.push(format!(
                "anullsrc=r=48000:cl=stereo,atrim=duration={:.3}[mix]",
                policy.total_duration
            ));
        }
        1 => {
            let only = mix_labels.remove(0);
            filters.push(format!("{only}anull[mix]"));
        }
        n => {
            filters.push(format!(
                "{}amix=inputs={}:duration=longest:normalize=0:dropout_transition=0[mix]",
                mix_labels.join(""),
                n
            ));
        }
    }

    // Pad then trim so the output is exactly the requested length.
    filters.push(format!(
        "[mix]apad=whole_dur={total:.3},atrim=duration={total:.3}[outa]",
        total = policy.total_duration,
    ));

    filters.join(";")
}

/// Mix narration tracks and optional music into one audio file.
///
/// A music-side failure retries the mix without music before giving up.
pub async fn mix_audio(
    runner: &FfmpegRunner,
    narration: &[AudioTrack],
    music: Option<&Path>,
    policy: &MixPolicy,
    output: &Path,
) -> MediaResult<PathBuf> {
    match run_mix(runner, narration, music, policy, output).await {
        Ok(path) => Ok(path),
        Err(err) if music.is_some() => {
            warn!(
                error = %err,
                "Mix with music failed, retrying narration-only"
            );
            run_mix(runner, narration, None, policy, output).await
        }
        Err(err) => Err(err),
    }
}

async fn run_mix(
    runner: &FfmpegRunner,
    narration: &[AudioTrack],
    music: Option<&Path>,
    policy: &MixPolicy,
    output: &Path,
) -> MediaResult<PathBuf> {
    let offsets: Vec<f64> = narration.iter().map(|t| t.offset).collect();
    let filter = build_mix_filter(&offsets, music.is_some(), policy);
    debug!(
        narration_tracks = narration.len(),
        has_music = music.is_some(),
        total = format!("{:.3}", policy.total_duration),
        "Mixing audio"
    );

    let mut cmd = FfmpegCommand::new(output);
    for track in narration {
        cmd = cmd.input(&track.path);
    }
    if let Some(music_path) = music {
        cmd = cmd.loop_input().input(music_path);
    }

    let cmd = cmd
        .filter_complex(filter)
        .map("[outa]")
        .no_video()
        .audio_codec(&policy.audio_codec)
        .audio_bitrate(&policy.audio_bitrate);

    runner.run(&cmd).await?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(total: f64) -> MixPolicy {
        MixPolicy {
            duck_volume: 0.07,
            total_duration: total,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }

    #[test]
    fn test_narration_offsets_become_delays() {
        let filter = build_mix_filter(&[0.0, 3.0, 7.5], false, &policy(9.5));

        assert!(filter.contains("[0:a]"));
        assert!(filter.contains("adelay=0|0"));
        assert!(filter.contains("adelay=3000|3000"));
        assert!(filter.contains("adelay=7500|7500"));
        assert!(filter.contains(
            "amix=inputs=3:duration=longest:normalize=0:dropout_transition=0"
        ));
    }

    #[test]
    fn test_music_is_normalized_ducked_and_trimmed() {
        let filter = build_mix_filter(&[0.0], true, &policy(30.0));

        // Music is the input after the single narration track.
        assert!(filter.contains("[1:a]loudnorm=I=-16:TP=-1.5:LRA=11"));
        assert!(filter.contains("volume=0.070"));
        assert!(filter.contains("atrim=duration=30.000"));
        assert!(filter.contains("amix=inputs=2"));
    }

    #[test]
    fn test_single_track_skips_amix() {
        let filter = build_mix_filter(&[0.0], false, &policy(10.0));
        assert!(!filter.contains("amix"));
        assert!(filter.contains("[n0]anull[mix]"));
    }

    #[test]
    fn test_no_tracks_yields_silence() {
        let filter = build_mix_filter(&[], false, &policy(12.0));
        assert!(filter.contains("anullsrc"));
        assert!(filter.contains("atrim=duration=12.000"));
    }

    #[test]
    fn test_output_is_padded_to_exact_length() {
        let filter = build_mix_filter(&[0.0], false, &policy(25.0));
        assert!(filter.contains("apad=whole_dur=25.000"));
        assert!(filter.ends_with("[outa]"));
    }
}
