//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Number of trailing stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// One `-i` input with the arguments that precede it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    /// Arguments placed before this input's -i
    args: Vec<String>,
    /// The -i argument itself (path or lavfi spec)
    source: String,
}

/// Builder for FFmpeg commands.
///
/// Supports any number of inputs; per-input arguments queued via
/// [`input_arg`](Self::input_arg) apply to the next call of
/// [`input`](Self::input) or [`lavfi_input`](Self::lavfi_input).
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in -i order
    inputs: Vec<FfmpegInput>,
    /// Arguments queued for the next input
    pending_input_args: Vec<String>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            pending_input_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a file input, consuming any queued per-input arguments.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        let args = std::mem::take(&mut self.pending_input_args);
        self.inputs.push(FfmpegInput {
            args,
            source: path.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Add a lavfi source input (e.g. `color=c=0x282850:s=1080x1920`).
    pub fn lavfi_input(mut self, spec: impl Into<String>) -> Self {
        let mut args = std::mem::take(&mut self.pending_input_args);
        args.push("-f".to_string());
        args.push("lavfi".to_string());
        self.inputs.push(FfmpegInput {
            args,
            source: spec.into(),
        });
        self
    }

    /// Queue an argument for the next input (before its -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.pending_input_args.push(arg.into());
        self
    }

    /// Queue multiple arguments for the next input.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending_input_args
            .extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek position for the next input.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Read duration limit for the next input.
    pub fn input_duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Loop the next input indefinitely (-stream_loop -1).
    pub fn loop_input(self) -> Self {
        self.input_arg("-stream_loop").input_arg("-1")
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set output frame rate.
    pub fn fps(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Drop video streams from the output.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Drop audio streams from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Stop encoding when the shortest stream ends.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Log level
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        // Inputs in order, each preceded by its own args
        for input in &self.inputs {
            args.extend(input.args.clone());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        // Output args
        args.extend(self.output_args.clone());

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        // Check FFmpeg exists
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Parse progress lines; keep a tail of everything else for error reports.
        let progress_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                match parse_progress_line(&line, &mut current_progress) {
                    Some(progress) => progress_callback(progress),
                    None if !line.contains('=') => {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    None => {}
                }
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        // Wait for completion with optional timeout and cancellation
        let result = self.wait_for_completion(&mut child).await;

        let stderr_tail = progress_handle.await.unwrap_or_default();

        match result {
            Err(MediaError::FfmpegFailed {
                message,
                exit_code,
                ..
            }) => Err(MediaError::FfmpegFailed {
                message,
                stderr: (!stderr_tail.is_empty()).then_some(stderr_tail),
                exit_code,
            }),
            other => other,
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let mut cancel_rx = self.cancel_rx.clone();

        let status = loop {
            let cancelled = async {
                match cancel_rx.as_mut() {
                    Some(rx) => {
                        // Already-set flag cancels immediately; otherwise wait
                        // for the next change.
                        if *rx.borrow() {
                            return true;
                        }
                        rx.changed().await.is_ok() && *rx.borrow()
                    }
                    None => std::future::pending().await,
                }
            };

            let timeout = async {
                match self.timeout_secs {
                    Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                status = child.wait() => break status?,
                cancelled = cancelled => {
                    if cancelled {
                        info!("FFmpeg cancelled, killing process");
                        let _ = child.kill().await;
                        return Err(MediaError::Cancelled);
                    }
                    // Watch sender dropped without cancelling; keep waiting.
                    cancel_rx = None;
                }
                _ = timeout => {
                    warn!(
                        "FFmpeg timed out after {} seconds, killing process",
                        self.timeout_secs.unwrap_or(0)
                    );
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(self.timeout_secs.unwrap_or(0)));
                }
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// Parse a progress line from FFmpeg's -progress output.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_ms" | "out_time_us" => {
                // Both keys report microseconds in practice; normalize to ms.
                if let Ok(us) = value.parse::<i64>() {
                    current.out_time_ms = us / 1000;
                }
            }
            "out_time" => {
                // Format: HH:MM:SS.microseconds
                current.out_time = value.to_string();
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    current.fps = fps;
                }
            }
            "speed" => {
                // Format: "1.5x" or "N/A"
                if value != "N/A" {
                    if let Some(speed_str) = value.strip_suffix('x') {
                        if let Ok(speed) = speed_str.parse() {
                            current.speed = speed;
                        }
                    }
                }
            }
            "progress" => {
                // "continue" or "end"
                if value == "end" {
                    current.is_complete = true;
                }
                return Some(current.clone());
            }
            _ => {}
        }
    }

    None
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_single_input() {
        let cmd = FfmpegCommand::new("output.mp4")
            .seek(10.0)
            .input("input.mp4")
            .video_codec("libx264")
            .preset("fast");

        let args = cmd.build_args();
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));

        // Seek precedes its input.
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss_pos < i_pos);
    }

    #[test]
    fn test_command_builder_multiple_inputs() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("a.mp4")
            .loop_input()
            .input("music.mp3")
            .filter_complex("[0:v]scale=1080:1920[v]")
            .map("[v]");

        let args = cmd.build_args();
        let i_positions: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(i_positions.len(), 2);
        assert_eq!(args[i_positions[0] + 1], "a.mp4");
        assert_eq!(args[i_positions[1] + 1], "music.mp3");

        // -stream_loop applies to the second input only.
        let loop_pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert!(loop_pos > i_positions[0]);
        assert!(loop_pos < i_positions[1]);
    }

    #[test]
    fn test_lavfi_input() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input_duration(10.0)
            .lavfi_input("color=c=0x282850:s=1080x1920:r=30");

        let args = cmd.build_args();
        let f_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f_pos + 1], "lavfi");
        assert!(args.contains(&"color=c=0x282850:s=1080x1920:r=30".to_string()));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        parse_progress_line("out_time_us=5000000", &mut progress);
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(result.is_some());
        assert!(progress.is_complete);
    }
}
