//! Media asset and narration segment descriptors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::timing::WordTiming;

/// What kind of visual a fetched asset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

/// A fetched visual asset on local disk, probed for its native properties.
///
/// Owned by exactly one pipeline run; the normalizer consumes it once and the
/// file is removed with the run's temp directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Local file path inside the run's temp directory.
    pub path: PathBuf,

    /// Native duration in seconds (0.0 for still images).
    pub duration: f64,

    /// Native width in pixels.
    pub width: u32,

    /// Native height in pixels.
    pub height: u32,

    /// Video or still image.
    pub kind: MediaKind,

    /// Whether the container carries an audio stream.
    #[serde(default)]
    pub has_audio: bool,
}

impl MediaAsset {
    /// Native aspect ratio (width / height).
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Synthesized narration for one scene.
///
/// `duration` is always re-measured from the decoded file; values reported
/// by TTS providers are never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationSegment {
    /// Index of the owning scene in plan order.
    pub scene_index: usize,

    /// Local audio file path.
    pub path: PathBuf,

    /// Measured duration in seconds; invariant: > 0.
    pub duration: f64,

    /// The text that was synthesized.
    pub source_text: String,

    /// Word-level timings from ASR; empty when transcription failed.
    #[serde(default)]
    pub word_timings: Vec<WordTiming>,
}

impl NarrationSegment {
    /// A segment is usable when its file exists and decoded to a positive
    /// duration. Anything else is treated as a failed synthesis and excluded.
    pub fn is_usable(&self) -> bool {
        self.duration > 0.0 && self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect() {
        let asset = MediaAsset {
            path: PathBuf::from("/tmp/a.mp4"),
            duration: 10.0,
            width: 1920,
            height: 1080,
            kind: MediaKind::Video,
            has_audio: false,
        };
        assert!((asset.aspect() - 16.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_height_aspect() {
        let asset = MediaAsset {
            path: PathBuf::from("/tmp/a.mp4"),
            duration: 0.0,
            width: 100,
            height: 0,
            kind: MediaKind::Image,
            has_audio: false,
        };
        assert_eq!(asset.aspect(), 0.0);
    }

    #[test]
    fn test_missing_file_not_usable() {
        let seg = NarrationSegment {
            scene_index: 0,
            path: PathBuf::from("/nonexistent/definitely_missing.mp3"),
            duration: 2.0,
            source_text: "hello".to_string(),
            word_timings: vec![],
        };
        assert!(!seg.is_usable());
    }
}
