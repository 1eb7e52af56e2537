//! Word-level caption timings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sanity ceiling for a single word's end time, in seconds. Narration
/// segments are short sentences; anything past this is transcription noise.
pub const MAX_WORD_TIMING_SECS: f64 = 30.0;

/// One transcribed word with its speech interval, relative to the start of
/// its narration segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTiming {
    /// The spoken word as transcribed.
    pub word: String,

    /// Interval start in seconds.
    pub start: f64,

    /// Interval end in seconds.
    pub end: f64,
}

impl WordTiming {
    /// Create a new word timing.
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }

    /// Whether this entry satisfies `0 <= start < end <= MAX_WORD_TIMING_SECS`
    /// with finite values and a non-empty word.
    ///
    /// Malformed entries are dropped individually by the caption renderer,
    /// never escalated.
    pub fn is_well_formed(&self) -> bool {
        self.start.is_finite()
            && self.end.is_finite()
            && self.start >= 0.0
            && self.start < self.end
            && self.end <= MAX_WORD_TIMING_SECS
            && !self.word.trim().is_empty()
    }

    /// Interval length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
