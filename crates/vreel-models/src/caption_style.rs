//! Caption styling.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default caption font family. Falls back through fontconfig when the
/// family is not installed.
pub const DEFAULT_CAPTION_FONT: &str = "Komika Axis";
/// Default caption font size in pixels at the 1080x1920 canvas.
pub const DEFAULT_CAPTION_FONT_SIZE: u32 = 90;
/// Default highlight color for keyword words.
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFFF00";

/// Visual style for karaoke captions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    /// Font family name.
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Base text color as `#RRGGBB`.
    #[serde(default = "default_color")]
    pub color: String,

    /// Color for keyword-highlighted groups as `#RRGGBB`.
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,

    /// Outline color as `#RRGGBB`.
    #[serde(default = "default_outline_color")]
    pub outline_color: String,

    /// Outline width in pixels.
    #[serde(default = "default_outline_width")]
    pub outline_width: f32,

    /// Words shown together per karaoke group.
    #[serde(default = "default_words_per_group")]
    pub words_per_group: usize,
}

fn default_font_family() -> String {
    DEFAULT_CAPTION_FONT.to_string()
}
fn default_font_size() -> u32 {
    DEFAULT_CAPTION_FONT_SIZE
}
fn default_color() -> String {
    "#FFFFFF".to_string()
}
fn default_highlight_color() -> String {
    DEFAULT_HIGHLIGHT_COLOR.to_string()
}
fn default_outline_color() -> String {
    "#000000".to_string()
}
fn default_outline_width() -> f32 {
    5.0
}
fn default_words_per_group() -> usize {
    2
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: default_color(),
            highlight_color: default_highlight_color(),
            outline_color: default_outline_color(),
            outline_width: default_outline_width(),
            words_per_group: default_words_per_group(),
        }
    }
}
