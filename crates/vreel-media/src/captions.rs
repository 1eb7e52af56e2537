//! Karaoke caption rendering.
//!
//! Word timings become an ASS subtitle document: one dialogue event per
//! word group, shown only while its words are spoken. Nothing is drawn
//! between groups. The document is burned into the segment by the
//! compositor's `ass` filter.

use std::path::Path;

use vreel_models::{CaptionStyle, WordTiming};

use crate::error::MediaResult;

/// Groups shorter than this render as nothing but flicker; skip them.
const MIN_CUE_SECS: f64 = 0.01;

/// Pop-in scale window never exceeds this many seconds.
const MAX_POP_SECS: f64 = 0.15;
/// Pop-in window as a fraction of the cue duration.
const POP_FRACTION: f64 = 0.4;
/// Scale percentage a group grows to during the pop.
const POP_SCALE: u32 = 120;

/// One timed caption group ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// Group start in seconds
    pub start: f64,
    /// Group end in seconds
    pub end: f64,
    /// Uppercased display text
    pub text: String,
    /// Whether any word matched a highlight keyword
    pub highlighted: bool,
}

impl CaptionCue {
    fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Build caption cues from raw word timings.
///
/// Malformed timings are dropped individually, the word budget keeps the
/// earliest `max_words` entries, and survivors are grouped into runs of
/// `words_per_group` words. Groups spanning less than [`MIN_CUE_SECS`]
/// are discarded.
pub fn build_cues(
    timings: &[WordTiming],
    keywords: &[String],
    words_per_group: usize,
    max_words: usize,
) -> Vec<CaptionCue> {
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let group_size = words_per_group.max(1);

    let usable: Vec<&WordTiming> = timings
        .iter()
        .filter(|t| t.is_well_formed())
        .take(max_words)
        .collect();

    usable
        .chunks(group_size)
        .map(|group| {
            let text = group
                .iter()
                .map(|t| t.word.trim().to_uppercase())
                .collect::<Vec<_>>()
                .join(" ");

            let highlighted = group.iter().any(|t| {
                let bare = strip_trailing_punctuation(&t.word).to_lowercase();
                !bare.is_empty() && keywords_lower.iter().any(|k| k == &bare)
            });

            CaptionCue {
                start: group[0].start,
                end: group[group.len() - 1].end,
                text,
                highlighted,
            }
        })
        .filter(|cue| cue.duration() > MIN_CUE_SECS)
        .collect()
}

fn strip_trailing_punctuation(word: &str) -> &str {
    word.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
}

/// Render cues into a complete ASS document.
///
/// `baseline_y` is the vertical anchor in canvas pixels; the compositor
/// jitters it per segment.
pub fn render_ass_document(
    cues: &[CaptionCue],
    style: &CaptionStyle,
    canvas_width: u32,
    canvas_height: u32,
    baseline_y: u32,
) -> String {
    let mut doc = String::new();

    doc.push_str("[Script Info]\n");
    doc.push_str("ScriptType: v4.00+\n");
    doc.push_str(&format!("PlayResX: {}\n", canvas_width));
    doc.push_str(&format!("PlayResY: {}\n", canvas_height));
    doc.push_str("ScaledBorderAndShadow: yes\n\n");

    doc.push_str("[V4+ Styles]\n");
    doc.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    doc.push_str(&format!(
        "Style: Caption,{},{},{},{},{},&H00000000,0,0,0,0,100,100,0,0,1,{:.1},0,2,10,10,10,1\n\n",
        style.font_family,
        style.font_size,
        hex_to_ass_color(&style.color),
        hex_to_ass_color(&style.color),
        hex_to_ass_color(&style.outline_color),
        style.outline_width,
    ));

    doc.push_str("[Events]\n");
    doc.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");

    let x = canvas_width / 2;
    let highlight = hex_to_ass_color(&style.highlight_color);

    for cue in cues {
        let pop_ms = ((cue.duration() * POP_FRACTION).min(MAX_POP_SECS) * 1000.0).round() as u64;
        let fade_ms = pop_ms / 2;

        // Highlighted groups keep the enlarged scale for the whole cue;
        // plain groups settle back to 100 once the pop completes.
        let settle_tag = if cue.highlighted {
            String::new()
        } else {
            format!("\\t({},{},\\fscx100\\fscy100)", pop_ms, pop_ms)
        };
        let color_tag = if cue.highlighted {
            format!("\\1c{}&", highlight)
        } else {
            String::new()
        };

        let tags = format!(
            "{{\\an5\\pos({},{})\\t(0,{},0.5,\\fscx{}\\fscy{}){}\\fad({},{}){}}}",
            x, baseline_y, pop_ms, POP_SCALE, POP_SCALE, settle_tag, fade_ms, fade_ms, color_tag
        );

        doc.push_str(&format!(
            "Dialogue: 0,{},{},Caption,,0,0,0,,{}{}\n",
            seconds_to_ass(cue.start),
            seconds_to_ass(cue.end),
            tags,
            escape_ass_text(&cue.text),
        ));
    }

    doc
}

/// Write an ASS document to disk.
pub async fn write_ass_file(document: &str, path: impl AsRef<Path>) -> MediaResult<()> {
    tokio::fs::write(path.as_ref(), document).await?;
    Ok(())
}

/// Convert `#RRGGBB` to ASS `&H00BBGGRR` order. Unparseable input maps
/// to opaque white.
pub fn hex_to_ass_color(hex: &str) -> String {
    let raw = hex.trim_start_matches('#');
    if raw.len() == 6 {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&raw[0..2], 16),
            u8::from_str_radix(&raw[2..4], 16),
            u8::from_str_radix(&raw[4..6], 16),
        ) {
            return format!("&H00{:02X}{:02X}{:02X}", b, g, r);
        }
    }
    "&H00FFFFFF".to_string()
}

/// Format seconds as ASS `H:MM:SS.CC`.
fn seconds_to_ass(secs: f64) -> String {
    let total_cs = (secs.max(0.0) * 100.0).round() as i64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{:01}:{:02}:{:02}.{:02}", h, m, s, cs)
}

fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(word: &str, start: f64, end: f64) -> WordTiming {
        WordTiming::new(word, start, end)
    }

    #[test]
    fn test_malformed_timings_are_dropped() {
        let mut timings: Vec<WordTiming> = (0..9)
            .map(|i| timing("word", i as f64, i as f64 + 0.5))
            .collect();
        // One reversed entry among nine good ones.
        timings.insert(4, timing("bad", 5.0, 4.0));

        let cues = build_cues(&timings, &[], 1, 100);
        assert_eq!(cues.len(), 9);
    }

    #[test]
    fn test_near_zero_groups_are_skipped() {
        let timings = vec![timing("blip", 1.0, 1.005), timing("word", 2.0, 2.5)];
        let cues = build_cues(&timings, &[], 1, 100);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "WORD");
    }

    #[test]
    fn test_word_budget_keeps_earliest() {
        let timings: Vec<WordTiming> = (0..20)
            .map(|i| timing(&format!("w{i}"), i as f64, i as f64 + 0.4))
            .collect();

        let cues = build_cues(&timings, &[], 1, 5);
        assert_eq!(cues.len(), 5);
        assert_eq!(cues[0].text, "W0");
        assert_eq!(cues[4].text, "W4");
    }

    #[test]
    fn test_grouping_and_bounds() {
        let timings = vec![
            timing("the", 0.0, 0.3),
            timing("quick", 0.3, 0.6),
            timing("fox", 0.6, 1.0),
        ];

        let cues = build_cues(&timings, &[], 2, 100);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "THE QUICK");
        assert!((cues[0].start - 0.0).abs() < 1e-9);
        assert!((cues[0].end - 0.6).abs() < 1e-9);
        assert_eq!(cues[1].text, "FOX");
    }

    #[test]
    fn test_keyword_highlight_ignores_trailing_punctuation() {
        let timings = vec![timing("amazing!", 0.0, 0.5), timing("stuff", 0.5, 1.0)];
        let cues = build_cues(&timings, &["Amazing".to_string()], 2, 100);
        assert!(cues[0].highlighted);

        let cues = build_cues(&timings, &["other".to_string()], 2, 100);
        assert!(!cues[0].highlighted);
    }

    #[test]
    fn test_ass_time_format() {
        assert_eq!(seconds_to_ass(0.0), "0:00:00.00");
        assert_eq!(seconds_to_ass(83.5), "0:01:23.50");
        assert_eq!(seconds_to_ass(3661.25), "1:01:01.25");
    }

    #[test]
    fn test_hex_color_conversion() {
        assert_eq!(hex_to_ass_color("#FFFF00"), "&H0000FFFF");
        assert_eq!(hex_to_ass_color("#282850"), "&H00502828");
        assert_eq!(hex_to_ass_color("nonsense"), "&H00FFFFFF");
    }

    #[test]
    fn test_document_structure() {
        let style = CaptionStyle::default();
        let cues = build_cues(
            &[timing("hello", 0.0, 0.5), timing("world", 0.5, 1.2)],
            &["world".to_string()],
            2,
            100,
        );
        let doc = render_ass_document(&cues, &style, 1080, 1920, 1440);

        assert!(doc.contains("[Script Info]"));
        assert!(doc.contains("PlayResX: 1080"));
        assert!(doc.contains("Style: Caption,Komika Axis,90"));
        assert_eq!(doc.matches("Dialogue:").count(), 1);
        assert!(doc.contains("\\pos(540,1440)"));
        assert!(doc.contains("\\fscx120"));
        assert!(doc.contains("\\fad("));
        // Highlighted group carries the accent color override.
        assert!(doc.contains("\\1c&H0000FFFF&"));
        assert!(doc.contains("HELLO WORLD"));
    }

    #[test]
    fn test_pop_settles_unless_highlighted() {
        let style = CaptionStyle::default();
        let cues = build_cues(
            &[timing("plain", 0.0, 1.0), timing("special", 1.0, 2.0)],
            &["special".to_string()],
            1,
            100,
        );
        let doc = render_ass_document(&cues, &style, 1080, 1920, 1440);

        let lines: Vec<&str> = doc.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(lines.len(), 2);
        // Plain group snaps back to full scale after the pop.
        assert!(lines[0].contains("\\fscx100"));
        // Highlighted group stays enlarged and recolored.
        assert!(!lines[1].contains("\\fscx100"));
        assert!(lines[1].contains("\\1c&H0000FFFF&"));
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(escape_ass_text("A{B}C"), "A\\{B\\}C");
        assert_eq!(escape_ass_text("back\\slash"), "back\\\\slash");
    }
}
