//! Text Wrapper — greedy character-granularity line breaking.
//!
//! Korean body text cannot rely on spaces as break points the way Latin word
//! wrapping does, so lines are filled one character at a time: a character
//! joins the current line while the line still fits in `max_width`, otherwise
//! the line is committed and the character starts the next one.

use crate::layout::font_metrics::TextMeasure;

/// Wraps `text` into lines no wider than `max_width` points at `size` points.
///
/// `\n` always ends a line. An empty segment (two consecutive newlines, or an
/// empty input) yields an explicit `""` line. A whitespace-only segment is
/// kept as is, not collapsed to `""`, so joining the lines always gives back
/// the input; callers that want blank lines trim first, as the classifier
/// does. A single character wider than `max_width` is never split further and
/// sits alone on its line.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    text: &str,
    font: &M,
    size: f32,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    for segment in text.split('\n') {
        if segment.is_empty() {
            lines.push(String::new());
            continue;
        }
        wrap_segment(segment, font, size, max_width, &mut lines);
    }
    lines
}

fn wrap_segment<M: TextMeasure + ?Sized>(
    segment: &str,
    font: &M,
    size: f32,
    max_width: f32,
    out: &mut Vec<String>,
) {
    let mut line = String::new();
    // Running width equals string_width(line): no kerning, same summation order.
    let mut line_width = 0.0_f32;

    for ch in segment.chars() {
        let ch_width = font.char_width(ch, size);
        if line.is_empty() || line_width + ch_width <= max_width {
            line.push(ch);
            line_width += ch_width;
        } else {
            out.push(std::mem::take(&mut line));
            line.push(ch);
            line_width = ch_width;
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
