use crate::render_ir::FontSpec;

/// Text measurement hook used for line fitting.
///
/// Backends that draw text should provide a measurer built on the same font
/// data so wrapped lines fit exactly what gets drawn.
pub trait TextMeasurer: Send + Sync {
    /// Measure rendered text width for the provided font.
    fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32;
}

/// Per-glyph em-width estimate used when no backend measurer is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicMeasurer;

impl TextMeasurer for HeuristicMeasurer {
    fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32 {
        heuristic_measure_text(text, font)
    }
}

pub(crate) fn heuristic_measure_text(text: &str, font: &FontSpec) -> f32 {
    if text.is_empty() || !font.size_px.is_finite() || font.size_px <= 0.0 {
        return 0.0;
    }
    let family = font.family.to_ascii_lowercase();
    let proportional = !(family.contains("mono") || family.contains("fixed"));
    let mut em_sum = 0.0f32;
    if proportional {
        for ch in text.chars() {
            em_sum += proportional_glyph_em_width(ch);
        }
    } else {
        for ch in text.chars() {
            em_sum += if ch == ' ' { 0.52 } else { 0.58 };
        }
    }

    // Condensed display faces (Impact, Anton, Bebas) run narrow.
    let mut family_scale = if family.contains("impact")
        || family.contains("anton")
        || family.contains("bebas")
    {
        0.82
    } else if family.contains("serif") && !family.contains("sans") {
        1.03
    } else {
        1.00
    };
    if font.weight >= 700 {
        family_scale += 0.03;
    }
    em_sum * font.size_px * family_scale
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' => 0.32,
        '\t' => 1.28,
        '\u{00A0}' => 0.32,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.23,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => 0.34,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.30,
        'f' | 't' | 'j' | 'r' => 0.34,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.74,
        c if c.is_ascii_digit() => 0.52,
        c if c.is_ascii_uppercase() => 0.64,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.32,
        c if c.is_ascii_punctuation() => 0.42,
        _ => 0.56,
    }
}

/// Greedy word wrap of a caption.
///
/// The text is uppercased, split on `\n`, and each segment wrapped on its
/// own. Whitespace-only segments become empty lines; elsewhere words are
/// separated by single spaces, so repeated spaces are kept. A word is appended to
/// the current line only while the candidate measures strictly under
/// `max_width`; a single word wider than `max_width` gets a line to itself
/// and is never split.
pub fn wrap_text(
    text: &str,
    max_width: f32,
    font: &FontSpec,
    measurer: &dyn TextMeasurer,
) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let upper = text.to_uppercase();
    let mut lines = Vec::new();
    for segment in upper.split('\n') {
        if segment.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        // Split on single spaces so runs of spaces survive in the output.
        let mut words = segment.split(' ');
        let mut current = words.next().unwrap_or_default().to_string();
        for word in words {
            let candidate_len = current.len() + 1 + word.len();
            let mut candidate = String::with_capacity(candidate_len);
            candidate.push_str(&current);
            candidate.push(' ');
            candidate.push_str(word);
            if measurer.measure_text_px(&candidate, font) < max_width {
                current = candidate;
            } else {
                lines.push(core::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every char is 10px wide.
    struct FixedMeasurer;

    impl TextMeasurer for FixedMeasurer {
        fn measure_text_px(&self, text: &str, _font: &FontSpec) -> f32 {
            text.chars().count() as f32 * 10.0
        }
    }

    fn font() -> FontSpec {
        FontSpec::new("Impact, sans-serif", 900, 40.0)
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_text("", 720.0, &font(), &FixedMeasurer).is_empty());
    }

    #[test]
    fn uppercases_and_wraps_greedily() {
        let lines = wrap_text("aaa bbb ccc", 80.0, &font(), &FixedMeasurer);
        assert_eq!(lines, vec!["AAA BBB", "CCC"]);
    }

    #[test]
    fn candidate_must_fit_strictly() {
        // "AAA BBB" is exactly 70px, which does not fit under 70.
        let lines = wrap_text("aaa bbb", 70.0, &font(), &FixedMeasurer);
        assert_eq!(lines, vec!["AAA", "BBB"]);
    }

    #[test]
    fn blank_segments_become_empty_lines() {
        let lines = wrap_text("a\n\nb", 720.0, &font(), &FixedMeasurer);
        assert_eq!(lines, vec!["A", "", "B"]);
        let lines = wrap_text("a\n   \nb", 720.0, &font(), &FixedMeasurer);
        assert_eq!(lines, vec!["A", "", "B"]);
    }

    #[test]
    fn repeated_spaces_are_kept() {
        let lines = wrap_text("a  b", 720.0, &font(), &FixedMeasurer);
        assert_eq!(lines, vec!["A  B"]);
        // "AAA " is 40px, then "AAA  BBB" would be 80px.
        let lines = wrap_text("aaa  bbb", 80.0, &font(), &FixedMeasurer);
        assert_eq!(lines, vec!["AAA ", "BBB"]);
    }

    #[test]
    fn long_word_is_never_split() {
        let word = "x".repeat(200);
        let lines = wrap_text(&format!("hi {} yo", word), 720.0, &font(), &FixedMeasurer);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], word.to_uppercase());
    }

    #[test]
    fn heuristic_scales_with_size_and_ignores_degenerate_fonts() {
        let small = FontSpec::new("Impact", 900, 20.0);
        let large = FontSpec::new("Impact", 900, 40.0);
        let a = HeuristicMeasurer.measure_text_px("HELLO", &small);
        let b = HeuristicMeasurer.measure_text_px("HELLO", &large);
        assert!(a > 0.0);
        assert!((b - 2.0 * a).abs() < 0.01);
        let nan = FontSpec::new("Impact", 900, f32::NAN);
        assert_eq!(HeuristicMeasurer.measure_text_px("HELLO", &nan), 0.0);
    }
}
