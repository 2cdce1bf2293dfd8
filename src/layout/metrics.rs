//! Page geometry, typography and text measurement.
//!
//! Output pages use the PDF base-14 Helvetica faces, so glyph advance widths
//! come straight from the Adobe AFM tables below. Every height the layout
//! engine reserves is computed by [`text_height`] on the lines produced by
//! [`wrap_text`], and the renderer places exactly those lines at
//! [`Typography::line_advance`] intervals. Measuring and drawing therefore
//! share one formula. The tables cover every glyph of WinAnsiEncoding, the
//! encoding builtin fonts are written with; anything else is measured at the
//! average width.

use serde::{Deserialize, Serialize};

/// Millimetres per typographic point.
pub const PT_TO_MM: f32 = 0.3528;

/// Fallback advance width (per 1000 em) for characters outside the tables.
const DEFAULT_ADVANCE: u16 = 556;

/// Helvetica advance widths for U+0020..=U+007E.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584,
    278, 333, 278, 278, 556, 556, 556, 556, 556, 556, 556, 556,
    556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
    722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278,
    278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
    556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advance widths for U+0020..=U+007E.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584,
    278, 333, 278, 278, 556, 556, 556, 556, 556, 556, 556, 556,
    556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722,
    722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333,
    278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611,
    611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556,
    333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Helvetica advance widths for U+00A0..=U+00FF (WinAnsi 0xA0..=0xFF).
#[rustfmt::skip]
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556,
    584, 333, 737, 333, 400, 584, 333, 333, 333, 556, 537, 278,
    333, 333, 365, 556, 834, 834, 834, 611, 667, 667, 667, 667,
    667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722,
    722, 667, 667, 611, 556, 556, 556, 556, 556, 556, 889, 500,
    556, 556, 556, 556, 278, 278, 278, 278, 556, 556, 556, 556,
    556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Helvetica-Bold advance widths for U+00A0..=U+00FF (WinAnsi 0xA0..=0xFF).
#[rustfmt::skip]
const HELVETICA_BOLD_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556,
    584, 333, 737, 333, 400, 584, 333, 333, 333, 611, 556, 278,
    333, 333, 365, 556, 834, 834, 834, 611, 722, 722, 722, 722,
    722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722,
    722, 667, 667, 611, 556, 556, 556, 556, 556, 556, 889, 556,
    556, 556, 556, 556, 278, 278, 278, 278, 611, 611, 611, 611,
    611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

/// Regular and bold widths of the glyphs WinAnsi places at 0x80..=0x9F.
fn winansi_punctuation(c: char) -> Option<(u16, u16)> {
    let widths = match c {
        '\u{20AC}' => (556, 556),  // Euro
        '\u{201A}' => (222, 278),  // quotesinglbase
        '\u{0192}' => (556, 556),  // florin
        '\u{201E}' => (333, 500),  // quotedblbase
        '\u{2026}' => (1000, 1000), // ellipsis
        '\u{2020}' | '\u{2021}' => (556, 556),
        '\u{02C6}' | '\u{02DC}' => (333, 333),
        '\u{2030}' => (1000, 1000), // perthousand
        '\u{0160}' => (667, 667),  // Scaron
        '\u{2039}' | '\u{203A}' => (333, 333),
        '\u{0152}' => (1000, 1000), // OE
        '\u{017D}' => (611, 611),  // Zcaron
        '\u{2018}' | '\u{2019}' => (222, 278),
        '\u{201C}' | '\u{201D}' => (333, 500),
        '\u{2022}' => (350, 350),  // bullet
        '\u{2013}' => (556, 556),  // endash
        '\u{2014}' => (1000, 1000), // emdash
        '\u{2122}' => (1000, 1000), // trademark
        '\u{0161}' => (500, 556),  // scaron
        '\u{0153}' => (944, 944),  // oe
        '\u{017E}' => (500, 500),  // zcaron
        '\u{0178}' => (667, 667),  // Ydieresis
        _ => return None,
    };
    Some(widths)
}

/// Advance width of one character, per 1000 em.
fn advance(c: char, weight: FontWeight) -> u16 {
    let bold = weight == FontWeight::Bold;
    let code = c as u32;
    match code {
        0x20..=0x7E => {
            let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
            table[(code - 0x20) as usize]
        }
        0xA0..=0xFF => {
            let table = if bold {
                &HELVETICA_BOLD_LATIN1
            } else {
                &HELVETICA_LATIN1
            };
            table[(code - 0xA0) as usize]
        }
        _ => winansi_punctuation(c)
            .map(|(regular, bold_w)| if bold { bold_w } else { regular })
            .unwrap_or(DEFAULT_ADVANCE),
    }
}

/// Weight of a text run. Maps to Helvetica / Helvetica-Bold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Fixed output page geometry, in millimetres. Default: A4 portrait, 15 mm margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4
    }
}

impl PageGeometry {
    pub const A4: PageGeometry = PageGeometry {
        width: 210.0,
        height: 297.0,
        margin: 15.0,
    };

    /// Width available between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// Height available between the top and bottom margins.
    pub fn content_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }

    /// Lowest y (measured from the top edge) content may reach.
    pub fn bottom_limit(&self) -> f32 {
        self.height - self.margin
    }
}

/// Font sizes and spacing used by the layout engine.
///
/// Sizes are in points; every other length is in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Typography {
    pub title_size: f32,
    pub body_size: f32,
    /// Multiplier applied to every line (>1).
    pub line_height: f32,
    pub title_margin_top: f32,
    pub title_margin_bottom: f32,
    /// Padding between the body box border and its text.
    pub box_padding: f32,
    pub box_radius: f32,
    /// Vertical gap after a body box.
    pub block_gap: f32,
    /// Horizontal inset of body text from the left margin. The body wraps
    /// at `content_width - 2 * body_inset`.
    pub body_inset: f32,
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            title_size: 14.0,
            body_size: 10.0,
            line_height: 1.3,
            title_margin_top: 5.0,
            title_margin_bottom: 8.0,
            box_padding: 6.0,
            box_radius: 2.0,
            block_gap: 8.0,
            body_inset: 5.0,
        }
    }
}

impl Typography {
    /// Distance between consecutive baselines at `size` points.
    pub fn line_advance(&self, size: f32) -> f32 {
        size * PT_TO_MM * self.line_height
    }
}

/// Advance width of `text` in millimetres.
pub fn text_width(text: &str, size: f32, weight: FontWeight) -> f32 {
    let units: u32 = text.chars().map(|c| advance(c, weight) as u32).sum();
    units as f32 / 1000.0 * size * PT_TO_MM
}

/// Word-wrap `text` to lines no wider than `max_width` millimetres.
///
/// Explicit newlines always start a new line and every paragraph yields at
/// least one (possibly empty) line, so `""` wraps to one empty line. Words
/// wider than the line are broken between characters.
pub fn wrap_text(text: &str, size: f32, weight: FontWeight, max_width: f32) -> Vec<String> {
    let space = text_width(" ", size, weight);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0f32;

        for word in paragraph.split_whitespace() {
            let word_width = text_width(word, size, weight);

            if word_width > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current_width = 0.0;
                for c in word.chars() {
                    let w = text_width(c.encode_utf8(&mut [0; 4]), size, weight);
                    if current_width + w > max_width && !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0.0;
                    }
                    current.push(c);
                    current_width += w;
                }
            } else if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + space + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_width = word_width;
            }
        }

        lines.push(current);
    }

    lines
}

/// Height reserved for `line_count` lines at `size` points.
pub fn text_height(line_count: usize, size: f32, typography: &Typography) -> f32 {
    line_count as f32 * typography.line_advance(size)
}

/// Wrap and measure in one step.
pub fn measure(
    text: &str,
    size: f32,
    weight: FontWeight,
    max_width: f32,
    typography: &Typography,
) -> (Vec<String>, f32) {
    let lines = wrap_text(text, size, weight, max_width);
    let height = text_height(lines.len(), size, typography);
    (lines, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_geometry() {
        let g = PageGeometry::default();
        assert_eq!(g.content_width(), 180.0);
        assert_eq!(g.content_height(), 267.0);
        assert_eq!(g.bottom_limit(), 282.0);
    }

    #[test]
    fn accented_and_punctuation_glyphs_use_their_own_widths() {
        let em = |t: &str, w| text_width(t, 1000.0 / PT_TO_MM, w);
        assert!((em("•", FontWeight::Regular) - 350.0).abs() < 0.5);
        assert!((em("é", FontWeight::Regular) - 556.0).abs() < 0.5);
        assert!((em("É", FontWeight::Bold) - 667.0).abs() < 0.5);
        assert!((em("ç", FontWeight::Regular) - 500.0).abs() < 0.5);
        assert!((em("œ", FontWeight::Regular) - 944.0).abs() < 0.5);
        assert!((em("\u{2019}", FontWeight::Bold) - 278.0).abs() < 0.5);
        assert!((em("\u{00A0}", FontWeight::Regular) - 278.0).abs() < 0.5);
        // Outside WinAnsi: average width.
        assert!((em("\u{4E2D}", FontWeight::Regular) - 556.0).abs() < 0.5);
    }

    #[test]
    fn bullet_lines_are_narrower_than_the_fallback() {
        let bullet = text_width("• point", 10.0, FontWeight::Regular);
        let star = text_width("\u{2605} point", 10.0, FontWeight::Regular);
        assert!(bullet < star);
    }

    #[test]
    fn bold_is_wider_than_regular() {
        let regular = text_width("Introduction", 14.0, FontWeight::Regular);
        let bold = text_width("Introduction", 14.0, FontWeight::Bold);
        assert!(bold > regular);
    }

    #[test]
    fn width_scales_with_size() {
        let w10 = text_width("abc", 10.0, FontWeight::Regular);
        let w20 = text_width("abc", 20.0, FontWeight::Regular);
        assert!((w20 - 2.0 * w10).abs() < 1e-4);
    }

    #[test]
    fn empty_text_is_one_line() {
        assert_eq!(wrap_text("", 10.0, FontWeight::Regular, 100.0), vec![""]);
    }

    #[test]
    fn explicit_newlines_are_kept() {
        let lines = wrap_text("one\n\ntwo", 10.0, FontWeight::Regular, 100.0);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn wrapped_lines_fit_the_width() {
        let text = "lorem ipsum dolor sit amet ".repeat(40);
        let lines = wrap_text(&text, 10.0, FontWeight::Regular, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 10.0, FontWeight::Regular) <= 60.0 + 1e-3, "{line}");
        }
        let rejoined = lines.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), 200);
    }

    #[test]
    fn overlong_word_is_broken() {
        let word = "x".repeat(200);
        let lines = wrap_text(&word, 10.0, FontWeight::Regular, 20.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn height_formula() {
        let t = Typography::default();
        let h = text_height(3, 10.0, &t);
        assert!((h - 3.0 * 10.0 * PT_TO_MM * 1.3).abs() < 1e-4);
    }
}
