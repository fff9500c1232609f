//! Base-14 font metrics and the per-render font configuration.
//!
//! There is no registry shared between render calls: every `LayoutJob` carries its
//! own `FontConfig`, so the measure pass and the final render see identical fonts
//! without re-registering anything.

use crate::content::FontRole;
use crate::types::Pt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Base14Font {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

impl Base14Font {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Base14Font::Helvetica => "Helvetica",
            Base14Font::HelveticaBold => "Helvetica-Bold",
            Base14Font::Courier => "Courier",
            Base14Font::CourierBold => "Courier-Bold",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "helvetica" => Some(Base14Font::Helvetica),
            "helvetica-bold" => Some(Base14Font::HelveticaBold),
            "courier" => Some(Base14Font::Courier),
            "courier-bold" => Some(Base14Font::CourierBold),
            _ => None,
        }
    }

    // Advance width in 1/1000 em.
    fn advance(&self, ch: char) -> u16 {
        match self {
            Base14Font::Courier | Base14Font::CourierBold => 600,
            Base14Font::Helvetica => ascii_width(&HELVETICA_WIDTHS, ch),
            Base14Font::HelveticaBold => ascii_width(&HELVETICA_BOLD_WIDTHS, ch),
        }
    }

    pub fn measure(&self, font_size: Pt, text: &str) -> Pt {
        let units: i64 = text.chars().map(|ch| self.advance(ch) as i64).sum();
        let milli = font_size.to_milli_i64().saturating_mul(units) / 1000;
        Pt::from_milli_i64(milli)
    }
}

fn ascii_width(table: &[u16; 95], ch: char) -> u16 {
    let code = ch as u32;
    if (32..127).contains(&code) {
        table[(code - 32) as usize]
    } else {
        MISSING_WIDTH
    }
}

const MISSING_WIDTH: u16 = 556;

// Widths for U+0020..=U+007E from the Adobe core font AFMs.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Fonts and line metrics for one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct FontConfig {
    pub regular: Base14Font,
    pub bold: Base14Font,
    pub monospace: Base14Font,
    // Line height as a ratio of the font size, in percent.
    pub line_height_percent: i32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            regular: Base14Font::Helvetica,
            bold: Base14Font::HelveticaBold,
            monospace: Base14Font::Courier,
            line_height_percent: 120,
        }
    }
}

impl FontConfig {
    pub fn font_for(&self, role: FontRole) -> Base14Font {
        match role {
            FontRole::Regular => self.regular,
            FontRole::Bold => self.bold,
            FontRole::Monospace => self.monospace,
        }
    }

    pub fn line_height(&self, font_size: Pt) -> Pt {
        font_size.mul_ratio(self.line_height_percent, 100)
    }

    pub fn measure(&self, role: FontRole, font_size: Pt, text: &str) -> Pt {
        self.font_for(role).measure(font_size, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_digits_are_half_em() {
        let width = Base14Font::Helvetica.measure(Pt::from_i32(10), "0123456789");
        assert_eq!(width, Pt::from_f32(55.6));
    }

    #[test]
    fn courier_is_fixed_pitch() {
        let a = Base14Font::Courier.measure(Pt::from_i32(10), "iiii");
        let b = Base14Font::Courier.measure(Pt::from_i32(10), "WWWW");
        assert_eq!(a, b);
        assert_eq!(a, Pt::from_i32(24));
    }

    #[test]
    fn non_ascii_uses_missing_width() {
        let width = Base14Font::Helvetica.measure(Pt::from_i32(1), "é");
        assert_eq!(width, Pt::from_f32(0.556));
    }

    #[test]
    fn line_height_follows_percent() {
        let config = FontConfig::default();
        assert_eq!(config.line_height(Pt::from_i32(10)), Pt::from_i32(12));
    }

    #[test]
    fn names_round_trip() {
        for font in [
            Base14Font::Helvetica,
            Base14Font::HelveticaBold,
            Base14Font::Courier,
            Base14Font::CourierBold,
        ] {
            assert_eq!(Base14Font::from_name(font.pdf_name()), Some(font));
        }
    }
}
