//! Character specifiers: how rules name the characters and glyphs they touch.
//!
//! A specifier is one of
//!
//! - a single literal character, e.g. `A` or `漢`,
//! - a hexadecimal code point prefixed with `0x`, e.g. `0x41`,
//! - a hexadecimal code point prefixed with `0u`, `0U`, `u+` or `U+`, e.g. `U+6F22`,
//! - anything else, which is taken to be a glyph name as-is.

use std::fmt;
use std::str::FromStr;

use crate::error::ResolveError;
use crate::font::Font;

const HEX_PREFIXES: [&str; 5] = ["0x", "0u", "0U", "u+", "U+"];

/// A parsed character specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CharSpec {
    Codepoint(u32),
    GlyphName(String),
}

impl CharSpec {
    /// The code point this specifier stands for, if it is not a glyph name.
    pub fn codepoint(&self) -> Option<u32> {
        match self {
            CharSpec::Codepoint(cp) => Some(*cp),
            CharSpec::GlyphName(_) => None,
        }
    }

    /// Resolves the specifier to a glyph of `font`.
    ///
    /// Code points are looked up in the font's best character map. Glyph
    /// names are returned as given; it is up to the caller to fetch them.
    pub fn resolve_glyph<'a>(&'a self, font: &'a Font) -> Result<&'a str, ResolveError> {
        match self {
            CharSpec::Codepoint(cp) => font.lookup(*cp).ok_or_else(|| ResolveError::Unmapped {
                codepoint: *cp,
                font: font.name.clone(),
            }),
            CharSpec::GlyphName(name) => Ok(name),
        }
    }
}

impl FromStr for CharSpec {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(ResolveError::Empty),
            (Some(c), None) => Ok(CharSpec::Codepoint(c as u32)),
            _ => match HEX_PREFIXES.iter().find_map(|prefix| s.strip_prefix(prefix)) {
                Some(hex) => u32::from_str_radix(hex, 16)
                    .ok()
                    .filter(|&cp| char::from_u32(cp).is_some())
                    .map(CharSpec::Codepoint)
                    .ok_or_else(|| ResolveError::InvalidCodepoint(s.to_string())),
                None => Ok(CharSpec::GlyphName(s.to_string())),
            },
        }
    }
}

impl fmt::Display for CharSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharSpec::Codepoint(cp) => write!(f, "U+{:04X}", cp),
            CharSpec::GlyphName(name) => write!(f, "/{}", name),
        }
    }
}

/// The conventional glyph name for a code point without one: `uniXXXX` in
/// the BMP and `uXXXXX` beyond it.
pub fn default_glyph_name(codepoint: u32) -> String {
    if codepoint <= 0xFFFF {
        format!("uni{:04X}", codepoint)
    } else {
        format!("u{:05X}", codepoint)
    }
}

/// Whether `codepoint` is a Unicode variation selector (including the
/// Mongolian free variation selectors).
pub fn is_variation_selector(codepoint: u32) -> bool {
    matches!(
        codepoint,
        0x180B..=0x180D | 0x180F | 0xFE00..=0xFE0F | 0xE0100..=0xE01EF
    )
}
