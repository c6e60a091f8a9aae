//! Recombine glyphs from several fonts into one.
//!
//! A run loads a set of input fonts, picks one of them as the destination
//! and applies a list of rules to it in order. A *Replace* rule copies a
//! whole glyph from a source font, rescaling it to the destination's
//! units-per-em; a *Compose* rule builds a new glyph from selected contours
//! of one or more source glyphs. After each rule the destination's character
//! map points the rule's code point at the new glyph, and the glyph it used
//! to map to is kept reachable through a Unicode variation sequence.

pub mod charspec;
pub mod compose;
pub mod config;
pub mod contour;
pub mod driver;
pub mod error;
pub mod font;
pub mod mapping;
pub mod rules;
pub mod scale;
pub mod ufo;

pub use error::Error;
