//! Picking individual contours out of a glyph.

use std::ops::RangeInclusive;

use crate::error::ContourIndexError;
use crate::font::Glyph;

/// The point indices of contour `index`: `0..=end[0]` for the first contour,
/// `end[k-1]+1..=end[k]` for the others.
pub fn contour_range(glyph: &Glyph, index: usize) -> Result<RangeInclusive<usize>, ContourIndexError> {
    let end = *glyph.contour_ends.get(index).ok_or(ContourIndexError {
        index,
        count: glyph.contour_count(),
    })?;
    let start = match index {
        0 => 0,
        _ => glyph.contour_ends[index - 1] + 1,
    };
    Ok(start..=end)
}
