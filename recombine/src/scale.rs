//! Moving outlines between fonts with different units-per-em.

use kurbo::{Affine, Point};

/// The factor taking coordinates from a `source_upem` grid to a `dest_upem` grid.
pub fn scale_factor(dest_upem: u16, source_upem: u16) -> f64 {
    f64::from(dest_upem) / f64::from(source_upem)
}

/// Scales every point by `factor` around the origin.
///
/// A factor of exactly 1.0 returns the input unchanged, bit for bit.
pub fn scale_points(points: &[Point], factor: f64) -> Vec<Point> {
    if factor == 1.0 {
        return points.to_vec();
    }
    let transform = Affine::scale(factor);
    points.iter().map(|&pt| transform * pt).collect()
}

/// Scales an advance width, rounding half away from zero.
pub fn scale_advance(advance_width: u16, factor: f64) -> u16 {
    (f64::from(advance_width) * factor).round() as u16
}

/// Rounds a design-unit coordinate to the `i16` range metrics are stored in.
pub fn round_coordinate(value: f64) -> i16 {
    value.round() as i16
}
