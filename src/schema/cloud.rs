//! Gaussian cloud parameters.

use serde::{Deserialize, Serialize};

/// Half-open range for each axis of a cloud center.
pub const CENTER_RANGE: (f64, f64) = (-100.0, 100.0);

/// Half-open range for each axis of a cloud's standard deviation.
pub const SPREAD_RANGE: (f64, f64) = (1.0, 11.0);

/// Half-open range for each channel of a cloud's base color.
pub const BASE_COLOR_RANGE: (f64, f64) = (0.2, 0.8);

/// Standard deviation of the per-point color jitter.
pub const COLOR_JITTER: f64 = 0.05;

/// Generation state shared by every point of one cloud.
///
/// Never written to disk; it only shows up as correlation between the
/// records sampled from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudSpec {
    /// Cloud center (x, y, z).
    pub center: [f64; 3],
    /// Standard deviation per axis.
    pub spread: [f64; 3],
    /// Base color (r, g, b) before jitter.
    pub base_color: [f64; 3],
}

impl CloudSpec {
    /// Check that all parameters fall inside the sampling ranges.
    pub fn in_sampling_bounds(&self) -> bool {
        let within = |v: f64, (lo, hi): (f64, f64)| v >= lo && v < hi;
        self.center.iter().all(|&v| within(v, CENTER_RANGE))
            && self.spread.iter().all(|&v| within(v, SPREAD_RANGE))
            && self.base_color.iter().all(|&v| within(v, BASE_COLOR_RANGE))
    }
}

/// Clamp a color channel to `[0, 1]`.
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    0.0f64.max(1.0f64.min(value))
}
