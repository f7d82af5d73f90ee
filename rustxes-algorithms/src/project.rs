//! Dispersion-axis projection of ROI intensities.
//!
//! Calibration and extraction must project identically for the fitted
//! peak coordinates to stay meaningful, so both stages go through this
//! module. Coordinates are absolute detector pixel indices along the
//! dispersion axis, not ROI-relative offsets.
#![allow(clippy::cast_precision_loss)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rustxes_core::config::Axis;
use rustxes_core::frame::Frame;
use rustxes_core::roi::Roi;

/// A 1D intensity profile along the dispersion axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Profile {
    /// Absolute coordinate of the first entry along the dispersion axis.
    pub axis_start: u16,
    /// Summed intensity per coordinate.
    pub weights: Vec<f64>,
    /// Number of mask pixels per coordinate.
    pub pixels: Vec<u64>,
}

impl Profile {
    /// Number of coordinates covered by the profile.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns true if the profile covers no coordinates.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Absolute coordinate of the entry at `offset`.
    #[inline]
    #[must_use]
    pub fn coordinate(&self, offset: usize) -> f64 {
        f64::from(self.axis_start) + offset as f64
    }

    /// Total intensity over the profile.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Projects an ROI's masked intensities onto the dispersion axis.
///
/// Sums intensity across the perpendicular axis for every coordinate in
/// the ROI's bounding range, producing one weight (and mask pixel count)
/// per dispersion-axis coordinate.
#[must_use]
pub fn project(frame: &Frame, roi: &Roi, axis: Axis) -> Profile {
    let (lo, hi) = roi.bounds.range_along(axis);
    let len = usize::from(hi - lo) + 1;
    let mut weights = vec![0.0; len];
    let mut pixels = vec![0u64; len];
    for p in &roi.pixels {
        let offset = usize::from(axis.coord_of(p.row, p.col) - lo);
        weights[offset] += frame.intensity(usize::from(p.row), usize::from(p.col));
        pixels[offset] += 1;
    }
    Profile {
        axis_start: lo,
        weights,
        pixels,
    }
}
