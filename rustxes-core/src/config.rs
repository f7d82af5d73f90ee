//! Pipeline configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pixel axis of the detector frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    /// The row axis (vertical position).
    Row,
    /// The column axis (horizontal position).
    #[default]
    Column,
}

impl Axis {
    /// Returns the coordinate of a pixel along this axis.
    #[inline]
    #[must_use]
    pub fn coord_of(self, row: u16, col: u16) -> u16 {
        match self {
            Axis::Row => row,
            Axis::Column => col,
        }
    }

    /// Returns the frame extent along this axis, given (rows, cols).
    #[inline]
    #[must_use]
    pub fn extent_of(self, dims: (usize, usize)) -> usize {
        match self {
            Axis::Row => dims.0,
            Axis::Column => dims.1,
        }
    }
}

/// Adaptive threshold policy for separating signal from background.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMode {
    /// Threshold at the given percentile (0-100) of pixel intensities.
    Percentile(f64),
    /// Threshold at `mean + k * stddev` of pixel intensities.
    NoiseFloor(f64),
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Percentile(98.0)
    }
}

/// Configuration for ROI detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionConfig {
    /// Threshold policy for the binary signal mask.
    pub threshold: ThresholdMode,
    /// Axis along which energy varies within an ROI.
    pub dispersion_axis: Axis,
    /// Minimum pixel count for a component to become an ROI.
    pub min_roi_pixels: usize,
    /// Expected number of ROIs; a differing detection count is an error.
    pub expected_roi_count: Option<usize>,
    /// Boxcar blur radius applied to the mean image before thresholding.
    pub blur_radius: Option<usize>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdMode::default(),
            dispersion_axis: Axis::default(),
            min_roi_pixels: 20,
            expected_roi_count: None,
            blur_radius: None,
        }
    }
}

impl DetectionConfig {
    /// Creates a new detection configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the threshold policy.
    #[must_use]
    pub fn with_threshold(mut self, threshold: ThresholdMode) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the dispersion axis.
    #[must_use]
    pub fn with_dispersion_axis(mut self, axis: Axis) -> Self {
        self.dispersion_axis = axis;
        self
    }

    /// Sets the minimum pixel count per ROI.
    #[must_use]
    pub fn with_min_roi_pixels(mut self, count: usize) -> Self {
        self.min_roi_pixels = count;
        self
    }

    /// Sets the expected ROI count.
    #[must_use]
    pub fn with_expected_roi_count(mut self, count: usize) -> Self {
        self.expected_roi_count = Some(count);
        self
    }

    /// Sets the pre-threshold blur radius.
    #[must_use]
    pub fn with_blur_radius(mut self, radius: usize) -> Self {
        self.blur_radius = Some(radius);
        self
    }
}

/// Configuration for calibration fitting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationConfig {
    /// Polynomial order of the coordinate-to-energy fit (1 = linear).
    ///
    /// Clamped to `n_points - 1` when fewer calibration points are
    /// available than the requested order needs.
    pub fit_order: usize,
    /// A secondary profile peak at or above this fraction of the primary
    /// peak amplitude triggers a multi-peak quality warning.
    pub peak_ambiguity_fraction: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            fit_order: 1,
            peak_ambiguity_fraction: 0.5,
        }
    }
}

impl CalibrationConfig {
    /// Creates a new calibration configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the polynomial fit order.
    #[must_use]
    pub fn with_fit_order(mut self, order: usize) -> Self {
        self.fit_order = order;
        self
    }

    /// Sets the multi-peak ambiguity fraction.
    #[must_use]
    pub fn with_peak_ambiguity_fraction(mut self, fraction: f64) -> Self {
        self.peak_ambiguity_fraction = fraction;
        self
    }
}

/// Configuration for spectrum extraction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractionConfig {
    /// Width of the uniform energy bins in eV.
    ///
    /// Must be identical across frames and ROIs that will be aggregated
    /// together.
    pub energy_bin_width: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            energy_bin_width: 0.5,
        }
    }
}

impl ExtractionConfig {
    /// Creates a new extraction configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the energy bin width in eV.
    #[must_use]
    pub fn with_energy_bin_width(mut self, width: f64) -> Self {
        self.energy_bin_width = width;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_coord() {
        assert_eq!(Axis::Row.coord_of(3, 7), 3);
        assert_eq!(Axis::Column.coord_of(3, 7), 7);
        assert_eq!(Axis::Row.extent_of((10, 20)), 10);
        assert_eq!(Axis::Column.extent_of((10, 20)), 20);
    }

    #[test]
    fn test_detection_builder() {
        let config = DetectionConfig::new()
            .with_threshold(ThresholdMode::NoiseFloor(3.0))
            .with_min_roi_pixels(5)
            .with_expected_roi_count(4);
        assert_eq!(config.threshold, ThresholdMode::NoiseFloor(3.0));
        assert_eq!(config.min_roi_pixels, 5);
        assert_eq!(config.expected_roi_count, Some(4));
    }
}
