//! Pixel-to-energy calibration mappings.
//!
//! A calibration maps a 1D projected pixel coordinate along the dispersion
//! axis to an energy, per ROI. Mappings are only defined inside the fitted
//! coordinate range; queries outside it return `None` so extrapolated
//! energies never enter a spectrum unnoticed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::frame::FrameId;
use crate::roi::RoiId;

/// One fitted (coordinate, energy) sample pair, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationPoint {
    /// Peak position along the dispersion axis, in pixels.
    pub coordinate: f64,
    /// Known incident energy in eV.
    pub energy: f64,
}

/// Non-fatal calibration quality conditions, reported alongside results.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum QualityWarning {
    /// Several comparable peaks were found in an ROI profile; the highest
    /// was used.
    MultiplePeaks {
        /// Frame the ambiguous profile came from.
        frame: FrameId,
        /// ROI whose profile was ambiguous.
        roi: RoiId,
        /// Number of comparable peaks.
        peaks: usize,
    },
}

impl std::fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityWarning::MultiplePeaks { frame, roi, peaks } => write!(
                f,
                "frame {frame}, ROI {roi}: {peaks} comparable peaks, highest used"
            ),
        }
    }
}

/// Polynomial coordinate-to-energy mapping for one ROI.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiCalibration {
    /// ROI this mapping belongs to.
    pub roi: RoiId,
    /// Polynomial coefficients in ascending powers.
    coeffs: Vec<f64>,
    /// Lower edge of the fitted coordinate range.
    coord_min: f64,
    /// Upper edge of the fitted coordinate range.
    coord_max: f64,
    /// The sample pairs the fit was built from.
    pub samples: Vec<CalibrationPoint>,
}

impl RoiCalibration {
    /// Creates a mapping from fitted coefficients and the sampled range.
    #[must_use]
    pub fn new(
        roi: RoiId,
        coeffs: Vec<f64>,
        coord_min: f64,
        coord_max: f64,
        samples: Vec<CalibrationPoint>,
    ) -> Self {
        Self {
            roi,
            coeffs,
            coord_min,
            coord_max,
            samples,
        }
    }

    /// Evaluates the polynomial at `coord` without a range check.
    ///
    /// Used for monotonicity verification and diagnostics; spectrum
    /// extraction must go through [`RoiCalibration::energy_at`].
    #[must_use]
    pub fn evaluate(&self, coord: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * coord + c)
    }

    /// Returns the energy at `coord`, or `None` outside the fitted range.
    #[must_use]
    pub fn energy_at(&self, coord: f64) -> Option<f64> {
        if coord < self.coord_min || coord > self.coord_max {
            None
        } else {
            Some(self.evaluate(coord))
        }
    }

    /// The fitted coordinate range as (min, max).
    #[inline]
    #[must_use]
    pub fn coord_range(&self) -> (f64, f64) {
        (self.coord_min, self.coord_max)
    }

    /// The energy range spanned over the fitted coordinates as (min, max).
    ///
    /// Valid because mappings are verified monotonic before construction,
    /// so the extrema sit at the range edges.
    #[must_use]
    pub fn energy_range(&self) -> (f64, f64) {
        let lo = self.evaluate(self.coord_min);
        let hi = self.evaluate(self.coord_max);
        if lo <= hi {
            (lo, hi)
        } else {
            (hi, lo)
        }
    }

    /// Polynomial coefficients in ascending powers.
    #[inline]
    #[must_use]
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }
}

/// The complete calibration for an ROI set: one mapping per ROI plus any
/// quality warnings accumulated while fitting.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyCalibration {
    mappings: Vec<RoiCalibration>,
    warnings: Vec<QualityWarning>,
}

impl EnergyCalibration {
    /// Creates a calibration from per-ROI mappings, sorted by ROI id.
    #[must_use]
    pub fn new(mut mappings: Vec<RoiCalibration>, warnings: Vec<QualityWarning>) -> Self {
        mappings.sort_by_key(|m| m.roi);
        Self { mappings, warnings }
    }

    /// Returns the mapping for the given ROI.
    #[must_use]
    pub fn get(&self, id: RoiId) -> Option<&RoiCalibration> {
        self.mappings.iter().find(|m| m.roi == id)
    }

    /// Returns the number of mapped ROIs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns true if no ROI is mapped.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Iterates over the per-ROI mappings in id order.
    pub fn iter(&self) -> impl Iterator<Item = &RoiCalibration> {
        self.mappings.iter()
    }

    /// Quality warnings recorded during fitting.
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[QualityWarning] {
        &self.warnings
    }
}
