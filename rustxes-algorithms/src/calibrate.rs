//! Calibration fitting: projected peaks against known incident energies.
#![allow(clippy::cast_precision_loss)]

use log::warn;

use rustxes_core::calibration::{
    CalibrationPoint, EnergyCalibration, QualityWarning, RoiCalibration,
};
use rustxes_core::config::CalibrationConfig;
use rustxes_core::error::{CalibrationError, Result};
use rustxes_core::frame::Frame;
use rustxes_core::roi::{Roi, RoiSet};

use crate::peak::{count_comparable_peaks, dominant_window, CentroidLocator, PeakLocator};
use crate::project::project;

/// Number of evaluation points for the monotonicity check.
const MONOTONICITY_SAMPLES: usize = 129;

/// Fits a pixel-to-energy mapping per ROI from calibration frames.
///
/// For each ROI and each calibration frame, the masked intensities are
/// projected onto the dispersion axis and the profile peak located; the
/// peak coordinate pairs with the frame's known incident energy. A
/// low-order polynomial is fitted through the collected pairs and
/// verified to be monotonic over the sampled coordinate range.
#[derive(Debug, Clone)]
pub struct CalibrationFitter<L = CentroidLocator> {
    config: CalibrationConfig,
    locator: L,
}

impl CalibrationFitter<CentroidLocator> {
    /// Creates a fitter with the default centroid peak locator.
    #[must_use]
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            locator: CentroidLocator,
        }
    }
}

impl<L: PeakLocator> CalibrationFitter<L> {
    /// Creates a fitter with a custom peak localization strategy.
    #[must_use]
    pub fn with_locator(config: CalibrationConfig, locator: L) -> Self {
        Self { config, locator }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Fits the calibration mapping for every ROI in the set.
    ///
    /// # Errors
    /// - [`CalibrationError::EmptyInput`] for an empty frame slice.
    /// - [`CalibrationError::FrameShapeMismatch`] when a frame does not
    ///   match the ROI set's originating dimensions.
    /// - [`CalibrationError::MissingIncidentEnergy`] for a calibration
    ///   frame without a known energy.
    /// - [`CalibrationError::InsufficientCalibrationPoints`] when an ROI
    ///   sees fewer than two distinct energies.
    /// - [`CalibrationError::CalibrationInconsistent`] when the fitted
    ///   mapping is not monotonic over the sampled range.
    pub fn fit(&self, frames: &[Frame], rois: &RoiSet) -> Result<EnergyCalibration> {
        if frames.is_empty() {
            return Err(CalibrationError::EmptyInput.into());
        }
        for frame in frames {
            if frame.dims() != rois.frame_dims() {
                return Err(CalibrationError::FrameShapeMismatch {
                    frame: frame.id().as_u64(),
                    expected: rois.frame_dims(),
                    found: frame.dims(),
                }
                .into());
            }
            if frame.incident_energy().is_none() {
                return Err(CalibrationError::MissingIncidentEnergy {
                    frame: frame.id().as_u64(),
                }
                .into());
            }
        }

        let mut mappings = Vec::with_capacity(rois.len());
        let mut warnings = Vec::new();
        for roi in rois.iter() {
            let mapping = self.fit_roi(frames, rois, roi, &mut warnings)?;
            mappings.push(mapping);
        }
        Ok(EnergyCalibration::new(mappings, warnings))
    }

    fn fit_roi(
        &self,
        frames: &[Frame],
        rois: &RoiSet,
        roi: &Roi,
        warnings: &mut Vec<QualityWarning>,
    ) -> Result<RoiCalibration> {
        let mut samples: Vec<CalibrationPoint> = Vec::with_capacity(frames.len());
        for frame in frames {
            // Energy presence was validated up front.
            let energy = frame.incident_energy().unwrap();
            let profile = project(frame, roi, rois.dispersion_axis());
            let peaks = count_comparable_peaks(&profile, self.config.peak_ambiguity_fraction);
            if peaks > 1 {
                warn!(
                    "frame {}, ROI {}: {peaks} comparable peaks, using the highest",
                    frame.id(),
                    roi.id
                );
                warnings.push(QualityWarning::MultiplePeaks {
                    frame: frame.id(),
                    roi: roi.id,
                    peaks,
                });
            }
            // Locate within the dominant peak's window so secondary peaks
            // cannot drag the estimate.
            let window = dominant_window(&profile);
            if let Some(coordinate) = self.locator.locate(&window) {
                samples.push(CalibrationPoint { coordinate, energy });
            }
        }

        let mut energies: Vec<f64> = samples.iter().map(|s| s.energy).collect();
        energies.sort_by(f64::total_cmp);
        energies.dedup();
        if energies.len() < 2 {
            return Err(CalibrationError::InsufficientCalibrationPoints {
                roi: roi.id.as_usize(),
                distinct: energies.len(),
            }
            .into());
        }

        let xs: Vec<f64> = samples.iter().map(|s| s.coordinate).collect();
        let ys: Vec<f64> = samples.iter().map(|s| s.energy).collect();
        let order = self.config.fit_order.max(1).min(samples.len() - 1);
        let coeffs = polyfit(&xs, &ys, order).ok_or(CalibrationError::CalibrationInconsistent {
            roi: roi.id.as_usize(),
        })?;

        let coord_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let coord_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !is_monotonic(&coeffs, coord_min, coord_max) {
            return Err(CalibrationError::CalibrationInconsistent {
                roi: roi.id.as_usize(),
            }
            .into());
        }
        Ok(RoiCalibration::new(
            roi.id, coeffs, coord_min, coord_max, samples,
        ))
    }
}

/// Least-squares polynomial fit via the normal equations.
///
/// Returns coefficients in ascending powers, or `None` when the system
/// is singular (e.g. all sample coordinates coincide).
fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> Option<Vec<f64>> {
    let terms = order + 1;
    // Normal matrix entries are power sums sum(x^(i+j)).
    let mut power_sums = vec![0.0; 2 * order + 1];
    for &x in xs {
        let mut p = 1.0;
        for sum in &mut power_sums {
            *sum += p;
            p *= x;
        }
    }
    let mut matrix = vec![vec![0.0; terms]; terms];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, entry) in row.iter_mut().enumerate() {
            *entry = power_sums[i + j];
        }
    }
    let mut rhs = vec![0.0; terms];
    for (&x, &y) in xs.iter().zip(ys) {
        let mut p = 1.0;
        for r in &mut rhs {
            *r += p * y;
            p *= x;
        }
    }
    solve(matrix, rhs)
}

/// Solves a small dense linear system by Gaussian elimination with
/// partial pivoting.
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))?;
        if matrix[pivot][col].abs() < 1e-12 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);
        let pivot_row = matrix[col].clone();
        let pivot_rhs = rhs[col];
        for row in col + 1..n {
            let factor = matrix[row][col] / pivot_row[col];
            for (k, &pivot_value) in pivot_row.iter().enumerate().skip(col) {
                matrix[row][k] -= factor * pivot_value;
            }
            rhs[row] -= factor * pivot_rhs;
        }
    }
    let mut solution = vec![0.0; n];
    for col in (0..n).rev() {
        let mut value = rhs[col];
        for k in col + 1..n {
            value -= matrix[col][k] * solution[k];
        }
        solution[col] = value / matrix[col][col];
    }
    Some(solution)
}

/// Checks strict monotonicity (in either direction) of the polynomial
/// over `[lo, hi]`, sampled densely.
fn is_monotonic(coeffs: &[f64], lo: f64, hi: f64) -> bool {
    let eval = |x: f64| coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c);
    let step = (hi - lo) / (MONOTONICITY_SAMPLES - 1) as f64;
    let mut increasing = true;
    let mut decreasing = true;
    let mut previous = eval(lo);
    for i in 1..MONOTONICITY_SAMPLES {
        let value = eval(lo + step * i as f64);
        if value <= previous {
            increasing = false;
        }
        if value >= previous {
            decreasing = false;
        }
        previous = value;
    }
    increasing || decreasing
}
