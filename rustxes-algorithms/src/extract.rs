//! Spectrum extraction: calibrated projection onto the energy bin grid.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::collections::BTreeMap;

use log::debug;

use rustxes_core::calibration::EnergyCalibration;
use rustxes_core::config::ExtractionConfig;
use rustxes_core::error::{Error, ExtractionError, Result};
use rustxes_core::frame::Frame;
use rustxes_core::roi::{RoiId, RoiSet};
use rustxes_core::spectrum::{bin_index, Spectrum};

use crate::project::project;

/// Extracts per-ROI energy spectra from one experimental frame.
///
/// Projection is identical to the one used while fitting the
/// calibration, so peak coordinates and extracted coordinates live on
/// the same axis. Pixels whose coordinate falls outside an ROI's fitted
/// calibration range are excluded from the spectrum and reported through
/// the spectrum's out-of-range count.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectrumExtractor;

impl SpectrumExtractor {
    /// Extracts one spectrum per ROI.
    ///
    /// # Errors
    /// - [`ExtractionError::FrameShapeMismatch`] when the frame does not
    ///   match the ROI set's originating dimensions.
    /// - [`ExtractionError::RoiMappingMissing`] when an ROI has no entry
    ///   in the calibration.
    /// - [`Error::Config`] for a non-positive bin width.
    pub fn extract(
        frame: &Frame,
        rois: &RoiSet,
        calibration: &EnergyCalibration,
        config: &ExtractionConfig,
    ) -> Result<BTreeMap<RoiId, Spectrum>> {
        let bin_width = config.energy_bin_width;
        if !bin_width.is_finite() || bin_width <= 0.0 {
            return Err(Error::Config(format!(
                "energy_bin_width must be positive, got {bin_width}"
            )));
        }
        if frame.dims() != rois.frame_dims() {
            return Err(ExtractionError::FrameShapeMismatch {
                frame: frame.id().as_u64(),
                expected: rois.frame_dims(),
                found: frame.dims(),
            }
            .into());
        }

        let mut spectra = BTreeMap::new();
        for roi in rois.iter() {
            let mapping = calibration
                .get(roi.id)
                .ok_or(ExtractionError::RoiMappingMissing {
                    roi: roi.id.as_usize(),
                })?;

            let profile = project(frame, roi, rois.dispersion_axis());
            let mut bins: BTreeMap<i64, (f64, u64)> = BTreeMap::new();
            let mut out_of_range = 0u64;
            for offset in 0..profile.len() {
                let coordinate = profile.coordinate(offset);
                match mapping.energy_at(coordinate) {
                    Some(energy) => {
                        let entry = bins.entry(bin_index(energy, bin_width)).or_insert((0.0, 0));
                        entry.0 += profile.weights[offset];
                        entry.1 += profile.pixels[offset];
                    }
                    None => out_of_range += profile.pixels[offset],
                }
            }
            if out_of_range > 0 {
                debug!(
                    "frame {}, ROI {}: {out_of_range} pixels outside the fitted range",
                    frame.id(),
                    roi.id
                );
            }

            let spectrum = match (bins.keys().next(), bins.keys().next_back()) {
                (Some(&first), Some(&last)) => {
                    let len = (last - first + 1) as usize;
                    let mut intensities = vec![0.0; len];
                    let mut pixel_counts = vec![0u64; len];
                    for (&index, &(intensity, pixels)) in &bins {
                        let offset = (index - first) as usize;
                        intensities[offset] = intensity;
                        pixel_counts[offset] = pixels;
                    }
                    Spectrum::from_bins(
                        roi.id,
                        bin_width,
                        first,
                        intensities,
                        pixel_counts,
                        out_of_range,
                    )
                }
                _ => Spectrum::from_bins(roi.id, bin_width, 0, Vec::new(), Vec::new(), out_of_range),
            };
            spectra.insert(roi.id, spectrum);
        }
        Ok(spectra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rustxes_core::calibration::RoiCalibration;
    use rustxes_core::config::Axis;
    use rustxes_core::frame::{FrameId, FrameMeta, PixelCoord};
    use rustxes_core::roi::{BoundingBox, Roi};

    fn rect_roi(id: usize, rows: (u16, u16), cols: (u16, u16)) -> Roi {
        let mut pixels = Vec::new();
        for row in rows.0..=rows.1 {
            for col in cols.0..=cols.1 {
                pixels.push(PixelCoord::new(row, col));
            }
        }
        let bounds = BoundingBox::from_pixels(&pixels).unwrap();
        let centroid_col = f64::from(cols.0 + cols.1) / 2.0;
        Roi {
            id: RoiId(id),
            bounds,
            pixels,
            centroid_row: f64::from(rows.0 + rows.1) / 2.0,
            centroid_col,
        }
    }

    fn linear_calibration() -> EnergyCalibration {
        // e = 7900 + 10 * col over cols [10, 20]
        EnergyCalibration::new(
            vec![RoiCalibration::new(
                RoiId(0),
                vec![7900.0, 10.0],
                10.0,
                20.0,
                Vec::new(),
            )],
            Vec::new(),
        )
    }

    #[test]
    fn test_mass_lands_in_calibrated_bin() {
        let roi = rect_roi(0, (2, 4), (8, 22));
        let rois = RoiSet::new(vec![roi], (8, 32), Axis::Column).unwrap();
        let mut data = Array2::<f64>::zeros((8, 32));
        data[[2, 15]] = 30.0;
        data[[3, 15]] = 70.0;
        let frame = Frame::new(data, FrameMeta::new(FrameId(7))).unwrap();
        let config = ExtractionConfig::new().with_energy_bin_width(10.0);
        let spectra =
            SpectrumExtractor::extract(&frame, &rois, &linear_calibration(), &config).unwrap();
        let spectrum = &spectra[&RoiId(0)];
        // Pixel 15 maps to 8050 eV, which lives in global bin 805.
        assert_relative_eq!(spectrum.intensity(805), 100.0);
        assert_relative_eq!(spectrum.total_intensity(), 100.0);
    }

    #[test]
    fn test_out_of_range_pixels_counted() {
        let roi = rect_roi(0, (2, 4), (8, 22));
        let rois = RoiSet::new(vec![roi], (8, 32), Axis::Column).unwrap();
        let mut data = Array2::<f64>::zeros((8, 32));
        data[[2, 9]] = 5.0; // column 9 is outside the fitted range [10, 20]
        data[[2, 12]] = 7.0;
        let frame = Frame::new(data, FrameMeta::new(FrameId(7))).unwrap();
        let config = ExtractionConfig::new().with_energy_bin_width(10.0);
        let spectra =
            SpectrumExtractor::extract(&frame, &rois, &linear_calibration(), &config).unwrap();
        let spectrum = &spectra[&RoiId(0)];
        // Columns 8, 9, 21, 22 lie outside [10, 20]: 4 columns x 3 rows.
        assert_eq!(spectrum.out_of_range(), 12);
        assert_relative_eq!(spectrum.total_intensity(), 7.0);
    }

    #[test]
    fn test_missing_mapping_is_an_error() {
        let a = rect_roi(0, (0, 1), (0, 3));
        let b = rect_roi(1, (4, 5), (0, 3));
        let rois = RoiSet::new(vec![a, b], (8, 8), Axis::Column).unwrap();
        let frame = Frame::new(Array2::<f64>::zeros((8, 8)), FrameMeta::new(FrameId(0))).unwrap();
        let err = SpectrumExtractor::extract(
            &frame,
            &rois,
            &linear_calibration(),
            &ExtractionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::RoiMappingMissing { roi: 1 })
        ));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let roi = rect_roi(0, (2, 4), (8, 22));
        let rois = RoiSet::new(vec![roi], (8, 32), Axis::Column).unwrap();
        let frame = Frame::new(Array2::<f64>::zeros((8, 16)), FrameMeta::new(FrameId(3))).unwrap();
        let err = SpectrumExtractor::extract(
            &frame,
            &rois,
            &linear_calibration(),
            &ExtractionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::FrameShapeMismatch { frame: 3, .. })
        ));
    }
}
