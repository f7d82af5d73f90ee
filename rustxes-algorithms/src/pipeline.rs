//! High-level helpers that combine pipeline stages.

use log::debug;
use rayon::prelude::*;

use rustxes_core::calibration::EnergyCalibration;
use rustxes_core::config::{CalibrationConfig, DetectionConfig, ExtractionConfig};
use rustxes_core::error::{Error, Result};
use rustxes_core::frame::Frame;
use rustxes_core::roi::RoiSet;

use crate::aggregate::SpectraAggregator;
use crate::calibrate::CalibrationFitter;
use crate::detect::RoiDetector;
use crate::extract::SpectrumExtractor;

/// Detects ROIs on the calibration frames and fits their calibration in
/// one call.
///
/// # Errors
/// Propagates detection and calibration errors unchanged.
pub fn calibrate_pipeline(
    calibration_frames: &[Frame],
    detection: &DetectionConfig,
    calibration: &CalibrationConfig,
) -> Result<(RoiSet, EnergyCalibration)> {
    let rois = RoiDetector::detect(calibration_frames, detection)?;
    debug!("detected {} ROIs for calibration", rois.len());
    let fitter = CalibrationFitter::new(calibration.clone());
    let mapping = fitter.fit(calibration_frames, &rois)?;
    Ok((rois, mapping))
}

/// Extracts and aggregates spectra from a batch of experimental frames.
///
/// Frames are processed in parallel; per-frame results are folded into
/// one aggregator through the associative merge, so the reduction order
/// does not affect the outcome beyond floating-point rounding.
///
/// # Errors
/// Propagates the first extraction or aggregation failure.
pub fn extract_batch(
    frames: &[Frame],
    rois: &RoiSet,
    calibration: &EnergyCalibration,
    config: &ExtractionConfig,
) -> Result<SpectraAggregator> {
    frames
        .par_iter()
        .map(|frame| -> Result<SpectraAggregator> {
            let spectra = SpectrumExtractor::extract(frame, rois, calibration, config)?;
            SpectraAggregator::new(config.energy_bin_width)
                .merge_all(spectra.values())
                .map_err(Error::from)
        })
        .try_reduce(
            || SpectraAggregator::new(config.energy_bin_width),
            |a, b| a.combine(&b).map_err(Error::from),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rustxes_core::config::ThresholdMode;
    use rustxes_core::frame::{FrameId, FrameMeta};
    use rustxes_core::roi::RoiId;

    /// Builds a calibration frame with a three-column stripe centered at
    /// `col` inside each of two fixed regions. Stripe centers two columns
    /// apart overlap, so the mean over a calibration sweep is a single
    /// connected band per region.
    fn calibration_frame(id: u64, energy: f64, col: usize) -> Frame {
        let mut data = Array2::<f64>::zeros((24, 48));
        for c in col - 1..=col + 1 {
            for row in 4..8 {
                data[[row, c]] = 100.0;
            }
            for row in 14..18 {
                data[[row, c]] = 80.0;
            }
        }
        Frame::new(
            data,
            FrameMeta::new(FrameId(id)).with_incident_energy(energy),
        )
        .unwrap()
    }

    fn experimental_frame(id: u64, col: usize, amplitude: f64) -> Frame {
        let mut data = Array2::<f64>::zeros((24, 48));
        for row in 4..8 {
            data[[row, col]] = amplitude;
        }
        Frame::new(data, FrameMeta::new(FrameId(id))).unwrap()
    }

    /// A calibration sweep across columns 10..=20, linear in energy:
    /// e = 7900 + 10 * col.
    fn calibration_sweep() -> Vec<Frame> {
        [10, 12, 14, 16, 18, 20]
            .iter()
            .enumerate()
            .map(|(id, &col)| {
                calibration_frame(id as u64, 7900.0 + 10.0 * col as f64, col as usize)
            })
            .collect()
    }

    #[test]
    fn test_calibrate_then_extract_batch() {
        let calib = calibration_sweep();
        let detection = DetectionConfig::new()
            .with_threshold(ThresholdMode::Percentile(90.0))
            .with_min_roi_pixels(3)
            .with_expected_roi_count(2);
        let (rois, mapping) =
            calibrate_pipeline(&calib, &detection, &CalibrationConfig::default()).unwrap();
        assert_eq!(rois.len(), 2);
        assert!(mapping.warnings().is_empty());

        let config = ExtractionConfig::new().with_energy_bin_width(10.0);
        let frames = vec![
            experimental_frame(10, 15, 25.0),
            experimental_frame(11, 15, 75.0),
        ];
        let aggregated = extract_batch(&frames, &rois, &mapping, &config).unwrap();
        let roi0 = aggregated.get(RoiId(0)).unwrap();
        assert_eq!(roi0.frames(), 2);
        // All mass maps to 8050 eV, global bin 805.
        assert_relative_eq!(roi0.intensity_sum(805), 400.0);
    }

    #[test]
    fn test_batch_matches_sequential_extraction() {
        let calib = calibration_sweep();
        let detection = DetectionConfig::new()
            .with_threshold(ThresholdMode::Percentile(90.0))
            .with_min_roi_pixels(3);
        let (rois, mapping) =
            calibrate_pipeline(&calib, &detection, &CalibrationConfig::default()).unwrap();
        let config = ExtractionConfig::new().with_energy_bin_width(10.0);
        let frames = vec![
            experimental_frame(10, 12, 5.0),
            experimental_frame(11, 15, 7.0),
            experimental_frame(12, 18, 11.0),
        ];

        let parallel = extract_batch(&frames, &rois, &mapping, &config).unwrap();
        let mut sequential = SpectraAggregator::new(10.0);
        for frame in &frames {
            let spectra = SpectrumExtractor::extract(frame, &rois, &mapping, &config).unwrap();
            sequential = sequential.merge_all(spectra.values()).unwrap();
        }
        for (roi, aggregate) in sequential.iter() {
            let other = parallel.get(roi).unwrap();
            assert_eq!(aggregate.frames(), other.frames());
            for bin in aggregate.bins() {
                assert_relative_eq!(
                    bin.stats.sum,
                    other.intensity_sum(bin.index),
                    max_relative = 1e-12
                );
            }
        }
    }
}
