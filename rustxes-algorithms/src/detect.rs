//! ROI detection: adaptive thresholding and connected-component labeling.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::collections::HashMap;

use log::debug;
use ndarray::Array2;

use rustxes_core::config::{DetectionConfig, ThresholdMode};
use rustxes_core::error::{DetectionError, Result};
use rustxes_core::frame::{Frame, PixelCoord};
use rustxes_core::roi::{BoundingBox, Roi, RoiId, RoiSet};

/// Detects regions of interest on a set of frames.
///
/// Frames are averaged to suppress shot noise, thresholded adaptively,
/// and partitioned into 8-connected components. Surviving components are
/// ordered by their centroid along the dispersion axis so that region
/// ids are stable across frame sets taken with the same detector
/// configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoiDetector;

impl RoiDetector {
    /// Detects ROIs over the given frames.
    ///
    /// # Errors
    /// - [`DetectionError::EmptyInput`] for an empty frame slice.
    /// - [`DetectionError::FrameShapeMismatch`] when frames disagree on
    ///   dimensions.
    /// - [`DetectionError::NoSignalDetected`] when thresholding (or the
    ///   candidate filters) leave nothing.
    /// - [`DetectionError::AmbiguousRoiCount`] when the detected count
    ///   differs from `expected_roi_count`.
    pub fn detect(frames: &[Frame], config: &DetectionConfig) -> Result<RoiSet> {
        let first = frames.first().ok_or(DetectionError::EmptyInput)?;
        let dims = first.dims();
        for frame in frames {
            if frame.dims() != dims {
                return Err(DetectionError::FrameShapeMismatch {
                    frame: frame.id().as_u64(),
                    expected: dims,
                    found: frame.dims(),
                }
                .into());
            }
        }

        let mut mean = mean_image(frames);
        if let Some(radius) = config.blur_radius {
            // The mean of valid frames is itself a valid frame, so the
            // frame-level blur view applies directly.
            let smoothed = Frame::new(mean, *first.meta())?.boxcar_blurred(radius);
            mean = smoothed.data().clone();
        }

        let threshold = threshold_value(&mean, config.threshold);
        let signal: Vec<PixelCoord> = mean
            .indexed_iter()
            .filter(|(_, &value)| value > threshold)
            .map(|((row, col), _)| PixelCoord::new(row as u16, col as u16))
            .collect();
        if signal.is_empty() {
            return Err(DetectionError::NoSignalDetected.into());
        }
        debug!(
            "threshold {threshold:.3} keeps {} of {} pixels",
            signal.len(),
            dims.0 * dims.1
        );

        let components = label_components(&signal);
        debug!("found {} connected components", components.len());

        let mut candidates: Vec<Roi> = Vec::new();
        let mut dropped_small = 0usize;
        let mut dropped_span = 0usize;
        for pixels in components {
            if pixels.len() < config.min_roi_pixels {
                dropped_small += 1;
                continue;
            }
            // Unwrap is safe: components are never empty.
            let bounds = BoundingBox::from_pixels(&pixels).unwrap();
            // A component spanning the full frame along either axis is a
            // detector artifact (bad row/column), not a reflection.
            if bounds.height() >= dims.0 || bounds.width() >= dims.1 {
                dropped_span += 1;
                continue;
            }
            let (centroid_row, centroid_col) = weighted_centroid(&mean, &pixels);
            candidates.push(Roi {
                id: RoiId(0),
                bounds,
                pixels,
                centroid_row,
                centroid_col,
            });
        }
        if dropped_small + dropped_span > 0 {
            debug!("dropped {dropped_small} undersized and {dropped_span} frame-spanning components");
        }
        if candidates.is_empty() {
            return Err(DetectionError::NoSignalDetected.into());
        }
        if let Some(expected) = config.expected_roi_count {
            if candidates.len() != expected {
                return Err(DetectionError::AmbiguousRoiCount {
                    expected,
                    found: candidates.len(),
                }
                .into());
            }
        }

        let axis = config.dispersion_axis;
        candidates.sort_by(|a, b| {
            a.centroid_along(axis)
                .total_cmp(&b.centroid_along(axis))
                .then(a.centroid_row.total_cmp(&b.centroid_row))
                .then(a.centroid_col.total_cmp(&b.centroid_col))
        });
        for (index, roi) in candidates.iter_mut().enumerate() {
            roi.id = RoiId(index);
        }
        RoiSet::new(candidates, dims, axis)
    }
}

/// Averages the frames into one image.
fn mean_image(frames: &[Frame]) -> Array2<f64> {
    let mut sum = frames[0].data().clone();
    for frame in &frames[1..] {
        sum += frame.data();
    }
    sum / frames.len() as f64
}

/// Computes the adaptive threshold for the given image.
fn threshold_value(image: &Array2<f64>, mode: ThresholdMode) -> f64 {
    match mode {
        ThresholdMode::Percentile(p) => {
            let mut values: Vec<f64> = image.iter().copied().collect();
            values.sort_by(f64::total_cmp);
            let p = p.clamp(0.0, 100.0);
            let index = ((p / 100.0) * (values.len() - 1) as f64).round() as usize;
            values[index]
        }
        ThresholdMode::NoiseFloor(k) => {
            let n = image.len() as f64;
            let mean = image.sum() / n;
            let variance = image.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            mean + k * variance.sqrt()
        }
    }
}

/// Union-Find data structure for connected component detection.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return;
        }

        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] += 1;
            }
        }
    }
}

/// Partitions signal pixels into 8-connected components.
///
/// `signal` must be sorted row-major (which `indexed_iter` guarantees);
/// each pixel is unioned with its already-visited neighbors, so every
/// pair of adjacent pixels is linked exactly once.
fn label_components(signal: &[PixelCoord]) -> Vec<Vec<PixelCoord>> {
    let mut index_of: HashMap<PixelCoord, usize> = HashMap::with_capacity(signal.len());
    for (index, &p) in signal.iter().enumerate() {
        index_of.insert(p, index);
    }

    let mut uf = UnionFind::new(signal.len());
    const EARLIER_NEIGHBORS: [(i32, i32); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];
    for (index, p) in signal.iter().enumerate() {
        for (dr, dc) in EARLIER_NEIGHBORS {
            let row = i32::from(p.row) + dr;
            let col = i32::from(p.col) + dc;
            if row < 0 || col < 0 {
                continue;
            }
            let neighbor = PixelCoord::new(row as u16, col as u16);
            if let Some(&other) = index_of.get(&neighbor) {
                uf.union(index, other);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<PixelCoord>> = HashMap::new();
    for (index, &p) in signal.iter().enumerate() {
        let root = uf.find(index);
        groups.entry(root).or_default().push(p);
    }
    let mut components: Vec<Vec<PixelCoord>> = groups.into_values().collect();
    for pixels in &mut components {
        pixels.sort();
    }
    components
}

/// Intensity-weighted centroid of a pixel set over the given image.
///
/// Falls back to the unweighted centroid if the total weight vanishes.
fn weighted_centroid(image: &Array2<f64>, pixels: &[PixelCoord]) -> (f64, f64) {
    let mut weight = 0.0;
    let mut row_sum = 0.0;
    let mut col_sum = 0.0;
    for p in pixels {
        let w = image[[usize::from(p.row), usize::from(p.col)]];
        weight += w;
        row_sum += w * f64::from(p.row);
        col_sum += w * f64::from(p.col);
    }
    if weight > 0.0 {
        (row_sum / weight, col_sum / weight)
    } else {
        let n = pixels.len() as f64;
        let row_sum: f64 = pixels.iter().map(|p| f64::from(p.row)).sum();
        let col_sum: f64 = pixels.iter().map(|p| f64::from(p.col)).sum();
        (row_sum / n, col_sum / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rustxes_core::error::Error;
    use rustxes_core::frame::{FrameId, FrameMeta};

    fn frame_from(data: Array2<f64>, id: u64) -> Frame {
        Frame::new(data, FrameMeta::new(FrameId(id))).unwrap()
    }

    fn square_blob(image: &mut Array2<f64>, row: usize, col: usize, half: usize, amp: f64) {
        for r in row - half..=row + half {
            for c in col - half..=col + half {
                image[[r, c]] = amp;
            }
        }
    }

    #[test]
    fn test_two_blobs_detected_in_order() {
        let mut data = Array2::<f64>::zeros((32, 32));
        square_blob(&mut data, 10, 24, 2, 50.0);
        square_blob(&mut data, 20, 6, 2, 80.0);
        let frame = frame_from(data, 0);
        let config = DetectionConfig::new()
            .with_threshold(ThresholdMode::Percentile(90.0))
            .with_min_roi_pixels(4);
        let rois = RoiDetector::detect(&[frame], &config).unwrap();
        assert_eq!(rois.len(), 2);
        // Ordered by column centroid: the blob at column 6 comes first.
        let first = rois.get(RoiId(0)).unwrap();
        let second = rois.get(RoiId(1)).unwrap();
        assert_relative_eq!(first.centroid_col, 6.0, epsilon = 1e-9);
        assert_relative_eq!(first.centroid_row, 20.0, epsilon = 1e-9);
        assert_relative_eq!(second.centroid_col, 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_frame_has_no_signal() {
        let frame = frame_from(Array2::<f64>::from_elem((16, 16), 1.0), 0);
        let err = RoiDetector::detect(&[frame], &DetectionConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Detection(DetectionError::NoSignalDetected)
        ));
    }

    #[test]
    fn test_expected_count_mismatch() {
        let mut data = Array2::<f64>::zeros((32, 32));
        square_blob(&mut data, 10, 10, 2, 50.0);
        let frame = frame_from(data, 0);
        let config = DetectionConfig::new()
            .with_threshold(ThresholdMode::Percentile(90.0))
            .with_min_roi_pixels(4)
            .with_expected_roi_count(2);
        let err = RoiDetector::detect(&[frame], &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Detection(DetectionError::AmbiguousRoiCount {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_shape_mismatch_reported() {
        let a = frame_from(Array2::<f64>::zeros((16, 16)), 0);
        let b = frame_from(Array2::<f64>::zeros((16, 8)), 1);
        let err = RoiDetector::detect(&[a, b], &DetectionConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Detection(DetectionError::FrameShapeMismatch { frame: 1, .. })
        ));
    }

    #[test]
    fn test_full_width_artifact_rejected() {
        let mut data = Array2::<f64>::zeros((32, 32));
        // A bad detector row lights up the full frame width.
        for col in 0..32 {
            data[[5, col]] = 90.0;
        }
        square_blob(&mut data, 20, 16, 2, 50.0);
        let frame = frame_from(data, 0);
        let config = DetectionConfig::new()
            .with_threshold(ThresholdMode::Percentile(90.0))
            .with_min_roi_pixels(4);
        let rois = RoiDetector::detect(&[frame], &config).unwrap();
        assert_eq!(rois.len(), 1);
        assert_relative_eq!(rois.get(RoiId(0)).unwrap().centroid_row, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_noise_floor_threshold() {
        let mut data = Array2::<f64>::from_elem((32, 32), 1.0);
        square_blob(&mut data, 16, 16, 2, 100.0);
        let frame = frame_from(data, 0);
        let config = DetectionConfig::new()
            .with_threshold(ThresholdMode::NoiseFloor(3.0))
            .with_min_roi_pixels(4);
        let rois = RoiDetector::detect(&[frame], &config).unwrap();
        assert_eq!(rois.len(), 1);
        assert_eq!(rois.get(RoiId(0)).unwrap().pixel_count(), 25);
    }

    #[test]
    fn test_blur_bridges_single_pixel_gap() {
        // Two halves of one reflection, split by a dead column at 12.
        let mut data = Array2::<f64>::zeros((32, 32));
        square_blob(&mut data, 10, 10, 1, 60.0);
        square_blob(&mut data, 10, 14, 1, 60.0);
        let frame = frame_from(data, 0);
        let config = DetectionConfig::new()
            .with_threshold(ThresholdMode::NoiseFloor(2.0))
            .with_min_roi_pixels(4)
            .with_blur_radius(1);
        let rois = RoiDetector::detect(&[frame], &config).unwrap();
        assert_eq!(rois.len(), 1);
    }

    #[test]
    fn test_diagonal_pixels_form_one_component() {
        let signal = vec![
            PixelCoord::new(0, 0),
            PixelCoord::new(1, 1),
            PixelCoord::new(2, 2),
            PixelCoord::new(5, 5),
        ];
        let mut components = label_components(&signal);
        components.sort_by_key(|c| c.len());
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 1);
        assert_eq!(components[1].len(), 3);
    }
}
