//! Detector frames and acquisition metadata.

use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Acquisition identifier for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameId(pub u64);

impl FrameId {
    /// Creates a new frame id.
    #[inline]
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel coordinate on the detector, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoord {
    /// Row index (vertical position).
    pub row: u16,
    /// Column index (horizontal position).
    pub col: u16,
}

impl PixelCoord {
    /// Creates a new pixel coordinate.
    #[inline]
    #[must_use]
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Checks if this coordinate is adjacent to another (8-connectivity).
    #[inline]
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        let dr = (i32::from(self.row) - i32::from(other.row)).abs();
        let dc = (i32::from(self.col) - i32::from(other.col)).abs();
        dr <= 1 && dc <= 1 && (dr != 0 || dc != 0)
    }
}

/// Acquisition metadata attached to a frame.
///
/// `incident_energy` is known only for calibration frames; experimental
/// frames leave it unset.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameMeta {
    /// Acquisition id.
    pub id: FrameId,
    /// Incident beam energy in eV, if known.
    pub incident_energy: Option<f64>,
    /// Acquisition timestamp in nanoseconds since the epoch.
    pub timestamp: u64,
    /// Exposure time in seconds, if recorded.
    pub exposure: Option<f64>,
}

impl FrameMeta {
    /// Creates metadata with the given acquisition id.
    #[must_use]
    pub fn new(id: FrameId) -> Self {
        Self {
            id,
            incident_energy: None,
            timestamp: 0,
            exposure: None,
        }
    }

    /// Sets the incident beam energy in eV.
    #[must_use]
    pub fn with_incident_energy(mut self, energy: f64) -> Self {
        self.incident_energy = Some(energy);
        self
    }

    /// Sets the acquisition timestamp in nanoseconds.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the exposure time in seconds.
    #[must_use]
    pub fn with_exposure(mut self, exposure: f64) -> Self {
        self.exposure = Some(exposure);
        self
    }
}

/// A raw detector frame: a 2D array of non-negative intensities plus
/// acquisition metadata. Immutable once captured.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Array2<f64>,
    meta: FrameMeta,
}

impl Frame {
    /// Creates a frame after validating the intensity array.
    ///
    /// # Errors
    /// Returns [`Error::EmptyFrame`] for zero-sized arrays and
    /// [`Error::InvalidIntensity`] if any value is negative or non-finite.
    pub fn new(data: Array2<f64>, meta: FrameMeta) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyFrame { rows, cols });
        }
        for ((row, col), &value) in data.indexed_iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidIntensity { row, col, value });
            }
        }
        Ok(Self { data, meta })
    }

    /// Returns the frame dimensions as (rows, columns).
    #[inline]
    #[must_use]
    pub fn dims(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Returns the intensity array.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Returns the acquisition metadata.
    #[inline]
    #[must_use]
    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    /// Returns the acquisition id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.meta.id
    }

    /// Returns the incident energy in eV, if known.
    #[inline]
    #[must_use]
    pub fn incident_energy(&self) -> Option<f64> {
        self.meta.incident_energy
    }

    /// Returns the intensity at the given pixel.
    #[inline]
    #[must_use]
    pub fn intensity(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    /// Returns a copy tagged with a known incident energy in eV.
    ///
    /// Used when calibration run information arrives separately from the
    /// image data.
    #[must_use]
    pub fn with_incident_energy(&self, energy: f64) -> Frame {
        Frame {
            data: self.data.clone(),
            meta: self.meta.with_incident_energy(energy),
        }
    }

    /// Returns a copy with replaced acquisition metadata.
    ///
    /// Metadata carries no frame invariants, so retagging is safe; the
    /// intensity data is copied unchanged.
    #[must_use]
    pub fn with_meta(&self, meta: FrameMeta) -> Frame {
        Frame {
            data: self.data.clone(),
            meta,
        }
    }

    /// Returns a copy with intensities outside `[lo, hi]` set to zero.
    ///
    /// Used to suppress readout noise below `lo` and saturated or hot
    /// pixels above `hi` before detection or fitting.
    #[must_use]
    pub fn with_cuts(&self, lo: f64, hi: f64) -> Frame {
        let data = self.data.mapv(|v| if v < lo || v > hi { 0.0 } else { v });
        Frame {
            data,
            meta: self.meta,
        }
    }

    /// Returns a copy with all intensities multiplied by `factor`.
    ///
    /// `factor` must be non-negative to preserve the frame invariant;
    /// negative factors are treated as zero.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Frame {
        let factor = factor.max(0.0);
        Frame {
            data: &self.data * factor,
            meta: self.meta,
        }
    }

    /// Returns a copy smoothed with a boxcar filter of the given radius.
    ///
    /// The window is clipped at the frame borders, so edge pixels average
    /// over a smaller neighborhood. A radius of zero returns the frame
    /// unchanged.
    #[must_use]
    pub fn boxcar_blurred(&self, radius: usize) -> Frame {
        if radius == 0 {
            return self.clone();
        }
        let (rows, cols) = self.data.dim();
        let mut out = Array2::<f64>::zeros((rows, cols));
        for row in 0..rows {
            let r_lo = row.saturating_sub(radius);
            let r_hi = (row + radius).min(rows - 1);
            for col in 0..cols {
                let c_lo = col.saturating_sub(radius);
                let c_hi = (col + radius).min(cols - 1);
                let mut sum = 0.0;
                for r in r_lo..=r_hi {
                    for c in c_lo..=c_hi {
                        sum += self.data[[r, c]];
                    }
                }
                let count = (r_hi - r_lo + 1) * (c_hi - c_lo + 1);
                out[[row, col]] = sum / count as f64;
            }
        }
        Frame {
            data: out,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_frame_rejects_negative_intensity() {
        let data = array![[1.0, 2.0], [-0.5, 3.0]];
        let err = Frame::new(data, FrameMeta::new(FrameId(0))).unwrap_err();
        assert!(matches!(err, Error::InvalidIntensity { row: 1, col: 0, .. }));
    }

    #[test]
    fn test_frame_rejects_empty() {
        let data = Array2::<f64>::zeros((0, 4));
        let err = Frame::new(data, FrameMeta::new(FrameId(0))).unwrap_err();
        assert!(matches!(err, Error::EmptyFrame { rows: 0, cols: 4 }));
    }

    #[test]
    fn test_cuts_zero_outside_window() {
        let data = array![[1.0, 5.0, 10.0]];
        let frame = Frame::new(data, FrameMeta::new(FrameId(1))).unwrap();
        let cut = frame.with_cuts(2.0, 8.0);
        assert_relative_eq!(cut.intensity(0, 0), 0.0);
        assert_relative_eq!(cut.intensity(0, 1), 5.0);
        assert_relative_eq!(cut.intensity(0, 2), 0.0);
    }

    #[test]
    fn test_boxcar_blur_preserves_uniform_field() {
        let data = Array2::<f64>::from_elem((5, 5), 3.0);
        let frame = Frame::new(data, FrameMeta::new(FrameId(2))).unwrap();
        let blurred = frame.boxcar_blurred(1);
        for &v in blurred.data().iter() {
            assert_relative_eq!(v, 3.0);
        }
    }

    #[test]
    fn test_adjacency() {
        let a = PixelCoord::new(5, 5);
        assert!(a.is_adjacent(&PixelCoord::new(4, 6)));
        assert!(!a.is_adjacent(&PixelCoord::new(5, 5)));
        assert!(!a.is_adjacent(&PixelCoord::new(5, 7)));
    }
}
