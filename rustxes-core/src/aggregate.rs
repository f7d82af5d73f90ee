//! Running spectrum aggregates.
//!
//! An [`AggregateSpectrum`] accumulates per-bin statistics over repeated
//! acquisitions: intensity sums, contributing pixel and frame counts, and
//! an online variance estimate (Welford). Merging is pure and both
//! commutative and associative up to floating-point rounding, so frames
//! may be folded in any order, including from a parallel reduction.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::AggregationError;
use crate::roi::RoiId;
use crate::spectrum::{bin_center, Spectrum};

/// Running statistics for one energy bin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinStats {
    /// Number of frames that covered this bin.
    pub frames: u64,
    /// Number of pixels that contributed to this bin.
    pub pixels: u64,
    /// Summed intensity over all frames.
    pub sum: f64,
    mean: f64,
    m2: f64,
}

impl BinStats {
    /// Statistics of a single frame's contribution.
    #[must_use]
    fn from_sample(intensity: f64, pixels: u64) -> Self {
        Self {
            frames: 1,
            pixels,
            sum: intensity,
            mean: intensity,
            m2: 0.0,
        }
    }

    /// Combines two running statistics (parallel Welford update).
    #[must_use]
    fn combined(&self, other: &Self) -> Self {
        let frames = self.frames + other.frames;
        let delta = other.mean - self.mean;
        let n1 = self.frames as f64;
        let n2 = other.frames as f64;
        let n = frames as f64;
        Self {
            frames,
            pixels: self.pixels + other.pixels,
            sum: self.sum + other.sum,
            mean: self.mean + delta * n2 / n,
            m2: self.m2 + other.m2 + delta * delta * n1 * n2 / n,
        }
    }

    /// Mean per-frame intensity of this bin.
    #[inline]
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance of the per-frame intensity, `None` below 2 frames.
    #[must_use]
    pub fn variance(&self) -> Option<f64> {
        if self.frames < 2 {
            None
        } else {
            Some(self.m2 / (self.frames - 1) as f64)
        }
    }
}

/// One bin of an aggregate, paired with its center energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateBin {
    /// Global bin index.
    pub index: i64,
    /// Bin center energy in eV.
    pub energy: f64,
    /// Running statistics for the bin.
    pub stats: BinStats,
}

/// A merged, energy-binned spectrum over many frames.
///
/// Tracks one ROI when `roi` is set, or a cross-ROI sum when it is
/// `None`. Bins are stored sparsely by global index; bins a spectrum
/// never covered carry no statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregateSpectrum {
    roi: Option<RoiId>,
    bin_width: f64,
    bins: BTreeMap<i64, BinStats>,
    frames: u64,
    out_of_range: u64,
}

impl AggregateSpectrum {
    /// Creates an empty aggregate.
    #[must_use]
    pub fn new(roi: Option<RoiId>, bin_width: f64) -> Self {
        Self {
            roi,
            bin_width,
            bins: BTreeMap::new(),
            frames: 0,
            out_of_range: 0,
        }
    }

    /// Merges one extracted spectrum, returning the updated aggregate.
    ///
    /// The input aggregate is not mutated. Every bin the spectrum covers
    /// contributes one sample (possibly zero intensity) to that bin's
    /// running statistics.
    ///
    /// # Errors
    /// Returns [`AggregationError::BinWidthMismatch`] if the spectrum was
    /// binned with a different width, or [`AggregationError::RoiMismatch`]
    /// if this aggregate tracks a different ROI.
    pub fn merge(&self, spectrum: &Spectrum) -> Result<Self, AggregationError> {
        if spectrum.bin_width() != self.bin_width {
            return Err(AggregationError::BinWidthMismatch {
                expected: self.bin_width,
                found: spectrum.bin_width(),
            });
        }
        if let Some(roi) = self.roi {
            if roi != spectrum.roi() {
                return Err(AggregationError::RoiMismatch {
                    expected: roi.as_usize(),
                    found: spectrum.roi().as_usize(),
                });
            }
        }
        let mut bins = self.bins.clone();
        for bin in spectrum.bins() {
            let sample = BinStats::from_sample(bin.intensity, bin.pixels);
            bins.entry(bin.index)
                .and_modify(|stats| *stats = stats.combined(&sample))
                .or_insert(sample);
        }
        Ok(Self {
            roi: self.roi,
            bin_width: self.bin_width,
            bins,
            frames: self.frames + 1,
            out_of_range: self.out_of_range + spectrum.out_of_range(),
        })
    }

    /// Combines two aggregates, returning a new one.
    ///
    /// Associative and commutative up to floating-point rounding, which
    /// makes it usable as a parallel reduction operator.
    ///
    /// # Errors
    /// Returns [`AggregationError::BinWidthMismatch`] or
    /// [`AggregationError::RoiMismatch`] when the aggregates are not
    /// compatible.
    pub fn combine(&self, other: &Self) -> Result<Self, AggregationError> {
        if other.bin_width != self.bin_width {
            return Err(AggregationError::BinWidthMismatch {
                expected: self.bin_width,
                found: other.bin_width,
            });
        }
        if let (Some(a), Some(b)) = (self.roi, other.roi) {
            if a != b {
                return Err(AggregationError::RoiMismatch {
                    expected: a.as_usize(),
                    found: b.as_usize(),
                });
            }
        }
        let mut bins = self.bins.clone();
        for (&index, stats) in &other.bins {
            bins.entry(index)
                .and_modify(|existing| *existing = existing.combined(stats))
                .or_insert(*stats);
        }
        Ok(Self {
            roi: self.roi.or(other.roi),
            bin_width: self.bin_width,
            bins,
            frames: self.frames + other.frames,
            out_of_range: self.out_of_range + other.out_of_range,
        })
    }

    /// The ROI this aggregate tracks, or `None` for a cross-ROI sum.
    #[inline]
    #[must_use]
    pub fn roi(&self) -> Option<RoiId> {
        self.roi
    }

    /// Returns a copy with the ROI tag cleared, for cross-ROI summation.
    #[must_use]
    pub fn without_roi(&self) -> Self {
        Self {
            roi: None,
            ..self.clone()
        }
    }

    /// The uniform bin width in eV.
    #[inline]
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Total number of merged frames.
    #[inline]
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Total out-of-range pixels over all merged spectra.
    #[inline]
    #[must_use]
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Number of bins carrying statistics.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Returns true if no bin carries statistics.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Statistics of the given global bin.
    #[must_use]
    pub fn bin(&self, index: i64) -> Option<&BinStats> {
        self.bins.get(&index)
    }

    /// Summed intensity of the given global bin, zero if never covered.
    #[must_use]
    pub fn intensity_sum(&self, index: i64) -> f64 {
        self.bins.get(&index).map_or(0.0, |stats| stats.sum)
    }

    /// Iterates over bins in ascending energy order.
    pub fn bins(&self) -> impl Iterator<Item = AggregateBin> + '_ {
        self.bins.iter().map(move |(&index, &stats)| AggregateBin {
            index,
            energy: bin_center(index, self.bin_width),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spectrum(first_bin: i64, intensities: Vec<f64>) -> Spectrum {
        let pixels = vec![1; intensities.len()];
        Spectrum::from_bins(RoiId(0), 1.0, first_bin, intensities, pixels, 0)
    }

    #[test]
    fn test_merge_accumulates_sums() {
        let agg = AggregateSpectrum::new(Some(RoiId(0)), 1.0);
        let agg = agg.merge(&spectrum(10, vec![1.0, 2.0])).unwrap();
        let agg = agg.merge(&spectrum(10, vec![3.0, 4.0])).unwrap();
        assert_eq!(agg.frames(), 2);
        assert_relative_eq!(agg.intensity_sum(10), 4.0);
        assert_relative_eq!(agg.intensity_sum(11), 6.0);
        assert_eq!(agg.bin(10).unwrap().frames, 2);
        assert_eq!(agg.bin(10).unwrap().pixels, 2);
    }

    #[test]
    fn test_variance_matches_two_point_sample() {
        let agg = AggregateSpectrum::new(Some(RoiId(0)), 1.0);
        let agg = agg.merge(&spectrum(0, vec![2.0])).unwrap();
        let agg = agg.merge(&spectrum(0, vec![4.0])).unwrap();
        // Sample variance of {2, 4} is 2.
        assert_relative_eq!(agg.bin(0).unwrap().variance().unwrap(), 2.0);
        assert_relative_eq!(agg.bin(0).unwrap().mean(), 3.0);
    }

    #[test]
    fn test_merge_order_invariance() {
        let spectra = [
            spectrum(0, vec![1.0, 5.0]),
            spectrum(1, vec![2.0]),
            spectrum(0, vec![7.0, 0.5, 3.0]),
        ];
        let forward = spectra
            .iter()
            .try_fold(AggregateSpectrum::new(Some(RoiId(0)), 1.0), |acc, s| {
                acc.merge(s)
            })
            .unwrap();
        let reverse = spectra
            .iter()
            .rev()
            .try_fold(AggregateSpectrum::new(Some(RoiId(0)), 1.0), |acc, s| {
                acc.merge(s)
            })
            .unwrap();
        for (a, b) in forward.bins().zip(reverse.bins()) {
            assert_eq!(a.index, b.index);
            assert_relative_eq!(a.stats.sum, b.stats.sum, max_relative = 1e-12);
            assert_relative_eq!(a.stats.mean(), b.stats.mean(), max_relative = 1e-12);
            assert_eq!(a.stats.frames, b.stats.frames);
        }
    }

    #[test]
    fn test_combine_associative() {
        let a = AggregateSpectrum::new(Some(RoiId(0)), 1.0)
            .merge(&spectrum(0, vec![1.0, 2.0]))
            .unwrap();
        let b = AggregateSpectrum::new(Some(RoiId(0)), 1.0)
            .merge(&spectrum(1, vec![4.0]))
            .unwrap();
        let c = AggregateSpectrum::new(Some(RoiId(0)), 1.0)
            .merge(&spectrum(0, vec![8.0, 16.0]))
            .unwrap();
        let left = a.combine(&b).unwrap().combine(&c).unwrap();
        let right = a.combine(&b.combine(&c).unwrap()).unwrap();
        assert_eq!(left.frames(), right.frames());
        for (x, y) in left.bins().zip(right.bins()) {
            assert_eq!(x.index, y.index);
            assert_relative_eq!(x.stats.sum, y.stats.sum, max_relative = 1e-12);
            assert_relative_eq!(
                x.stats.variance().unwrap_or(0.0),
                y.stats.variance().unwrap_or(0.0),
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn test_bin_width_mismatch_rejected() {
        let agg = AggregateSpectrum::new(Some(RoiId(0)), 1.0);
        let s = Spectrum::from_bins(RoiId(0), 0.5, 0, vec![1.0], vec![1], 0);
        assert!(matches!(
            agg.merge(&s),
            Err(AggregationError::BinWidthMismatch { .. })
        ));
    }

    #[test]
    fn test_roi_mismatch_rejected() {
        let agg = AggregateSpectrum::new(Some(RoiId(1)), 1.0);
        let s = spectrum(0, vec![1.0]);
        assert!(matches!(
            agg.merge(&s),
            Err(AggregationError::RoiMismatch { .. })
        ));
    }
}
