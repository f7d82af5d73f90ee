//! Order-insensitive aggregation of per-frame spectra.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rustxes_core::aggregate::AggregateSpectrum;
use rustxes_core::error::AggregationError;
use rustxes_core::roi::RoiId;
use rustxes_core::spectrum::Spectrum;

/// Running per-ROI aggregates over an acquisition session.
///
/// All operations are pure: merging returns a new aggregator and leaves
/// the inputs untouched, so a consumer loop can hold the current value
/// while readers keep consistent snapshots of earlier ones. Merging is
/// commutative and associative up to floating-point rounding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectraAggregator {
    bin_width: f64,
    per_roi: BTreeMap<RoiId, AggregateSpectrum>,
}

impl SpectraAggregator {
    /// Creates an empty aggregator for the given bin width.
    #[must_use]
    pub fn new(bin_width: f64) -> Self {
        Self {
            bin_width,
            per_roi: BTreeMap::new(),
        }
    }

    /// Merges one extracted spectrum, returning the updated aggregator.
    ///
    /// # Errors
    /// Returns [`AggregationError::BinWidthMismatch`] when the spectrum
    /// was binned with a different width.
    pub fn merge(&self, spectrum: &Spectrum) -> Result<Self, AggregationError> {
        let roi = spectrum.roi();
        let existing = match self.per_roi.get(&roi) {
            Some(aggregate) => aggregate.clone(),
            None => AggregateSpectrum::new(Some(roi), self.bin_width),
        };
        let updated = existing.merge(spectrum)?;
        let mut per_roi = self.per_roi.clone();
        per_roi.insert(roi, updated);
        Ok(Self {
            bin_width: self.bin_width,
            per_roi,
        })
    }

    /// Merges a batch of spectra in iteration order.
    ///
    /// # Errors
    /// Propagates the first merge failure.
    pub fn merge_all<'a, I>(&self, spectra: I) -> Result<Self, AggregationError>
    where
        I: IntoIterator<Item = &'a Spectrum>,
    {
        spectra
            .into_iter()
            .try_fold(self.clone(), |acc, spectrum| acc.merge(spectrum))
    }

    /// Combines two aggregators, returning a new one.
    ///
    /// # Errors
    /// Returns [`AggregationError::BinWidthMismatch`] when the
    /// aggregators use different bin widths.
    pub fn combine(&self, other: &Self) -> Result<Self, AggregationError> {
        if other.bin_width != self.bin_width {
            return Err(AggregationError::BinWidthMismatch {
                expected: self.bin_width,
                found: other.bin_width,
            });
        }
        let mut per_roi = self.per_roi.clone();
        for (&roi, aggregate) in &other.per_roi {
            let combined = match per_roi.get(&roi) {
                Some(existing) => existing.combine(aggregate)?,
                None => aggregate.clone(),
            };
            per_roi.insert(roi, combined);
        }
        Ok(Self {
            bin_width: self.bin_width,
            per_roi,
        })
    }

    /// Sums all per-ROI aggregates into one cross-ROI aggregate.
    ///
    /// # Errors
    /// Returns [`AggregationError::BinWidthMismatch`] if aggregates
    /// disagree on bin width, which cannot happen for aggregators built
    /// through [`SpectraAggregator::merge`].
    pub fn combined(&self) -> Result<AggregateSpectrum, AggregationError> {
        self.per_roi
            .values()
            .try_fold(AggregateSpectrum::new(None, self.bin_width), |acc, agg| {
                acc.combine(&agg.without_roi())
            })
    }

    /// The uniform bin width in eV.
    #[inline]
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Returns the aggregate for the given ROI.
    #[must_use]
    pub fn get(&self, roi: RoiId) -> Option<&AggregateSpectrum> {
        self.per_roi.get(&roi)
    }

    /// Number of ROIs with at least one merged spectrum.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.per_roi.len()
    }

    /// Returns true if nothing has been merged yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.per_roi.is_empty()
    }

    /// Iterates over per-ROI aggregates in id order.
    pub fn iter(&self) -> impl Iterator<Item = (RoiId, &AggregateSpectrum)> {
        self.per_roi.iter().map(|(&roi, agg)| (roi, agg))
    }
}
