//! Regions of interest on the detector.
//!
//! An ROI is a spatially contiguous set of pixels corresponding to one
//! diffraction order or crystal reflection. ROIs within a set are ordered
//! by their centroid along the dispersion-perpendicular layout of the
//! detector so that the same physical region keeps the same id across
//! calibration and experimental frame sets.

use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::Axis;
use crate::error::{Error, Result};
use crate::frame::PixelCoord;

/// Stable identifier of an ROI within a set.
///
/// Ids are assigned by ascending dispersion-axis centroid, so id 0 is
/// always the region closest to the origin along that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiId(pub usize);

impl RoiId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for RoiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive bounding box of an ROI in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// First row of the box.
    pub row_min: u16,
    /// Last row of the box (inclusive).
    pub row_max: u16,
    /// First column of the box.
    pub col_min: u16,
    /// Last column of the box (inclusive).
    pub col_max: u16,
}

impl BoundingBox {
    /// Computes the bounding box of a non-empty pixel set.
    #[must_use]
    pub fn from_pixels(pixels: &[PixelCoord]) -> Option<Self> {
        let first = pixels.first()?;
        let mut bounds = Self {
            row_min: first.row,
            row_max: first.row,
            col_min: first.col,
            col_max: first.col,
        };
        for p in &pixels[1..] {
            bounds.row_min = bounds.row_min.min(p.row);
            bounds.row_max = bounds.row_max.max(p.row);
            bounds.col_min = bounds.col_min.min(p.col);
            bounds.col_max = bounds.col_max.max(p.col);
        }
        Some(bounds)
    }

    /// Box height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        usize::from(self.row_max - self.row_min) + 1
    }

    /// Box width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        usize::from(self.col_max - self.col_min) + 1
    }

    /// Returns the span along the given axis.
    #[inline]
    #[must_use]
    pub fn span_along(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.height(),
            Axis::Column => self.width(),
        }
    }

    /// Returns the inclusive (min, max) coordinate range along the axis.
    #[inline]
    #[must_use]
    pub fn range_along(&self, axis: Axis) -> (u16, u16) {
        match axis {
            Axis::Row => (self.row_min, self.row_max),
            Axis::Column => (self.col_min, self.col_max),
        }
    }

    /// Checks whether the pixel lies inside the box.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: &PixelCoord) -> bool {
        p.row >= self.row_min && p.row <= self.row_max && p.col >= self.col_min && p.col <= self.col_max
    }
}

/// One region of interest: a contiguous pixel mask with its bounding box
/// and intensity-weighted centroid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    /// Ordering index of this region within its set.
    pub id: RoiId,
    /// Bounding box of the pixel mask.
    pub bounds: BoundingBox,
    /// Pixels belonging to this region, sorted row-major.
    pub pixels: Vec<PixelCoord>,
    /// Intensity-weighted centroid row.
    pub centroid_row: f64,
    /// Intensity-weighted centroid column.
    pub centroid_col: f64,
}

impl Roi {
    /// Returns the number of pixels in the mask.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Returns the centroid coordinate along the given axis.
    #[inline]
    #[must_use]
    pub fn centroid_along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Row => self.centroid_row,
            Axis::Column => self.centroid_col,
        }
    }
}

/// An ordered set of disjoint ROIs detected on frames of one detector
/// configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiSet {
    rois: Vec<Roi>,
    frame_dims: (usize, usize),
    dispersion_axis: Axis,
}

impl RoiSet {
    /// Creates a validated ROI set.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRoiSet`] if any mask is empty, out of the
    /// frame bounds, or overlaps another mask; if ids do not match the
    /// set order; or if centroids are not ascending along the dispersion
    /// axis.
    pub fn new(rois: Vec<Roi>, frame_dims: (usize, usize), dispersion_axis: Axis) -> Result<Self> {
        let mut seen: HashSet<PixelCoord> = HashSet::new();
        let mut last_centroid = f64::NEG_INFINITY;
        for (index, roi) in rois.iter().enumerate() {
            if roi.id.as_usize() != index {
                return Err(Error::InvalidRoiSet(format!(
                    "ROI at position {index} has id {}",
                    roi.id
                )));
            }
            if roi.pixels.is_empty() {
                return Err(Error::InvalidRoiSet(format!("ROI {} has an empty mask", roi.id)));
            }
            for p in &roi.pixels {
                if usize::from(p.row) >= frame_dims.0 || usize::from(p.col) >= frame_dims.1 {
                    return Err(Error::InvalidRoiSet(format!(
                        "ROI {} pixel ({}, {}) outside frame {frame_dims:?}",
                        roi.id, p.row, p.col
                    )));
                }
                if !seen.insert(*p) {
                    return Err(Error::InvalidRoiSet(format!(
                        "pixel ({}, {}) belongs to more than one ROI",
                        p.row, p.col
                    )));
                }
            }
            let centroid = roi.centroid_along(dispersion_axis);
            if centroid < last_centroid {
                return Err(Error::InvalidRoiSet(format!(
                    "ROI {} breaks centroid ordering along the dispersion axis",
                    roi.id
                )));
            }
            last_centroid = centroid;
        }
        Ok(Self {
            rois,
            frame_dims,
            dispersion_axis,
        })
    }

    /// Returns the number of ROIs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    /// Returns true if the set holds no ROIs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Returns the ROI with the given id.
    #[must_use]
    pub fn get(&self, id: RoiId) -> Option<&Roi> {
        self.rois.get(id.as_usize())
    }

    /// Iterates over the ROIs in order.
    pub fn iter(&self) -> impl Iterator<Item = &Roi> {
        self.rois.iter()
    }

    /// Dimensions of the frames this set was detected on.
    #[inline]
    #[must_use]
    pub fn frame_dims(&self) -> (usize, usize) {
        self.frame_dims
    }

    /// The dispersion axis the set was ordered along.
    #[inline]
    #[must_use]
    pub fn dispersion_axis(&self) -> Axis {
        self.dispersion_axis
    }
}
