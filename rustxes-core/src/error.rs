//! Error types for rustxes-core.

use thiserror::Error;

/// Result type alias for rustxes operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for rustxes operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Negative or non-finite intensity in a frame.
    #[error("invalid intensity {value} at pixel ({row}, {col})")]
    InvalidIntensity {
        /// Row of the offending pixel.
        row: usize,
        /// Column of the offending pixel.
        col: usize,
        /// The rejected intensity value.
        value: f64,
    },

    /// Frame with a zero-sized dimension.
    #[error("frame must have non-zero dimensions, got {rows}x{cols}")]
    EmptyFrame {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// ROI set violating a structural invariant.
    #[error("invalid ROI set: {0}")]
    InvalidRoiSet(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// ROI detection error.
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    /// Calibration fitting error.
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Spectrum extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Spectra aggregation error.
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),
}

/// Errors raised by ROI detection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// Thresholding left no candidate signal pixels.
    #[error("no signal detected above threshold")]
    NoSignalDetected,

    /// Detected region count differs from the count the caller expects.
    #[error("detected {found} regions, expected {expected}")]
    AmbiguousRoiCount {
        /// Region count requested by the caller.
        expected: usize,
        /// Region count actually detected.
        found: usize,
    },

    /// Input frames with inconsistent dimensions.
    #[error("frame {frame} has dimensions {found:?}, expected {expected:?}")]
    FrameShapeMismatch {
        /// Acquisition id of the offending frame.
        frame: u64,
        /// Dimensions of the first frame.
        expected: (usize, usize),
        /// Dimensions of the offending frame.
        found: (usize, usize),
    },

    /// Called with no input frames.
    #[error("no input frames")]
    EmptyInput,
}

/// Errors raised by calibration fitting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    /// Fewer than two distinct incident energies for an ROI.
    #[error("ROI {roi} has {distinct} distinct calibration energies, need at least 2")]
    InsufficientCalibrationPoints {
        /// Index of the under-constrained ROI.
        roi: usize,
        /// Number of distinct incident energies found.
        distinct: usize,
    },

    /// Fitted mapping folds back on itself within the sampled range.
    #[error("fitted mapping for ROI {roi} is not monotonic over the sampled coordinate range")]
    CalibrationInconsistent {
        /// Index of the inconsistent ROI.
        roi: usize,
    },

    /// Calibration frame without a known incident energy.
    #[error("calibration frame {frame} carries no incident energy")]
    MissingIncidentEnergy {
        /// Acquisition id of the offending frame.
        frame: u64,
    },

    /// Calibration frame dimensions differ from the ROI set's origin.
    #[error("frame {frame} has dimensions {found:?}, expected {expected:?}")]
    FrameShapeMismatch {
        /// Acquisition id of the offending frame.
        frame: u64,
        /// Dimensions the ROI set was detected on.
        expected: (usize, usize),
        /// Dimensions of the offending frame.
        found: (usize, usize),
    },

    /// Called with no calibration frames.
    #[error("no calibration frames")]
    EmptyInput,
}

/// Errors raised by spectrum extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Requested ROI has no entry in the calibration mapping.
    #[error("no calibration mapping for ROI {roi}")]
    RoiMappingMissing {
        /// Index of the unmapped ROI.
        roi: usize,
    },

    /// Frame dimensions differ from the ROI set's origin.
    #[error("frame {frame} has dimensions {found:?}, expected {expected:?}")]
    FrameShapeMismatch {
        /// Acquisition id of the offending frame.
        frame: u64,
        /// Dimensions the ROI set was detected on.
        expected: (usize, usize),
        /// Dimensions of the offending frame.
        found: (usize, usize),
    },
}

/// Errors raised by spectra aggregation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// Merged spectra must share one bin width for bins to align.
    #[error("bin width mismatch: aggregate uses {expected}, spectrum uses {found}")]
    BinWidthMismatch {
        /// Bin width of the aggregate.
        expected: f64,
        /// Bin width of the incoming spectrum.
        found: f64,
    },

    /// Per-ROI aggregate fed a spectrum from a different ROI.
    #[error("ROI mismatch: aggregate tracks ROI {expected}, spectrum is from ROI {found}")]
    RoiMismatch {
        /// ROI the aggregate was created for.
        expected: usize,
        /// ROI of the incoming spectrum.
        found: usize,
    },
}
