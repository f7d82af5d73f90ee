//! rustxes-core: Core types for X-ray emission spectrum extraction.
//!
//! This crate provides the foundational data model for the rustxes pipeline:
//! detector frames, regions of interest, pixel-to-energy calibrations,
//! extracted spectra, and running spectrum aggregates.
//!

pub mod aggregate;
pub mod calibration;
pub mod config;
pub mod error;
pub mod frame;
pub mod roi;
pub mod spectrum;

pub use aggregate::{AggregateBin, AggregateSpectrum, BinStats};
pub use calibration::{CalibrationPoint, EnergyCalibration, QualityWarning, RoiCalibration};
pub use config::{Axis, CalibrationConfig, DetectionConfig, ExtractionConfig, ThresholdMode};
pub use error::{
    AggregationError, CalibrationError, DetectionError, Error, ExtractionError, Result,
};
pub use frame::{Frame, FrameId, FrameMeta, PixelCoord};
pub use roi::{BoundingBox, Roi, RoiId, RoiSet};
pub use spectrum::{Spectrum, SpectrumBin};
