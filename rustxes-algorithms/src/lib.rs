//! rustxes-algorithms: The spectrum extraction pipeline.
//!
//! This crate provides the algorithmic stages that turn raw detector
//! frames into energy-indexed spectra:
//! - **Detection** - adaptive thresholding + connected-component labeling
//! - **Calibration** - projected-profile peaks fitted to known energies
//! - **Extraction** - calibrated projection onto the energy bin grid
//! - **Aggregation** - order-insensitive merging of per-frame spectra
//!
#![warn(missing_docs)]

mod aggregate;
mod calibrate;
mod detect;
mod extract;
mod peak;
mod pipeline;
pub mod project;

pub use aggregate::SpectraAggregator;
pub use calibrate::CalibrationFitter;
pub use detect::RoiDetector;
pub use extract::SpectrumExtractor;
pub use peak::{count_comparable_peaks, CentroidLocator, PeakLocator, QuadraticLocator};
pub use pipeline::{calibrate_pipeline, extract_batch};
pub use project::{project, Profile};

// Re-export core configuration types
pub use rustxes_core::config::{
    Axis, CalibrationConfig, DetectionConfig, ExtractionConfig, ThresholdMode,
};
