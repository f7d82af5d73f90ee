//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Run-info table parse error.
    #[error("run info error: {0}")]
    RunInfo(#[from] csv::Error),

    /// Run-info entry count differs from the number of scans.
    #[error("run info lists {entries} entries but the scan set holds {scans} frames")]
    ScanCountMismatch {
        /// Number of frames in the scan set.
        scans: usize,
        /// Number of entries in the run-info table.
        entries: usize,
    },

    /// The frame queue consumer is gone.
    #[error("frame queue closed")]
    QueueClosed,

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] rustxes_core::Error),
}
