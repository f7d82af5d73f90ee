//! Calibration run-info tables.
//!
//! A run-info table records, per calibration scan in acquisition order,
//! the monochromator energy the scan was taken at, plus optional beam
//! diagnostics. Tables are comma-separated with a header row; lines
//! starting with `#` are comments:
//!
//! ```text
//! energy,i0,exposure
//! 8000.0,1.02e6,1.0
//! 8050.0,1.01e6,1.0
//! ```

use std::path::Path;

use serde::Deserialize;

use rustxes_core::frame::Frame;

use crate::error::{Error, Result};

/// One row of a run-info table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RunEntry {
    /// Incident (monochromator) energy in eV.
    pub energy: f64,
    /// Incident beam intensity monitor reading.
    #[serde(default)]
    pub i0: Option<f64>,
    /// Exposure time in seconds.
    #[serde(default)]
    pub exposure: Option<f64>,
}

/// Calibration run information for an ordered scan set.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    entries: Vec<RunEntry>,
}

impl RunInfo {
    /// Reads a run-info table from a CSV file.
    ///
    /// # Errors
    /// Fails on unreadable files or malformed rows.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_path(path)?;
        let mut entries = Vec::new();
        for record in reader.deserialize() {
            entries.push(record?);
        }
        Ok(Self { entries })
    }

    /// Creates run information from in-memory entries.
    #[must_use]
    pub fn from_entries(entries: Vec<RunEntry>) -> Self {
        Self { entries }
    }

    /// Number of recorded scans.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for the i-th scan.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RunEntry> {
        self.entries.get(index)
    }

    /// The incident energies in scan order.
    #[must_use]
    pub fn energies(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.energy).collect()
    }

    /// Tags each frame with its scan's incident energy and exposure.
    ///
    /// Frames and entries pair up in order, exactly as the scans were
    /// acquired.
    ///
    /// # Errors
    /// Returns [`Error::ScanCountMismatch`] when the counts differ; no
    /// frame is tagged from a guessed pairing.
    pub fn apply_to(&self, frames: Vec<Frame>) -> Result<Vec<Frame>> {
        if frames.len() != self.entries.len() {
            return Err(Error::ScanCountMismatch {
                scans: frames.len(),
                entries: self.entries.len(),
            });
        }
        Ok(frames
            .into_iter()
            .zip(&self.entries)
            .map(|(frame, entry)| {
                let mut meta = frame.meta().with_incident_energy(entry.energy);
                if let Some(exposure) = entry.exposure {
                    meta = meta.with_exposure(exposure);
                }
                frame.with_meta(meta)
            })
            .collect())
    }
}
