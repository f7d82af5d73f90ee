//!
//! Command-line interface for calibrating and extracting X-ray emission
//! spectra from pixel detector images.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rustxes_algorithms::{calibrate_pipeline, extract_batch};
use rustxes_core::calibration::EnergyCalibration;
use rustxes_core::config::{
    Axis, CalibrationConfig, DetectionConfig, ExtractionConfig, ThresholdMode,
};
use rustxes_core::roi::RoiSet;
use rustxes_io::{load_scan_set, RunInfo};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    RustxesIo(#[from] rustxes_io::Error),

    #[error("core error: {0}")]
    Core(#[from] rustxes_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Threshold policy selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThresholdArg {
    /// Percentile of pixel intensities
    Percentile,
    /// Mean plus k standard deviations
    NoiseFloor,
}

/// Dispersion axis selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum AxisArg {
    /// Energy varies along detector rows
    Row,
    /// Energy varies along detector columns
    Column,
}

impl From<AxisArg> for Axis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::Row => Axis::Row,
            AxisArg::Column => Axis::Column,
        }
    }
}

/// Calibration artifact persisted between the two subcommands.
#[derive(Serialize, Deserialize)]
struct CalibrationFile {
    rois: RoiSet,
    calibration: EnergyCalibration,
}

/// X-ray emission spectrum extraction for pixel detectors.
#[derive(Parser)]
#[command(name = "rustxes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect ROIs and fit the pixel-to-energy calibration
    Calibrate {
        /// Directory of calibration images
        #[arg(long)]
        frames: PathBuf,

        /// Run-info table with the incident energy per scan
        #[arg(long)]
        run_info: PathBuf,

        /// Output calibration file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Threshold policy
        #[arg(long, value_enum, default_value = "percentile")]
        threshold_mode: ThresholdArg,

        /// Threshold parameter: percentile (0-100) or sigma multiplier
        #[arg(long, default_value = "98.0")]
        threshold_value: f64,

        /// Dispersion axis of the spectrometer
        #[arg(long, value_enum, default_value = "column")]
        dispersion_axis: AxisArg,

        /// Minimum pixels per ROI
        #[arg(long, default_value = "20")]
        min_roi_pixels: usize,

        /// Expected ROI count; detection failing to match is an error
        #[arg(long)]
        expected_rois: Option<usize>,

        /// Boxcar blur radius applied before thresholding
        #[arg(long)]
        blur: Option<usize>,

        /// Zero out pixels below this intensity before fitting
        #[arg(long)]
        cut_low: Option<f64>,

        /// Zero out pixels above this intensity before fitting
        #[arg(long)]
        cut_high: Option<f64>,

        /// Scale each scan by 1/i0 from the run-info table
        #[arg(long)]
        normalize_i0: bool,

        /// Polynomial order of the energy fit (1 = linear)
        #[arg(long, default_value = "1")]
        fit_order: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Extract and aggregate spectra from experimental images
    Extract {
        /// Directory of experimental images
        #[arg(long)]
        frames: PathBuf,

        /// Calibration file written by `rustxes calibrate`
        #[arg(long)]
        mapping: PathBuf,

        /// Output spectra table (CSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Energy bin width in eV
        #[arg(long, default_value = "0.5")]
        bin_width: f64,

        /// Also write the cross-ROI summed spectrum
        #[arg(long)]
        summed: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Calibrate {
            frames,
            run_info,
            output,
            threshold_mode,
            threshold_value,
            dispersion_axis,
            min_roi_pixels,
            expected_rois,
            blur,
            cut_low,
            cut_high,
            normalize_i0,
            fit_order,
            verbose,
        } => {
            let start = Instant::now();
            let info = RunInfo::from_path(&run_info)?;
            let mut scans = load_scan_set(&frames, Some(&info))?;
            if normalize_i0 {
                scans = scans
                    .iter()
                    .enumerate()
                    .map(|(i, scan)| match info.get(i).and_then(|entry| entry.i0) {
                        Some(i0) if i0 > 0.0 => scan.scaled(1.0 / i0),
                        _ => scan.clone(),
                    })
                    .collect();
            }
            if cut_low.is_some() || cut_high.is_some() {
                let lo = cut_low.unwrap_or(0.0);
                let hi = cut_high.unwrap_or(f64::INFINITY);
                scans = scans.iter().map(|s| s.with_cuts(lo, hi)).collect();
            }
            if verbose {
                eprintln!("Loaded {} calibration frames from {}", scans.len(), frames.display());
            }

            let threshold = match threshold_mode {
                ThresholdArg::Percentile => ThresholdMode::Percentile(threshold_value),
                ThresholdArg::NoiseFloor => ThresholdMode::NoiseFloor(threshold_value),
            };
            let mut detection = DetectionConfig::new()
                .with_threshold(threshold)
                .with_dispersion_axis(dispersion_axis.into())
                .with_min_roi_pixels(min_roi_pixels);
            if let Some(expected) = expected_rois {
                detection = detection.with_expected_roi_count(expected);
            }
            if let Some(radius) = blur {
                detection = detection.with_blur_radius(radius);
            }
            let calibration_config = CalibrationConfig::new().with_fit_order(fit_order);

            let (rois, calibration) = calibrate_pipeline(&scans, &detection, &calibration_config)?;
            for warning in calibration.warnings() {
                eprintln!("warning: {}", warning);
            }
            println!(
                "Calibrated {} ROIs from {} frames in {:.2?}",
                rois.len(),
                scans.len(),
                start.elapsed()
            );
            for mapping in calibration.iter() {
                let (lo, hi) = mapping.energy_range();
                println!("  ROI {}: {:.1} - {:.1} eV", mapping.roi, lo, hi);
            }

            let file = std::fs::File::create(&output)?;
            serde_json::to_writer_pretty(file, &CalibrationFile { rois, calibration })?;
            println!("Wrote calibration to {}", output.display());
        }

        Commands::Extract {
            frames,
            mapping,
            output,
            bin_width,
            summed,
            verbose,
        } => {
            let start = Instant::now();
            let file = std::fs::File::open(&mapping)?;
            let loaded: CalibrationFile = serde_json::from_reader(file)?;
            let scans = load_scan_set(&frames, None)?;
            if verbose {
                eprintln!("Loaded {} frames from {}", scans.len(), frames.display());
            }

            let config = ExtractionConfig::new().with_energy_bin_width(bin_width);
            let aggregated = extract_batch(&scans, &loaded.rois, &loaded.calibration, &config)?;

            let mut writer = std::io::BufWriter::new(std::fs::File::create(&output)?);
            writeln!(writer, "roi,energy,intensity,mean,variance,pixels,frames")?;
            for (roi, aggregate) in aggregated.iter() {
                for bin in aggregate.bins() {
                    writeln!(
                        writer,
                        "{},{:.6},{:.6},{:.6},{:.6},{},{}",
                        roi,
                        bin.energy,
                        bin.stats.sum,
                        bin.stats.mean(),
                        bin.stats.variance().unwrap_or(0.0),
                        bin.stats.pixels,
                        bin.stats.frames
                    )?;
                }
                let out_of_range = aggregate.out_of_range();
                if out_of_range > 0 {
                    eprintln!("warning: ROI {}: {} out-of-range pixels", roi, out_of_range);
                }
            }
            if summed {
                let total = aggregated.combined().map_err(rustxes_core::Error::from)?;
                for bin in total.bins() {
                    writeln!(
                        writer,
                        "sum,{:.6},{:.6},{:.6},{:.6},{},{}",
                        bin.energy,
                        bin.stats.sum,
                        bin.stats.mean(),
                        bin.stats.variance().unwrap_or(0.0),
                        bin.stats.pixels,
                        bin.stats.frames
                    )?;
                }
            }
            writer.flush()?;

            println!(
                "Extracted {} frames into {} ROI spectra in {:.2?}",
                scans.len(),
                aggregated.len(),
                start.elapsed()
            );
            println!("Wrote spectra to {}", output.display());
        }
    }

    Ok(())
}
