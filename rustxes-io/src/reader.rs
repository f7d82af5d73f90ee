//! Detector image decoding.
#![allow(clippy::cast_possible_truncation)]

use std::path::Path;
use std::time::UNIX_EPOCH;

use log::debug;
use ndarray::Array2;

use rustxes_core::frame::{Frame, FrameId, FrameMeta};

use crate::error::Result;

/// Loads a grayscale detector image into a frame.
///
/// 8-bit sources are widened to the 16-bit range before conversion to
/// floating point. The frame timestamp is taken from the file's
/// modification time when the filesystem provides one.
///
/// # Errors
/// Fails if the file cannot be read or decoded, or if the decoded data
/// violates the frame invariants.
pub fn load_frame(path: &Path, id: FrameId) -> Result<Frame> {
    let image = image::open(path)?;
    let gray = image.to_luma16();
    let (width, height) = gray.dimensions();
    let mut data = Array2::<f64>::zeros((height as usize, width as usize));
    for (x, y, pixel) in gray.enumerate_pixels() {
        data[[y as usize, x as usize]] = f64::from(pixel.0[0]);
    }
    debug!("loaded {}: {height}x{width}", path.display());

    let mut meta = FrameMeta::new(id);
    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        if let Ok(elapsed) = modified.duration_since(UNIX_EPOCH) {
            meta = meta.with_timestamp(elapsed.as_nanos() as u64);
        }
    }
    Ok(Frame::new(data, meta)?)
}
