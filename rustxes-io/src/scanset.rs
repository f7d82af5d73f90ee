//! Scan-set directory loading.
#![allow(clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

use log::debug;

use rustxes_core::frame::{Frame, FrameId};

use crate::error::Result;
use crate::reader::load_frame;
use crate::runinfo::RunInfo;

/// File extensions recognized as detector images.
const IMAGE_EXTENSIONS: [&str; 3] = ["tif", "tiff", "png"];

/// Loads every detector image in a directory as an ordered scan set.
///
/// Files are ordered by the trailing number in their stem (`scan_2`
/// before `scan_10`), falling back to lexicographic order, matching how
/// beamline acquisition software numbers sequential scans. When run
/// information is given, frames are tagged with their scan's incident
/// energy.
///
/// # Errors
/// Fails if the directory cannot be read, any image fails to decode, or
/// the run-info entry count does not match the number of images.
pub fn load_scan_set(dir: &Path, run_info: Option<&RunInfo>) -> Result<Vec<Frame>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    let ext = ext.to_ascii_lowercase();
                    IMAGE_EXTENSIONS.contains(&ext.as_str())
                })
        })
        .collect();
    paths.sort_by(|a, b| {
        let ka = sort_key(a);
        let kb = sort_key(b);
        ka.cmp(&kb).then_with(|| a.cmp(b))
    });
    debug!("scan set {} holds {} images", dir.display(), paths.len());

    let mut frames = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        frames.push(load_frame(path, FrameId(index as u64))?);
    }
    match run_info {
        Some(info) => info.apply_to(frames),
        None => Ok(frames),
    }
}

fn sort_key(path: &Path) -> u64 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(trailing_number)
        .unwrap_or(0)
}

/// Parses the trailing digits of a file stem, e.g. `scan_12` -> 12.
fn trailing_number(stem: &str) -> Option<u64> {
    let digits: String = stem
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{ImageBuffer, Luma};
    use crate::runinfo::RunEntry;

    fn write_image(dir: &Path, name: &str, value: u16) {
        let mut buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::new(2, 2);
        buffer.put_pixel(0, 0, Luma([value]));
        buffer.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("scan_12"), Some(12));
        assert_eq!(trailing_number("xes007"), Some(7));
        assert_eq!(trailing_number("flat"), None);
    }

    #[test]
    fn test_numeric_ordering() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "scan_10.tif", 10);
        write_image(dir.path(), "scan_2.tif", 2);
        write_image(dir.path(), "scan_1.tif", 1);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let frames = load_scan_set(dir.path(), None).unwrap();
        assert_eq!(frames.len(), 3);
        assert_relative_eq!(frames[0].intensity(0, 0), 1.0);
        assert_relative_eq!(frames[1].intensity(0, 0), 2.0);
        assert_relative_eq!(frames[2].intensity(0, 0), 10.0);
    }

    #[test]
    fn test_run_info_tags_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "scan_1.tif", 1);
        write_image(dir.path(), "scan_2.tif", 2);
        let info = RunInfo::from_entries(vec![
            RunEntry {
                energy: 8000.0,
                i0: None,
                exposure: Some(0.5),
            },
            RunEntry {
                energy: 8050.0,
                i0: None,
                exposure: None,
            },
        ]);
        let frames = load_scan_set(dir.path(), Some(&info)).unwrap();
        assert_relative_eq!(frames[0].incident_energy().unwrap(), 8000.0);
        assert_relative_eq!(frames[0].meta().exposure.unwrap(), 0.5);
        assert_relative_eq!(frames[1].incident_energy().unwrap(), 8050.0);
    }

    #[test]
    fn test_count_mismatch_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "scan_1.tif", 1);
        let info = RunInfo::from_entries(vec![
            RunEntry {
                energy: 8000.0,
                i0: None,
                exposure: None,
            },
            RunEntry {
                energy: 8050.0,
                i0: None,
                exposure: None,
            },
        ]);
        assert!(load_scan_set(dir.path(), Some(&info)).is_err());
    }
}
