//! rustxes-io: The external-collaborator boundary of the pipeline.
//!
//! Decodes detector images into [`rustxes_core::Frame`]s, parses
//! calibration run-info tables, enumerates scan-set directories, and
//! provides the frame queue through which an acquisition monitor feeds
//! the extraction stage.
//!

pub mod error;
pub mod queue;
pub mod reader;
pub mod runinfo;
pub mod scanset;

pub use error::{Error, Result};
pub use queue::{frame_queue, FrameQueue, FrameSender};
pub use reader::load_frame;
pub use runinfo::{RunEntry, RunInfo};
pub use scanset::load_scan_set;
