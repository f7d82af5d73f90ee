//! Frame queue between acquisition monitoring and extraction.
//!
//! The directory watcher (or any other acquisition collaborator) owns a
//! [`FrameSender`] and pushes frames as they appear; the extraction side
//! owns the [`FrameQueue`] and drains it from a single consumer task,
//! which also gives the running aggregate its single writer.
//!
//! ```
//! use rustxes_io::frame_queue;
//! # use ndarray::Array2;
//! # use rustxes_core::frame::{Frame, FrameId, FrameMeta};
//!
//! let (sender, queue) = frame_queue();
//! # let frame = Frame::new(Array2::<f64>::zeros((2, 2)), FrameMeta::new(FrameId(0))).unwrap();
//! sender.send(frame).unwrap();
//! drop(sender);
//! for frame in queue {
//!     // extract and merge
//!     let _ = frame;
//! }
//! ```

use std::sync::mpsc;

use rustxes_core::frame::Frame;

use crate::error::{Error, Result};

/// Producer half of a frame queue.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
}

impl FrameSender {
    /// Pushes a frame to the consumer.
    ///
    /// # Errors
    /// Returns [`Error::QueueClosed`] when the consumer is gone; the
    /// frame is dropped in that case.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).map_err(|_| Error::QueueClosed)
    }
}

/// Consumer half of a frame queue.
#[derive(Debug)]
pub struct FrameQueue {
    rx: mpsc::Receiver<Frame>,
}

impl FrameQueue {
    /// Blocks until the next frame arrives.
    ///
    /// Returns `None` once every sender is dropped and the queue is
    /// drained.
    #[must_use]
    pub fn recv(&self) -> Option<Frame> {
        self.rx.recv().ok()
    }

    /// Returns the next frame if one is already queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

impl IntoIterator for FrameQueue {
    type Item = Frame;
    type IntoIter = mpsc::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

/// Creates a connected sender/queue pair.
#[must_use]
pub fn frame_queue() -> (FrameSender, FrameQueue) {
    let (tx, rx) = mpsc::channel();
    (FrameSender { tx }, FrameQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rustxes_core::frame::{FrameId, FrameMeta};

    fn frame(id: u64) -> Frame {
        Frame::new(Array2::<f64>::zeros((2, 2)), FrameMeta::new(FrameId(id))).unwrap()
    }

    #[test]
    fn test_frames_arrive_in_push_order() {
        let (sender, queue) = frame_queue();
        let producer = std::thread::spawn(move || {
            for id in 0..4 {
                sender.send(frame(id)).unwrap();
            }
        });
        let ids: Vec<u64> = queue.into_iter().map(|f| f.id().as_u64()).collect();
        producer.join().unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_send_after_consumer_dropped() {
        let (sender, queue) = frame_queue();
        drop(queue);
        assert!(matches!(sender.send(frame(0)), Err(Error::QueueClosed)));
    }

    #[test]
    fn test_try_recv_on_empty_queue() {
        let (_sender, queue) = frame_queue();
        assert!(queue.try_recv().is_none());
    }
}
