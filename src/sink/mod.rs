//! Frame sinks.
//!
//! A sink takes ownership of each completed frame. Where and how it is stored
//! is entirely the sink's business; the extractor only sees success or error.

use anyhow::Result;

use crate::frame::Frame;

pub mod directory;

pub use directory::{DirectoryConfig, DirectorySink};

/// Accepts completed frames for storage.
pub trait FrameSink {
    /// Store one frame. On error the frame is gone; there is no retry buffer.
    fn store(&mut self, frame: Frame) -> Result<()>;
}

impl FrameSink for Vec<Frame> {
    fn store(&mut self, frame: Frame) -> Result<()> {
        self.push(frame);
        Ok(())
    }
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn store(&mut self, frame: Frame) -> Result<()> {
        (**self).store(frame)
    }
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    fn store(&mut self, frame: Frame) -> Result<()> {
        (**self).store(frame)
    }
}
