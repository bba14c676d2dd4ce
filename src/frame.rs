//! Completed JPEG frames.
//!
//! - `Frame`: an immutable byte sequence cut from the stream between a start
//!   marker and the next end marker, both inclusive.
//! - `START_MARKER` / `END_MARKER`: the two-byte JPEG boundary markers.
//!
//! A `Frame` is only constructed by the extractor, so every instance begins
//! with `FF D8` and ends with `FF D9`. Nothing between the markers is inspected.

use std::fmt;

/// JPEG start-of-image marker.
pub const START_MARKER: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const END_MARKER: [u8; 2] = [0xFF, 0xD9];

/// A completed image buffer.
///
/// There is no public constructor: the only way to obtain a `Frame` is from
/// `FrameExtractor`, which guarantees both markers are present.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a finished pending buffer. Called only by the extractor.
    pub(crate) fn from_pending(data: Vec<u8>) -> Self {
        debug_assert!(data.starts_with(&START_MARKER));
        debug_assert!(data.ends_with(&END_MARKER));
        debug_assert!(data.len() >= START_MARKER.len() + END_MARKER.len());
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes between the markers.
    pub fn payload(&self) -> &[u8] {
        &self.data[START_MARKER.len()..self.data.len() - END_MARKER.len()]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

// Frames can be hundreds of kilobytes; never dump the bytes into logs.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("len", &self.data.len()).finish()
    }
}
