//! Serial JPEG capture
//!
//! This crate reconstructs JPEG images from a camera that streams them over a
//! serial line with no framing beyond the JPEG markers themselves.
//!
//! # Architecture
//!
//! A single pull loop moves bytes from a source to a sink:
//!
//! 1. **Source**: yields one token per read (a hex line or a raw byte), or
//!    reports a timeout or end-of-stream.
//! 2. **Token decoding**: turns a one- or two-character hex token into a byte.
//! 3. **Extractor**: tracks the last two bytes and cuts frames from a start
//!    marker (`FF D8`) to the next end marker (`FF D9`).
//! 4. **Sink**: stores each completed frame (numbered files on disk).
//!
//! # Module Structure
//!
//! - `frame`: `Frame` and the marker constants
//! - `token`: hex token decoding
//! - `extract`: `FrameExtractor` state machine and run loop
//! - `source`: byte sources (hex lines, raw bytes, serial port)
//! - `sink`: frame sinks (directory of numbered files, in-memory)
//! - `config`: layered capture configuration
//! - `stop`: cooperative cancellation

pub mod config;
pub mod error;
pub mod extract;
pub mod frame;
pub mod sink;
pub mod source;
pub mod stop;
pub mod token;

pub use config::{CaptureConfig, SerialSettings};
pub use error::ExtractError;
pub use extract::{
    ExtractorConfig, FrameExtractor, LostFrame, MalformedPolicy, RunStats, ScanState, ScanStats,
    SinkPolicy, StopReason,
};
pub use frame::{Frame, END_MARKER, START_MARKER};
pub use sink::{DirectoryConfig, DirectorySink, FrameSink};
pub use source::{ByteSource, HexLineSource, RawByteSource, SourceEvent, StreamEncoding};
pub use stop::StopSignal;
pub use token::{decode_token, TokenError};
