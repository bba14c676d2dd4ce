//! Byte sources.
//!
//! This module provides the transports the extractor can read from:
//! - `HexLineSource`: one hex-encoded byte per line (the camera firmware's format)
//! - `RawByteSource`: plain binary stream, one byte per read
//! - `open_serial` (feature `serial`): a configured serial port handle
//!
//! Sources are responsible for:
//! - Splitting the transport into tokens
//! - Reporting a read timeout as `SourceEvent::Idle` rather than an error
//! - Reporting a clean end-of-stream as `SourceEvent::End`
//!
//! Sources MUST NOT:
//! - Interpret JPEG markers
//! - Buffer more than one pending token

use std::io::{self, BufReader, Read};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Deserialize;

pub mod hex_lines;
pub mod raw;
#[cfg(feature = "serial")]
pub mod serial;

pub use hex_lines::HexLineSource;
pub use raw::RawByteSource;
#[cfg(feature = "serial")]
pub use serial::{open_serial, open_serial_source};

/// One read from a byte source.
#[derive(Debug, PartialEq, Eq)]
pub enum SourceEvent<'a> {
    /// A hex token that still needs decoding (one or two characters).
    Hex(&'a [u8]),
    /// An already-decoded byte.
    Byte(u8),
    /// Nothing arrived before the read timeout.
    Idle,
    /// The stream ended cleanly.
    End,
}

/// A blocking producer of stream tokens.
pub trait ByteSource {
    /// Block until the next token, a timeout, or end-of-stream.
    ///
    /// Errors are transport failures and end the run.
    fn next_token(&mut self) -> io::Result<SourceEvent<'_>>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn next_token(&mut self) -> io::Result<SourceEvent<'_>> {
        (**self).next_token()
    }
}

/// How bytes are encoded on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StreamEncoding {
    /// One byte per line as one or two hex characters.
    #[default]
    HexLines,
    /// Binary bytes as-is.
    Raw,
}

impl FromStr for StreamEncoding {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hex-lines" | "hex" => Ok(Self::HexLines),
            "raw" | "binary" => Ok(Self::Raw),
            other => Err(anyhow!(
                "unknown stream encoding '{}'; expected hex-lines or raw",
                other
            )),
        }
    }
}

/// Wrap a reader in the source matching `encoding`.
pub fn from_reader<R: Read + 'static>(reader: R, encoding: StreamEncoding) -> Box<dyn ByteSource> {
    let reader = BufReader::new(reader);
    match encoding {
        StreamEncoding::HexLines => Box::new(HexLineSource::new(reader)),
        StreamEncoding::Raw => Box::new(RawByteSource::new(reader)),
    }
}

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
