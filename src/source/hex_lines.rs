//! Line-oriented hex transport.
//!
//! The firmware writes every byte as its hex digits followed by a newline.
//! Each non-blank line becomes one `SourceEvent::Hex` token, trimmed of
//! surrounding whitespace. Decoding is left to the extractor.

use std::io::{self, BufRead};

use super::{is_timeout, ByteSource, SourceEvent};

/// Reads one hex token per line.
pub struct HexLineSource<R> {
    reader: R,
    line: Vec<u8>,
    // The last call handed out `line`; clear it before reading again.
    consumed: bool,
    lines_read: u64,
}

impl<R: BufRead> HexLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(8),
            consumed: false,
            lines_read: 0,
        }
    }

    /// Number of non-blank lines handed out so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> ByteSource for HexLineSource<R> {
    fn next_token(&mut self) -> io::Result<SourceEvent<'_>> {
        if self.consumed {
            self.line.clear();
            self.consumed = false;
        }
        loop {
            // On a timeout `read_until` leaves the partial line in `self.line`;
            // the next call picks up where it stopped.
            let read = match self.reader.read_until(b'\n', &mut self.line) {
                Ok(read) => read,
                Err(err) if is_timeout(&err) => return Ok(SourceEvent::Idle),
                Err(err) => return Err(err),
            };
            if self.line.trim_ascii().is_empty() {
                if read == 0 {
                    return Ok(SourceEvent::End);
                }
                self.line.clear();
                continue;
            }
            break;
        }
        self.consumed = true;
        self.lines_read += 1;
        Ok(SourceEvent::Hex(self.line.trim_ascii()))
    }
}
