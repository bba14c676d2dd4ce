use std::io::{self, BufRead};

use super::{is_timeout, ByteSource, SourceEvent};

/// Binary transport: every byte read is a token.
pub struct RawByteSource<R> {
    reader: R,
    bytes_read: u64,
}

impl<R: BufRead> RawByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: BufRead> ByteSource for RawByteSource<R> {
    fn next_token(&mut self) -> io::Result<SourceEvent<'_>> {
        let byte = loop {
            match self.reader.fill_buf() {
                Ok([]) => return Ok(SourceEvent::End),
                Ok(available) => break available[0],
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Ok(SourceEvent::Idle),
                Err(err) => return Err(err),
            }
        };
        self.reader.consume(1);
        self.bytes_read += 1;
        Ok(SourceEvent::Byte(byte))
    }
}
