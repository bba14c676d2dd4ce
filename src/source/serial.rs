//! Serial port transport.
//!
//! Opens the camera's port with 8N1 framing and a bounded read timeout. The
//! timeout is what lets a blocking run loop notice a stop request: a read that
//! times out surfaces as `SourceEvent::Idle`, not as an error.

use anyhow::{Context, Result};
use serialport::{DataBits, Parity, SerialPort, StopBits};

use super::{from_reader, ByteSource, StreamEncoding};
use crate::config::SerialSettings;

/// Open the configured serial port.
pub fn open_serial(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    serialport::new(settings.port.as_str(), settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(settings.read_timeout)
        .open()
        .with_context(|| {
            format!(
                "open serial port {} at {} baud",
                settings.port, settings.baud_rate
            )
        })
}

/// Open the configured serial port and wrap it for `encoding`.
pub fn open_serial_source(
    settings: &SerialSettings,
    encoding: StreamEncoding,
) -> Result<Box<dyn ByteSource>> {
    let port = open_serial(settings)?;
    log::info!(
        "opened {} at {} baud ({:?}, read timeout {:?})",
        settings.port,
        settings.baud_rate,
        encoding,
        settings.read_timeout
    );
    Ok(from_reader(port, encoding))
}
