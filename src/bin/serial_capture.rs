//! serial_capture - Capture JPEG images streamed by a serial camera.
//!
//! This binary:
//! 1. Loads configuration (defaults, `CAPTURE_CONFIG` JSON, `CAPTURE_*` env, flags)
//! 2. Opens the serial port
//! 3. Extracts frames between JPEG markers and writes them as numbered files
//! 4. Stops on Ctrl-C or end-of-stream, optionally reconnecting after transport errors

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use serial_jpeg_capture::source::open_serial_source;
use serial_jpeg_capture::{
    CaptureConfig, DirectorySink, ExtractError, FrameExtractor, MalformedPolicy, SinkPolicy,
    StopReason, StopSignal, StreamEncoding,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Capture JPEG images streamed over a serial port"
)]
struct Args {
    /// Serial device (e.g. /dev/ttyUSB0 or COM5).
    #[arg(long, env = "CAPTURE_SERIAL_PORT")]
    port: Option<String>,

    /// Baud rate.
    #[arg(long, env = "CAPTURE_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// Directory that receives the numbered images.
    #[arg(long, env = "CAPTURE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// File name prefix for stored images.
    #[arg(long, env = "CAPTURE_FILE_PREFIX")]
    file_prefix: Option<String>,

    /// First image index.
    #[arg(long)]
    start_index: Option<u64>,

    /// Wire encoding of the byte stream.
    #[arg(long, value_enum, env = "CAPTURE_ENCODING")]
    encoding: Option<StreamEncoding>,

    /// Discard a pending image once it exceeds this many bytes.
    #[arg(long, env = "CAPTURE_MAX_FRAME_BYTES")]
    max_frame_bytes: Option<usize>,

    /// Handling of tokens that are not one or two hex digits.
    #[arg(long, value_enum)]
    on_malformed: Option<MalformedPolicy>,

    /// Handling of images that fail to write.
    #[arg(long, value_enum)]
    on_sink_error: Option<SinkPolicy>,

    /// Reopen the port after a transport error, waiting this many seconds.
    #[arg(long, env = "CAPTURE_RECONNECT_DELAY_SECS")]
    reconnect_delay_secs: Option<u64>,
}

impl Args {
    fn apply(self, cfg: &mut CaptureConfig) {
        if let Some(port) = self.port {
            cfg.serial.port = port;
        }
        if let Some(baud_rate) = self.baud_rate {
            cfg.serial.baud_rate = baud_rate;
        }
        if let Some(dir) = self.output_dir {
            cfg.output.dir = dir;
        }
        if let Some(prefix) = self.file_prefix {
            cfg.output.file_prefix = prefix;
        }
        if let Some(start_index) = self.start_index {
            cfg.output.start_index = start_index;
        }
        if let Some(encoding) = self.encoding {
            cfg.encoding = encoding;
        }
        if let Some(limit) = self.max_frame_bytes {
            cfg.extractor.max_frame_bytes = Some(limit);
        }
        if let Some(policy) = self.on_malformed {
            cfg.extractor.on_malformed = policy;
        }
        if let Some(policy) = self.on_sink_error {
            cfg.extractor.on_sink_error = policy;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let reconnect_delay = args.reconnect_delay_secs.map(Duration::from_secs);

    let mut cfg = CaptureConfig::load()?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping capture...");
        handler_stop.stop();
    })
    .expect("error setting Ctrl-C handler");

    let mut sink = DirectorySink::new(cfg.output.clone())?;
    let mut extractor = FrameExtractor::new(cfg.extractor.clone());

    log::info!(
        "serial_capture running. writing to {}",
        sink.root().display()
    );

    loop {
        let result = open_serial_source(&cfg.serial, cfg.encoding)
            .map_err(ExtractOrSetup::Setup)
            .and_then(|mut source| {
                extractor
                    .run(&mut source, &mut sink, &stop)
                    .map_err(ExtractOrSetup::Extract)
            });

        match result {
            Ok(stats) => {
                log::info!(
                    "capture finished ({:?}): {} images stored, {} lost, {} tokens read",
                    stats.reason,
                    stats.frames_stored,
                    stats.sink_failures,
                    stats.tokens_read
                );
                if stats.reason != StopReason::EndOfStream || reconnect_delay.is_none() {
                    return Ok(());
                }
            }
            Err(err) => {
                if reconnect_delay.is_none() || !err.is_transport() {
                    return Err(err.into());
                }
                log::warn!("serial input failed: {}", err);
            }
        }

        // A frame half-received before the disconnect cannot be completed.
        extractor.reset();
        let delay = reconnect_delay.unwrap_or_default();
        log::info!("reconnecting to {} in {}s", cfg.serial.port, delay.as_secs());
        std::thread::sleep(delay);
        if stop.is_stopped() {
            return Ok(());
        }
    }
}

/// Distinguishes failures worth a reconnect from configuration and data errors.
#[derive(Debug, thiserror::Error)]
enum ExtractOrSetup {
    #[error(transparent)]
    Setup(anyhow::Error),
    #[error(transparent)]
    Extract(ExtractError),
}

impl ExtractOrSetup {
    fn is_transport(&self) -> bool {
        matches!(
            self,
            ExtractOrSetup::Setup(_) | ExtractOrSetup::Extract(ExtractError::Source(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_jpeg_capture::TokenError;
    use std::io;

    #[test]
    fn port_and_read_failures_trigger_reconnect() {
        let setup = ExtractOrSetup::Setup(anyhow::anyhow!("no such device /dev/ttyUSB0"));
        let unplugged = ExtractOrSetup::Extract(ExtractError::Source(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "device unplugged",
        )));
        assert!(setup.is_transport());
        assert!(unplugged.is_transport());
    }

    #[test]
    fn token_and_sink_failures_are_fatal() {
        let token = ExtractOrSetup::Extract(ExtractError::Token {
            tokens_read: 7,
            source: TokenError::MalformedEncoding { len: 3 },
        });
        let sink = ExtractOrSetup::Extract(ExtractError::Sink {
            index: 0,
            source: "disk full".into(),
        });
        assert!(!token.is_transport());
        assert!(!sink.is_transport());
    }
}
