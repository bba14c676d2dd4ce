//! extract_dump - Recover JPEG images from a captured serial dump.
//!
//! Reads a file (or stdin) recorded from the camera's serial line, in either
//! the hex-line or raw encoding, and writes every complete image it contains
//! as a numbered file. Useful for replaying captures without the device.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io;
use std::path::PathBuf;

use serial_jpeg_capture::source::from_reader;
use serial_jpeg_capture::{
    CaptureConfig, DirectorySink, FrameExtractor, MalformedPolicy, StopSignal, StreamEncoding,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Extract JPEG images from a recorded serial stream"
)]
struct Args {
    /// Dump file to read; `-` reads stdin.
    input: PathBuf,

    /// Directory that receives the numbered images.
    #[arg(long, env = "CAPTURE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// File name prefix for stored images.
    #[arg(long, env = "CAPTURE_FILE_PREFIX")]
    file_prefix: Option<String>,

    /// Encoding of the dump.
    #[arg(long, value_enum, env = "CAPTURE_ENCODING")]
    encoding: Option<StreamEncoding>,

    /// Discard a pending image once it exceeds this many bytes.
    #[arg(long)]
    max_frame_bytes: Option<usize>,

    /// Skip undecodable lines instead of stopping.
    #[arg(long)]
    skip_malformed: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = CaptureConfig::load()?;
    if let Some(dir) = args.output_dir {
        cfg.output.dir = dir;
    }
    if let Some(prefix) = args.file_prefix {
        cfg.output.file_prefix = prefix;
    }
    if let Some(encoding) = args.encoding {
        cfg.encoding = encoding;
    }
    if let Some(limit) = args.max_frame_bytes {
        cfg.extractor.max_frame_bytes = Some(limit);
    }
    if args.skip_malformed {
        cfg.extractor.on_malformed = MalformedPolicy::Skip;
    }
    cfg.validate()?;

    let mut source = if args.input.as_os_str() == "-" {
        from_reader(io::stdin(), cfg.encoding)
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("open dump {}", args.input.display()))?;
        from_reader(file, cfg.encoding)
    };
    let mut sink = DirectorySink::new(cfg.output.clone())?;
    let mut extractor = FrameExtractor::new(cfg.extractor.clone());

    let stats = extractor.run(&mut source, &mut sink, &StopSignal::new())?;

    println!(
        "{} images written to {} ({} lost, {} tokens read, {} skipped, {} resyncs, {} overflows)",
        stats.frames_stored,
        sink.root().display(),
        stats.sink_failures,
        stats.tokens_read,
        stats.skipped_tokens,
        extractor.stats().resyncs,
        extractor.stats().overflows
    );
    if stats.discarded_tail > 0 {
        println!(
            "dump ended inside an image; {} trailing bytes discarded",
            stats.discarded_tail
        );
    }
    Ok(())
}
