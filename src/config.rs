use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extract::{ExtractorConfig, MalformedPolicy, SinkPolicy};
use crate::sink::directory::{DirectoryConfig, DEFAULT_FILE_PREFIX, DEFAULT_OUTPUT_DIR};
use crate::source::StreamEncoding;

const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_BAUD_RATE: u32 = 115_200;
const DEFAULT_READ_TIMEOUT_MS: u64 = 500;
/// Smallest frame the extractor can emit: `FF D8 FF D9`.
const MIN_FRAME_BYTES: usize = 4;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    encoding: Option<StreamEncoding>,
    serial: Option<SerialConfigFile>,
    output: Option<OutputConfigFile>,
    extractor: Option<ExtractorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SerialConfigFile {
    port: Option<String>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    file_prefix: Option<String>,
    start_index: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ExtractorConfigFile {
    max_frame_bytes: Option<usize>,
    max_tokens: Option<u64>,
    on_malformed: Option<MalformedPolicy>,
    on_sink_error: Option<SinkPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub encoding: StreamEncoding,
    pub serial: SerialSettings,
    pub output: DirectoryConfig,
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// How long a read may block before the run loop checks for a stop request.
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        // Infallible: an empty file section means all defaults.
        Self::from_file(CaptureConfigFile::default())
    }
}

impl CaptureConfig {
    /// Defaults, then the JSON file named by `CAPTURE_CONFIG`, then `CAPTURE_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAPTURE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific JSON file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CaptureConfigFile) -> Self {
        let serial = file.serial.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        let extractor = file.extractor.unwrap_or_default();
        Self {
            encoding: file.encoding.unwrap_or_default(),
            serial: SerialSettings {
                port: serial
                    .port
                    .unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
                baud_rate: serial.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
                read_timeout: Duration::from_millis(
                    serial.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
                ),
            },
            output: DirectoryConfig {
                dir: output
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                file_prefix: output
                    .file_prefix
                    .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string()),
                start_index: output.start_index.unwrap_or(0),
            },
            extractor: ExtractorConfig {
                max_frame_bytes: extractor.max_frame_bytes,
                max_tokens: extractor.max_tokens,
                on_malformed: extractor.on_malformed.unwrap_or_default(),
                on_sink_error: extractor.on_sink_error.unwrap_or_default(),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(port) = non_empty_env("CAPTURE_SERIAL_PORT") {
            self.serial.port = port;
        }
        if let Some(baud) = non_empty_env("CAPTURE_BAUD_RATE") {
            self.serial.baud_rate = baud
                .parse()
                .map_err(|_| anyhow!("CAPTURE_BAUD_RATE must be a positive integer"))?;
        }
        if let Some(timeout) = non_empty_env("CAPTURE_READ_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|_| {
                anyhow!("CAPTURE_READ_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.serial.read_timeout = Duration::from_millis(millis);
        }
        if let Some(dir) = non_empty_env("CAPTURE_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(prefix) = non_empty_env("CAPTURE_FILE_PREFIX") {
            self.output.file_prefix = prefix;
        }
        if let Some(limit) = non_empty_env("CAPTURE_MAX_FRAME_BYTES") {
            let bytes: usize = limit
                .parse()
                .map_err(|_| anyhow!("CAPTURE_MAX_FRAME_BYTES must be an integer byte count"))?;
            self.extractor.max_frame_bytes = Some(bytes);
        }
        if let Some(encoding) = non_empty_env("CAPTURE_ENCODING") {
            self.encoding = encoding.parse()?;
        }
        Ok(())
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&mut self) -> Result<()> {
        self.serial.port = self.serial.port.trim().to_string();
        if self.serial.port.is_empty() {
            return Err(anyhow!("serial port must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("baud rate must be greater than zero"));
        }
        if self.serial.read_timeout.is_zero() {
            return Err(anyhow!("read timeout must be greater than zero"));
        }
        if let Some(limit) = self.extractor.max_frame_bytes {
            if limit < MIN_FRAME_BYTES {
                return Err(anyhow!(
                    "max_frame_bytes must be at least {} (an empty JPEG)",
                    MIN_FRAME_BYTES
                ));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
