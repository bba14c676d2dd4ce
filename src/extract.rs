//! Streaming JPEG frame extraction.
//!
//! `FrameExtractor` watches a byte stream for the JPEG start marker (`FF D8`)
//! and end marker (`FF D9`) and cuts the bytes between them, markers included,
//! into `Frame`s. The scan keeps only the two most recent bytes; markers are
//! never searched for inside the pending buffer.
//!
//! - A start marker always restarts the pending buffer as `[FF, D8]`, which
//!   drops both pre-marker noise and a truncated earlier image.
//! - An end marker completes a frame only after a start marker was seen.
//! - Bytes outside a frame are dropped.
//! - No JPEG structure is validated.
//!
//! `FrameExtractor::run` drives the scan from a `ByteSource` into a
//! `FrameSink` until end-of-stream, a stop request, or the token budget.

use serde::Deserialize;

use crate::error::ExtractError;
use crate::frame::{Frame, END_MARKER, START_MARKER};
use crate::sink::FrameSink;
use crate::source::{ByteSource, SourceEvent};
use crate::stop::StopSignal;
use crate::token::decode_token;

/// What to do with a token that does not decode to a byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// End the run with `ExtractError::Token`.
    #[default]
    Fail,
    /// Log, count and ignore the token. The byte registers are not shifted.
    Skip,
}

/// What to do when the sink fails to store a completed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SinkPolicy {
    /// Log and count the lost frame, keep extracting.
    #[default]
    Continue,
    /// End the run with `ExtractError::Sink`.
    Abort,
}

/// Extractor tuning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Upper bound on a pending frame. `None` lets the buffer grow without limit.
    pub max_frame_bytes: Option<usize>,
    /// Stop `run` after this many tokens. `None` runs until end-of-stream or stop.
    pub max_tokens: Option<u64>,
    pub on_malformed: MalformedPolicy,
    pub on_sink_error: SinkPolicy,
}

/// Scanner state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    /// No start marker since the last frame; bytes are dropped.
    SeekingStart,
    /// Collecting bytes after a start marker.
    Accumulating,
}

/// Counters kept across the lifetime of an extractor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_scanned: u64,
    pub frames_completed: u64,
    /// Start markers seen while a frame was already pending.
    pub resyncs: u64,
    /// Pending frames discarded for exceeding `max_frame_bytes`.
    pub overflows: u64,
}

/// Why `run` returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    EndOfStream,
    Stopped,
    TokenBudget,
}

/// Outcome of one `run`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub reason: StopReason,
    pub tokens_read: u64,
    pub skipped_tokens: u64,
    pub frames_stored: u64,
    pub sink_failures: u64,
    /// Bytes of an unterminated frame dropped because the stream ended.
    pub discarded_tail: usize,
    /// Bytes still pending after a stop or budget return; a later `run`
    /// on the same extractor continues that frame.
    pub pending_tail: usize,
}

/// A completed frame the sink failed to store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LostFrame {
    pub index: u64,
    pub len: usize,
}

type LossHandler = Box<dyn FnMut(LostFrame, &anyhow::Error) + Send>;

pub struct FrameExtractor {
    config: ExtractorConfig,
    previous: Option<u8>,
    current: Option<u8>,
    pending: Vec<u8>,
    state: ScanState,
    stats: ScanStats,
    next_index: u64,
    on_lost: Option<LossHandler>,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl FrameExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            previous: None,
            current: None,
            pending: Vec::new(),
            state: ScanState::SeekingStart,
            stats: ScanStats::default(),
            next_index: 0,
            on_lost: None,
        }
    }

    /// Call `handler` for every frame lost to a sink failure, as it happens.
    ///
    /// Only consulted under `SinkPolicy::Continue`; `Abort` returns the error.
    pub fn on_lost_frame<F>(mut self, handler: F) -> Self
    where
        F: FnMut(LostFrame, &anyhow::Error) + Send + 'static,
    {
        self.on_lost = Some(Box::new(handler));
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Forget the pending frame and both byte registers.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.previous = None;
        self.current = None;
        self.state = ScanState::SeekingStart;
    }

    /// Feed one byte. Returns a frame when this byte completes an end marker.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        self.previous = self.current.replace(byte);
        self.stats.bytes_scanned += 1;
        log::trace!("byte {:02x}", byte);

        if self.previous == Some(START_MARKER[0]) && byte == START_MARKER[1] {
            if self.state == ScanState::Accumulating {
                self.stats.resyncs += 1;
                log::debug!(
                    "start marker inside pending frame; dropping {} bytes",
                    self.pending.len().saturating_sub(1)
                );
            }
            self.pending.clear();
            self.pending.extend_from_slice(&START_MARKER);
            self.state = ScanState::Accumulating;
            return None;
        }

        if self.state == ScanState::SeekingStart {
            return None;
        }

        self.pending.push(byte);

        if let Some(limit) = self.config.max_frame_bytes {
            if self.pending.len() > limit {
                self.stats.overflows += 1;
                log::warn!(
                    "pending frame exceeded {} bytes without an end marker; discarding",
                    limit
                );
                self.pending.clear();
                self.state = ScanState::SeekingStart;
                return None;
            }
        }

        if self.previous == Some(END_MARKER[0]) && byte == END_MARKER[1] {
            let data = std::mem::take(&mut self.pending);
            self.previous = None;
            self.current = None;
            self.state = ScanState::SeekingStart;
            self.stats.frames_completed += 1;
            return Some(Frame::from_pending(data));
        }

        None
    }

    /// Feed a run of bytes, collecting every completed frame in order.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&byte| self.push(byte)).collect()
    }

    /// Pull tokens from `source` and hand completed frames to `sink`.
    ///
    /// Returns when the source ends, `stop` is raised, or the token budget is
    /// spent. A partially assembled frame is never emitted. At end-of-stream
    /// it is dropped and the extractor reset, so the next stream starts clean;
    /// after a stop or budget return it stays pending and a later `run` on the
    /// same extractor can finish it.
    pub fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        stop: &StopSignal,
    ) -> Result<RunStats, ExtractError>
    where
        S: ByteSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let mut stats = RunStats::default();

        loop {
            if stop.is_stopped() {
                stats.reason = StopReason::Stopped;
                break;
            }
            if let Some(budget) = self.config.max_tokens {
                if stats.tokens_read >= budget {
                    stats.reason = StopReason::TokenBudget;
                    break;
                }
            }

            let byte = match source.next_token()? {
                SourceEvent::End => {
                    stats.reason = StopReason::EndOfStream;
                    break;
                }
                SourceEvent::Idle => continue,
                SourceEvent::Byte(byte) => {
                    stats.tokens_read += 1;
                    byte
                }
                SourceEvent::Hex(raw) => {
                    stats.tokens_read += 1;
                    match decode_token(raw) {
                        Ok(byte) => byte,
                        Err(err) => match self.config.on_malformed {
                            MalformedPolicy::Fail => {
                                return Err(ExtractError::Token {
                                    tokens_read: stats.tokens_read,
                                    source: err,
                                })
                            }
                            MalformedPolicy::Skip => {
                                stats.skipped_tokens += 1;
                                log::warn!("skipping token {}: {}", stats.tokens_read, err);
                                continue;
                            }
                        },
                    }
                }
            };

            if let Some(frame) = self.push(byte) {
                self.deliver(frame, sink, &mut stats)?;
            }
        }

        if stats.reason == StopReason::EndOfStream {
            stats.discarded_tail = self.pending.len();
            self.reset();
            if stats.discarded_tail > 0 {
                log::info!(
                    "stream ended inside a frame; discarded {} bytes",
                    stats.discarded_tail
                );
            }
        } else {
            stats.pending_tail = self.pending.len();
            if stats.pending_tail > 0 {
                log::info!(
                    "run ended ({:?}) with {} bytes of a frame still pending",
                    stats.reason,
                    stats.pending_tail
                );
            }
        }
        Ok(stats)
    }

    fn deliver<K>(
        &mut self,
        frame: Frame,
        sink: &mut K,
        stats: &mut RunStats,
    ) -> Result<(), ExtractError>
    where
        K: FrameSink + ?Sized,
    {
        let index = self.next_index;
        self.next_index += 1;
        let len = frame.len();

        match sink.store(frame) {
            Ok(()) => {
                stats.frames_stored += 1;
                log::info!("frame #{} stored ({} bytes)", index, len);
                Ok(())
            }
            Err(err) => {
                stats.sink_failures += 1;
                match self.config.on_sink_error {
                    SinkPolicy::Continue => {
                        log::warn!("frame #{} lost ({} bytes): {:#}", index, len, err);
                        if let Some(handler) = self.on_lost.as_mut() {
                            handler(LostFrame { index, len }, &err);
                        }
                        Ok(())
                    }
                    SinkPolicy::Abort => Err(ExtractError::Sink {
                        index,
                        source: err.into(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{HexLineSource, RawByteSource};
    use anyhow::{anyhow, Result};
    use std::io::Cursor;

    fn frames_of(bytes: &[u8]) -> Vec<Vec<u8>> {
        FrameExtractor::default()
            .push_slice(bytes)
            .into_iter()
            .map(Frame::into_bytes)
            .collect()
    }

    fn hex_lines(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:x}\n", b)).collect()
    }

    fn raw_source(bytes: &[u8]) -> RawByteSource<Cursor<Vec<u8>>> {
        RawByteSource::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn single_frame_is_emitted_with_markers() {
        let stream = [0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9];
        assert_eq!(frames_of(&stream), vec![stream.to_vec()]);
    }

    #[test]
    fn start_marker_inside_frame_restarts_it() {
        let stream = [0xFF, 0xD8, 0xAA, 0xFF, 0xD8, 0xBB, 0xCC, 0xFF, 0xD9];
        assert_eq!(
            frames_of(&stream),
            vec![vec![0xFF, 0xD8, 0xBB, 0xCC, 0xFF, 0xD9]]
        );

        let mut extractor = FrameExtractor::default();
        extractor.push_slice(&stream);
        assert_eq!(extractor.stats().resyncs, 1);
    }

    #[test]
    fn leading_noise_is_dropped() {
        let stream = [0x11, 0x22, 0xFF, 0xD8, 0x33, 0xFF, 0xD9];
        assert_eq!(frames_of(&stream), vec![vec![0xFF, 0xD8, 0x33, 0xFF, 0xD9]]);
    }

    #[test]
    fn end_marker_before_any_start_is_ignored() {
        let stream = [0x10, 0xFF, 0xD9, 0xFF, 0xD8, 0x44, 0xFF, 0xD9];
        assert_eq!(frames_of(&stream), vec![vec![0xFF, 0xD8, 0x44, 0xFF, 0xD9]]);
    }

    #[test]
    fn sequential_frames_keep_order() {
        let first = vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9];
        let second = vec![0xFF, 0xD8, 0x02, 0x03, 0xFF, 0xD9];
        let third = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let stream = [first.clone(), vec![0x55], second.clone(), third.clone()].concat();
        assert_eq!(frames_of(&stream), vec![first, second, third]);
    }

    #[test]
    fn unterminated_frame_is_not_emitted() {
        let stream = [0xFF, 0xD8, 0x01, 0x02, 0xFF];
        let mut extractor = FrameExtractor::default();
        assert!(extractor.push_slice(&stream).is_empty());
        assert_eq!(extractor.state(), ScanState::Accumulating);
        assert_eq!(extractor.pending_len(), 5);
    }

    #[test]
    fn bytes_after_end_marker_need_a_new_start() {
        // Registers reset after a frame: the D8 right after the end marker
        // does not pair with the FF before it.
        let stream = [0xFF, 0xD8, 0xFF, 0xD9, 0xD8, 0x77, 0xFF, 0xD9];
        assert_eq!(frames_of(&stream), vec![vec![0xFF, 0xD8, 0xFF, 0xD9]]);
    }

    #[test]
    fn buffer_grows_without_limit_by_default() {
        let mut extractor = FrameExtractor::default();
        extractor.push_slice(&START_MARKER);
        let filler = vec![0x42u8; 1 << 20];
        assert!(extractor.push_slice(&filler).is_empty());
        assert_eq!(extractor.pending_len(), (1 << 20) + 2);
        assert_eq!(extractor.state(), ScanState::Accumulating);
        assert_eq!(extractor.stats().overflows, 0);
    }

    #[test]
    fn bounded_buffer_discards_and_resumes() {
        let mut extractor = FrameExtractor::new(ExtractorConfig {
            max_frame_bytes: Some(6),
            ..ExtractorConfig::default()
        });
        let oversized = [0xFF, 0xD8, 1, 2, 3, 4, 5, 0xFF, 0xD9];
        let fits = [0xFF, 0xD8, 1, 2, 0xFF, 0xD9];
        let frames = extractor.push_slice(&[&oversized[..], &fits[..]].concat());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &fits);
        assert_eq!(extractor.stats().overflows, 1);
    }

    #[test]
    fn reset_drops_pending_frame() {
        let mut extractor = FrameExtractor::default();
        extractor.push_slice(&[0xFF, 0xD8, 0x01, 0xFF]);
        extractor.reset();
        assert_eq!(extractor.pending_len(), 0);
        assert!(extractor.push_slice(&[0xD9]).is_empty());
    }

    #[test]
    fn run_over_hex_lines_tolerates_elided_zero() -> Result<()> {
        let frame = [0xFF, 0xD8, 0x0A, 0x00, 0x0F, 0xFF, 0xD9];
        // Mix short ("a") and padded ("0A") spellings of the same bytes.
        let input = "ff\nd8\na\n00\n0F\nFF\nd9\n";
        let mut source = HexLineSource::new(Cursor::new(input.as_bytes().to_vec()));
        let mut sink: Vec<Frame> = Vec::new();

        let stats = FrameExtractor::default().run(&mut source, &mut sink, &StopSignal::new())?;

        assert_eq!(stats.reason, StopReason::EndOfStream);
        assert_eq!(stats.tokens_read, 7);
        assert_eq!(stats.frames_stored, 1);
        assert_eq!(sink[0].as_bytes(), &frame);
        Ok(())
    }

    #[test]
    fn hex_and_raw_transports_agree() -> Result<()> {
        let stream = [0x07, 0xFF, 0xD8, 0x00, 0x0A, 0xA0, 0xFF, 0xD9, 0xFF, 0xD8, 0x01];
        let mut from_hex: Vec<Frame> = Vec::new();
        let mut from_raw: Vec<Frame> = Vec::new();

        let mut hex = HexLineSource::new(Cursor::new(hex_lines(&stream).into_bytes()));
        FrameExtractor::default().run(&mut hex, &mut from_hex, &StopSignal::new())?;
        FrameExtractor::default().run(&mut raw_source(&stream), &mut from_raw, &StopSignal::new())?;

        assert_eq!(from_hex, from_raw);
        assert_eq!(from_hex.len(), 1);
        Ok(())
    }

    #[test]
    fn run_reports_unterminated_tail() -> Result<()> {
        let mut sink: Vec<Frame> = Vec::new();
        let stats = FrameExtractor::default().run(
            &mut raw_source(&[0xFF, 0xD8, 0x01, 0x02]),
            &mut sink,
            &StopSignal::new(),
        )?;
        assert!(sink.is_empty());
        assert_eq!(stats.discarded_tail, 4);
        Ok(())
    }

    #[test]
    fn end_of_stream_drops_tail_before_next_stream() -> Result<()> {
        let mut extractor = FrameExtractor::default();
        let mut sink: Vec<Frame> = Vec::new();

        let first = extractor.run(
            &mut raw_source(&[0xFF, 0xD8, 0xAA]),
            &mut sink,
            &StopSignal::new(),
        )?;
        assert_eq!(first.discarded_tail, 3);
        assert_eq!(first.pending_tail, 0);
        assert_eq!(extractor.pending_len(), 0);
        assert_eq!(extractor.state(), ScanState::SeekingStart);

        let second = extractor.run(
            &mut raw_source(&[0xBB, 0xFF, 0xD9]),
            &mut sink,
            &StopSignal::new(),
        )?;
        assert_eq!(second.frames_stored, 0);
        assert!(sink.is_empty());
        Ok(())
    }

    #[test]
    fn budget_return_keeps_tail_for_the_same_stream() -> Result<()> {
        let mut extractor = FrameExtractor::new(ExtractorConfig {
            max_tokens: Some(3),
            ..ExtractorConfig::default()
        });
        let mut source = raw_source(&[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        let mut sink: Vec<Frame> = Vec::new();

        let first = extractor.run(&mut source, &mut sink, &StopSignal::new())?;
        assert_eq!(first.reason, StopReason::TokenBudget);
        assert_eq!(first.pending_tail, 3);
        assert_eq!(first.discarded_tail, 0);

        extractor.run(&mut source, &mut sink, &StopSignal::new())?;
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].as_bytes(), &[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        Ok(())
    }

    #[test]
    fn malformed_token_fails_by_default() {
        let mut source = HexLineSource::new(Cursor::new(b"ff\nd8\n123\n".to_vec()));
        let mut sink: Vec<Frame> = Vec::new();
        let err = FrameExtractor::default()
            .run(&mut source, &mut sink, &StopSignal::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Token {
                tokens_read: 3,
                source: crate::token::TokenError::MalformedEncoding { len: 3 }
            }
        ));
    }

    #[test]
    fn malformed_token_can_be_skipped() -> Result<()> {
        // "xx" between FF and D9 must not break the end marker pairing.
        let mut source =
            HexLineSource::new(Cursor::new(b"ff\nd8\n42\nff\nxx\nd9\n".to_vec()));
        let mut sink: Vec<Frame> = Vec::new();
        let mut extractor = FrameExtractor::new(ExtractorConfig {
            on_malformed: MalformedPolicy::Skip,
            ..ExtractorConfig::default()
        });

        let stats = extractor.run(&mut source, &mut sink, &StopSignal::new())?;

        assert_eq!(stats.skipped_tokens, 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].as_bytes(), &[0xFF, 0xD8, 0x42, 0xFF, 0xD9]);
        Ok(())
    }

    #[test]
    fn raised_stop_ends_run_before_reading() -> Result<()> {
        let stop = StopSignal::new();
        stop.stop();
        let mut source = raw_source(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let mut sink: Vec<Frame> = Vec::new();

        let stats = FrameExtractor::default().run(&mut source, &mut sink, &stop)?;

        assert_eq!(stats.reason, StopReason::Stopped);
        assert_eq!(stats.tokens_read, 0);
        assert!(sink.is_empty());
        Ok(())
    }

    /// Stops the run from inside the sink after the first frame.
    struct StopAfterFirst {
        stop: StopSignal,
        frames: Vec<Frame>,
    }

    impl FrameSink for StopAfterFirst {
        fn store(&mut self, frame: Frame) -> Result<()> {
            self.frames.push(frame);
            self.stop.stop();
            Ok(())
        }
    }

    #[test]
    fn stop_is_checked_between_reads() -> Result<()> {
        let stop = StopSignal::new();
        let mut sink = StopAfterFirst {
            stop: stop.clone(),
            frames: Vec::new(),
        };
        let stream = [0xFF, 0xD8, 0xFF, 0xD9, 0xFF, 0xD8, 0x01, 0xFF, 0xD9];

        let stats = FrameExtractor::default().run(&mut raw_source(&stream), &mut sink, &stop)?;

        assert_eq!(stats.reason, StopReason::Stopped);
        assert_eq!(stats.tokens_read, 4);
        assert_eq!(sink.frames.len(), 1);
        Ok(())
    }

    #[test]
    fn token_budget_bounds_the_run() -> Result<()> {
        let mut extractor = FrameExtractor::new(ExtractorConfig {
            max_tokens: Some(5),
            ..ExtractorConfig::default()
        });
        let mut source = raw_source(&[0xFF, 0xD8, 0x01, 0xFF, 0xD9, 0xFF, 0xD8]);
        let mut sink: Vec<Frame> = Vec::new();

        let stats = extractor.run(&mut source, &mut sink, &StopSignal::new())?;

        assert_eq!(stats.reason, StopReason::TokenBudget);
        assert_eq!(stats.tokens_read, 5);
        assert_eq!(sink.len(), 1);
        Ok(())
    }

    /// Fails every other store.
    struct FlakySink {
        calls: u32,
        stored: Vec<Frame>,
    }

    impl FrameSink for FlakySink {
        fn store(&mut self, frame: Frame) -> Result<()> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(anyhow!("disk full"));
            }
            self.stored.push(frame);
            Ok(())
        }
    }

    fn three_frames() -> Vec<u8> {
        [
            [0xFF, 0xD8, 0x01, 0xFF, 0xD9],
            [0xFF, 0xD8, 0x02, 0xFF, 0xD9],
            [0xFF, 0xD8, 0x03, 0xFF, 0xD9],
        ]
        .concat()
    }

    #[test]
    fn sink_failure_loses_frame_and_continues() -> Result<()> {
        let mut sink = FlakySink {
            calls: 0,
            stored: Vec::new(),
        };
        let stats = FrameExtractor::default().run(
            &mut raw_source(&three_frames()),
            &mut sink,
            &StopSignal::new(),
        )?;

        assert_eq!(stats.sink_failures, 2);
        assert_eq!(stats.frames_stored, 1);
        assert_eq!(sink.stored[0].payload(), &[0x02]);
        Ok(())
    }

    #[test]
    fn lost_frames_are_reported_as_they_happen() -> Result<()> {
        use std::sync::{Arc, Mutex};

        let lost = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&lost);
        let mut extractor = FrameExtractor::default().on_lost_frame(move |frame, err| {
            seen.lock().unwrap().push((frame, err.to_string()));
        });
        let mut sink = FlakySink {
            calls: 0,
            stored: Vec::new(),
        };

        extractor.run(&mut raw_source(&three_frames()), &mut sink, &StopSignal::new())?;

        let lost = lost.lock().unwrap();
        assert_eq!(
            *lost,
            vec![
                (LostFrame { index: 0, len: 5 }, "disk full".to_string()),
                (LostFrame { index: 2, len: 5 }, "disk full".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn sink_failure_aborts_when_configured() {
        let mut sink = FlakySink {
            calls: 0,
            stored: Vec::new(),
        };
        let mut extractor = FrameExtractor::new(ExtractorConfig {
            on_sink_error: SinkPolicy::Abort,
            ..ExtractorConfig::default()
        });

        let err = extractor
            .run(&mut raw_source(&three_frames()), &mut sink, &StopSignal::new())
            .unwrap_err();

        assert!(matches!(err, ExtractError::Sink { index: 0, .. }));
        assert!(err.to_string().contains("disk full"));
        assert!(sink.stored.is_empty());
    }

    #[test]
    fn source_failure_is_fatal() {
        struct Unplugged;
        impl ByteSource for Unplugged {
            fn next_token(&mut self) -> std::io::Result<SourceEvent<'_>> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device disconnected",
                ))
            }
        }
        let mut sink: Vec<Frame> = Vec::new();
        let err = FrameExtractor::default()
            .run(&mut Unplugged, &mut sink, &StopSignal::new())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Source(_)));
    }

    #[test]
    fn idle_reads_do_not_count_as_tokens() -> Result<()> {
        struct Scripted(Vec<SourceEvent<'static>>);
        impl ByteSource for Scripted {
            fn next_token(&mut self) -> std::io::Result<SourceEvent<'_>> {
                if self.0.is_empty() {
                    return Ok(SourceEvent::End);
                }
                Ok(self.0.remove(0))
            }
        }
        let mut source = Scripted(vec![
            SourceEvent::Hex(b"ff"),
            SourceEvent::Idle,
            SourceEvent::Hex(b"d8"),
            SourceEvent::Idle,
            SourceEvent::Idle,
            SourceEvent::Byte(0xFF),
            SourceEvent::Hex(b"D9"),
        ]);
        let mut sink: Vec<Frame> = Vec::new();

        let stats = FrameExtractor::default().run(&mut source, &mut sink, &StopSignal::new())?;

        assert_eq!(stats.tokens_read, 4);
        assert_eq!(sink.len(), 1);
        Ok(())
    }
}
