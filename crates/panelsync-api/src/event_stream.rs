//! Incremental event-stream framing.
//!
//! Turns an arbitrarily chunked byte stream into discrete [`Frame`]s. A
//! record is a run of `key: value` lines terminated by a blank line
//! (`"\n\n"`). Only the `event` and `data` keys are retained.
//!
//! Framing is split in two layers:
//!
//! - [`FrameDecoder`] is synchronous and transport-free. It owns the
//!   accumulator, decodes UTF-8 across chunk boundaries and hands out one
//!   frame per call, in arrival order.
//! - [`FrameReader`] pulls chunks from an async byte stream, feeds the
//!   decoder and exposes a pull-based [`next()`](FrameReader::next). It adds
//!   cancellation and an optional read-idle timeout.
//!
//! # Example
//!
//! ```rust
//! use panelsync_api::FrameDecoder;
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.push(b"event: counters\ndata: {\"app\":{}}\n\nevent: cou");
//!
//! let frame = decoder.next_frame().expect("first record is complete");
//! assert_eq!(frame.event.as_deref(), Some("counters"));
//! assert!(decoder.next_frame().is_none());
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Error;

/// Blank line closing a record.
const TERMINATOR: &str = "\n\n";

/// Key/value separator. Only the first occurrence on a line splits.
const SEPARATOR: &str = ": ";

/// Largest unterminated record a [`FrameReader`] buffers by default.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1 << 20;

// ── Frame ────────────────────────────────────────────────────────────

/// One record extracted from the event stream.
///
/// A record without recognised fields is valid and yields an empty frame.
/// If a field repeats within one record, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: Option<String>,
}

impl Frame {
    /// `true` when the record carried neither `event` nor `data`.
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none()
    }

    /// Parse one record (without its terminator) into a frame.
    ///
    /// Lines that do not contain `": "` are ignored, as are keys other than
    /// `event` and `data`.
    pub fn parse(record: &str) -> Self {
        let mut frame = Self::default();

        for line in record.split('\n') {
            let Some((key, value)) = line.split_once(SEPARATOR) else {
                continue;
            };
            match key {
                "event" => frame.event = Some(value.to_owned()),
                "data" => frame.data = Some(value.to_owned()),
                _ => trace!(key, "ignoring event-stream field"),
            }
        }

        frame
    }
}

// ── FrameDecoder ─────────────────────────────────────────────────────

/// Accumulates raw chunks and splits them into frames.
///
/// Every terminator in the buffer is honoured, not only one at the very
/// end, so a chunk carrying several records yields each of them in turn.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Decoded text not yet claimed by a complete record.
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    undecoded: Vec<u8>,
    /// Offset in `text` before which no terminator starts.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of raw bytes.
    ///
    /// A multi-byte character cut by the chunk boundary is held back until
    /// the rest of it arrives. Bytes that can never form valid UTF-8 are
    /// replaced with U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) {
        self.undecoded.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.undecoded);
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(valid));

                    match err.error_len() {
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            self.undecoded.extend_from_slice(after);
                            break;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            rest = after.get(len..).unwrap_or_default();
                        }
                    }
                }
            }
        }
    }

    /// Take the next complete record out of the buffer, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let Some(found) = self.text[self.scanned..].find(TERMINATOR) else {
            // A trailing '\n' may be the first half of the next terminator.
            self.scanned = self.text.len() - usize::from(self.text.ends_with('\n'));
            return None;
        };
        let end = self.scanned + found + TERMINATOR.len();
        let record: String = self.text.drain(..end).collect();
        self.scanned = 0;
        Some(Frame::parse(&record))
    }

    /// Text received after the last complete record.
    pub fn pending(&self) -> &str {
        &self.text
    }

    /// Discard and return the unterminated remainder (plus any undecodable
    /// trailing bytes, lossily decoded).
    pub fn finish(&mut self) -> String {
        self.scanned = 0;
        let mut tail = std::mem::take(&mut self.text);
        if !self.undecoded.is_empty() {
            tail.push_str(&String::from_utf8_lossy(&self.undecoded));
            self.undecoded.clear();
        }
        tail
    }
}

// ── FrameReader ──────────────────────────────────────────────────────

/// Pull-based frame sequence over an async chunk stream.
///
/// Not restartable: once the underlying stream ends (or the reader is
/// cancelled) every further call returns `Ok(None)`.
pub struct FrameReader<S> {
    chunks: S,
    decoder: FrameDecoder,
    idle_timeout: Option<Duration>,
    max_record: usize,
    cancel: CancellationToken,
    finished: bool,
}

impl<S> FrameReader<S>
where
    S: Stream<Item = Result<Bytes, Error>> + Unpin,
{
    pub fn new(chunks: S, cancel: CancellationToken) -> Self {
        Self {
            chunks,
            decoder: FrameDecoder::new(),
            idle_timeout: None,
            max_record: DEFAULT_MAX_RECORD_BYTES,
            cancel,
            finished: false,
        }
    }

    /// Fail with [`Error::StreamStalled`] when no chunk arrives within
    /// `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Fail with [`Error::RecordTooLarge`] once more than `bytes` of an
    /// unterminated record are buffered.
    pub fn with_max_record(mut self, bytes: usize) -> Self {
        self.max_record = bytes;
        self
    }

    /// Next frame, `Ok(None)` at end of stream or after cancellation.
    ///
    /// Frames already buffered are handed out before any further read.
    pub async fn next(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }
            if self.decoder.pending().len() > self.max_record {
                self.finished = true;
                self.decoder.finish();
                return Err(Error::RecordTooLarge {
                    limit: self.max_record,
                });
            }

            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                chunk = read_chunk(&mut self.chunks, self.idle_timeout) => Some(chunk),
            };

            let Some(chunk) = read else {
                debug!("event stream read cancelled");
                self.finished = true;
                return Ok(None);
            };

            match chunk? {
                Some(bytes) => {
                    trace!(len = bytes.len(), "event stream chunk");
                    self.decoder.push(&bytes);
                }
                None => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    if !tail.is_empty() {
                        debug!(
                            dropped_bytes = tail.len(),
                            "event stream ended inside a record"
                        );
                    }
                }
            }
        }
    }
}

async fn read_chunk<S>(chunks: &mut S, idle_timeout: Option<Duration>) -> Result<Option<Bytes>, Error>
where
    S: Stream<Item = Result<Bytes, Error>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, chunks.next())
            .await
            .map_err(|_| Error::StreamStalled {
                idle_secs: limit.as_secs(),
            })?,
        None => chunks.next().await,
    };
    next.transpose()
}

// ── Tests ────────────────────────────────────────────────────────────
