//! Byte stream to line sequence conversion.
//!
//! [`LineReader`] pulls fixed-size chunks from any [`AsyncRead`] and hands
//! them to a [`LineSplitter`], yielding decoded lines one at a time. Dropped
//! lines are reported through a [`LineEventSink`] rather than silently
//! discarded.
//!
//! # Examples
//! ```
//! use osmload_core::TooLongLinePolicy;
//! use osmload_data::lines::{LineEvent, LineReader, LineReaderOptions};
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
//! # runtime.block_on(async {
//! let options = LineReaderOptions::default()
//!     .with_max_line_bytes(3)
//!     .with_too_long_line(TooLongLinePolicy::Skip);
//! let mut dropped = Vec::new();
//! let mut reader = LineReader::new(&b"abcd\nef"[..], options)
//!     .with_sink(|event: LineEvent| dropped.push(event));
//! let mut lines = Vec::new();
//! while let Some(line) = reader.next_line().await? {
//!     lines.push(line);
//! }
//! drop(reader);
//! assert_eq!(lines, ["ef"]);
//! assert_eq!(dropped, [LineEvent::TooLong { bytes: 4, limit: 3 }]);
//! # Ok::<(), osmload_data::lines::LineReadError>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod splitter;


use std::collections::VecDeque;
use std::io;

use futures_util::Stream;
use osmload_core::TooLongLinePolicy;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub use splitter::{LineSplitter, NumberedLine};

/// Default read size for each pull from the underlying stream.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Errors raised while reading lines.
#[derive(Debug, Error)]
pub enum LineReadError {
    /// A line passed the byte limit under the `error` policy.
    #[error("line {line} is at least {bytes} bytes long, over the {limit}-byte limit")]
    LineTooLong {
        /// 1-based line number.
        line: u64,
        /// Bytes observed before giving up.
        bytes: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The underlying stream failed.
    #[error("failed to read input: {source}")]
    Io {
        /// I/O error reported by the stream.
        #[source]
        source: io::Error,
    },
}

/// Something the reader dropped instead of yielding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// A line longer than `limit` was discarded under the `skip` policy.
    TooLong {
        /// Bytes the line held, excluding the newline.
        bytes: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Undelimited trailing bytes were discarded.
    PartialLineDropped {
        /// Number of trailing bytes.
        bytes: usize,
    },
}

/// Receives [`LineEvent`]s as they happen.
pub trait LineEventSink {
    /// Handle one event.
    fn on_event(&mut self, event: LineEvent);
}

impl<F: FnMut(LineEvent)> LineEventSink for F {
    fn on_event(&mut self, event: LineEvent) {
        self(event);
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreEvents;

impl LineEventSink for IgnoreEvents {
    fn on_event(&mut self, _event: LineEvent) {}
}

/// Limits and policies for a [`LineReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReaderOptions {
    /// Longest line, in bytes excluding the newline, that will be yielded.
    pub max_line_bytes: Option<usize>,
    /// What to do with lines over `max_line_bytes`.
    pub too_long_line: TooLongLinePolicy,
    /// Yield undelimited trailing bytes as a final line.
    pub flush_final_partial_line: bool,
    /// Bytes requested from the stream per read.
    pub chunk_size: usize,
}

impl Default for LineReaderOptions {
    fn default() -> Self {
        Self {
            max_line_bytes: None,
            too_long_line: TooLongLinePolicy::default(),
            flush_final_partial_line: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl LineReaderOptions {
    /// Set the line length limit.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = Some(limit);
        self
    }

    /// Set the policy for lines over the limit.
    #[must_use]
    pub const fn with_too_long_line(mut self, policy: TooLongLinePolicy) -> Self {
        self.too_long_line = policy;
        self
    }

    /// Choose whether undelimited trailing bytes are yielded.
    #[must_use]
    pub const fn with_flush_final_partial_line(mut self, flush: bool) -> Self {
        self.flush_final_partial_line = flush;
        self
    }

    /// Set the read size. Zero is treated as one.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Lazily yields decoded lines from an async byte stream.
///
/// Lines are split on `\n` only; a preceding `\r` is left in place. Invalid
/// UTF-8 is replaced with U+FFFD.
#[derive(Debug)]
pub struct LineReader<R, S = IgnoreEvents> {
    reader: R,
    splitter: LineSplitter,
    sink: S,
    ready: VecDeque<NumberedLine>,
    chunk: Vec<u8>,
    failure: Option<LineReadError>,
    exhausted: bool,
    last_line: u64,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap `reader` with the given options and no event sink.
    #[must_use]
    pub fn new(reader: R, options: LineReaderOptions) -> Self {
        Self {
            reader,
            splitter: LineSplitter::new(&options),
            sink: IgnoreEvents,
            ready: VecDeque::new(),
            chunk: vec![0; options.chunk_size.max(1)],
            failure: None,
            exhausted: false,
            last_line: 0,
        }
    }
}

impl<R: AsyncRead + Unpin, S: LineEventSink> LineReader<R, S> {
    /// Replace the event sink.
    #[must_use]
    pub fn with_sink<T: LineEventSink>(self, sink: T) -> LineReader<R, T> {
        LineReader {
            reader: self.reader,
            splitter: self.splitter,
            sink,
            ready: self.ready,
            chunk: self.chunk,
            failure: self.failure,
            exhausted: self.exhausted,
            last_line: self.last_line,
        }
    }

    /// The event sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Line number of the most recently yielded line, or 0 before the first.
    #[must_use]
    pub const fn line_number(&self) -> u64 {
        self.last_line
    }

    /// Yield the next line, or `None` once the input is exhausted.
    ///
    /// # Errors
    /// Returns [`LineReadError`] when the stream fails or a line breaks the
    /// limit under the `error` policy. Lines completed before the failure are
    /// yielded first; after the error the reader yields `None`.
    pub async fn next_line(&mut self) -> Result<Option<String>, LineReadError> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                self.last_line = line.number;
                return Ok(Some(line.text));
            }
            if let Some(failure) = self.failure.take() {
                return Err(failure);
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fill().await;
        }
    }

    /// Adapt the reader into a [`Stream`] of lines.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, LineReadError>> {
        futures_util::stream::unfold(self, |mut reader| async move {
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), reader)),
                Ok(None) => None,
                Err(err) => Some((Err(err), reader)),
            }
        })
    }

    async fn fill(&mut self) {
        let read = match self.reader.read(&mut self.chunk).await {
            Ok(read) => read,
            Err(source) if source.kind() == io::ErrorKind::Interrupted => return,
            Err(source) => {
                self.fail(LineReadError::Io { source });
                return;
            }
        };
        if read == 0 {
            self.exhausted = true;
            self.splitter.finish(&mut self.ready, &mut self.sink);
            return;
        }
        let filled = self.chunk.get(..read).unwrap_or_default();
        if let Err(err) = self.splitter.feed(filled, &mut self.ready, &mut self.sink) {
            self.fail(err);
        }
    }

    fn fail(&mut self, err: LineReadError) {
        self.exhausted = true;
        self.failure = Some(err);
    }
}
