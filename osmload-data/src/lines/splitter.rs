//! Synchronous newline splitter shared by every [`super::LineReader`].
//!
//! The splitter owns the byte-level rules: reassembling lines across chunk
//! boundaries, enforcing the byte limit without buffering past it, and
//! deciding what happens to trailing bytes at end of input. Keeping it free
//! of I/O lets chunk-boundary behaviour be tested directly.

use std::collections::VecDeque;
use std::mem;

use log::{debug, warn};
use osmload_core::TooLongLinePolicy;

use super::{LineEvent, LineEventSink, LineReadError, LineReaderOptions};

/// A decoded line and its 1-based position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedLine {
    /// Physical line number, counting dropped lines.
    pub number: u64,
    /// Decoded text without the terminating newline.
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
struct Overflow {
    bytes: usize,
    limit: usize,
}

/// Incremental `\n` splitter.
///
/// # Examples
/// ```
/// use std::collections::VecDeque;
/// use osmload_data::lines::{LineEvent, LineSplitter, LineReaderOptions};
///
/// let mut splitter = LineSplitter::new(&LineReaderOptions::default());
/// let mut lines = VecDeque::new();
/// let mut sink = |_: LineEvent| {};
/// splitter.feed(b"al", &mut lines, &mut sink)?;
/// splitter.feed(b"pha\nbe", &mut lines, &mut sink)?;
/// splitter.finish(&mut lines, &mut sink);
/// let texts: Vec<_> = lines.into_iter().map(|line| line.text).collect();
/// assert_eq!(texts, ["alpha", "be"]);
/// # Ok::<(), osmload_data::lines::LineReadError>(())
/// ```
#[derive(Debug)]
pub struct LineSplitter {
    max_line_bytes: Option<usize>,
    too_long_line: TooLongLinePolicy,
    flush_final_partial_line: bool,
    buffer: Vec<u8>,
    overflow: Option<Overflow>,
    completed: u64,
}

impl LineSplitter {
    /// Create a splitter honouring the limit and policies in `options`.
    #[must_use]
    pub const fn new(options: &LineReaderOptions) -> Self {
        Self {
            max_line_bytes: options.max_line_bytes,
            too_long_line: options.too_long_line,
            flush_final_partial_line: options.flush_final_partial_line,
            buffer: Vec::new(),
            overflow: None,
            completed: 0,
        }
    }

    /// Number of the line currently being assembled.
    #[must_use]
    pub const fn current_line(&self) -> u64 {
        self.completed + 1
    }

    /// Split `chunk`, appending every completed line to `out`.
    ///
    /// Lines completed before a failure remain in `out`.
    ///
    /// # Errors
    /// Returns [`LineReadError::LineTooLong`] when a line passes the limit
    /// under [`TooLongLinePolicy::Error`]. The splitter must not be fed again
    /// afterwards.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        out: &mut VecDeque<NumberedLine>,
        sink: &mut dyn LineEventSink,
    ) -> Result<(), LineReadError> {
        let mut rest = chunk;
        while let Some(index) = rest.iter().position(|byte| *byte == b'\n') {
            let (segment, tail) = rest.split_at(index);
            self.extend(segment)?;
            self.end_line(out, sink);
            rest = tail.get(1..).unwrap_or_default();
        }
        self.extend(rest)
    }

    /// Handle whatever is left once the input is exhausted.
    ///
    /// Undelimited trailing bytes become a final line, or are reported as a
    /// [`LineEvent::PartialLineDropped`] when flushing is disabled. A line
    /// still being discarded for its length is reported as
    /// [`LineEvent::TooLong`].
    pub fn finish(&mut self, out: &mut VecDeque<NumberedLine>, sink: &mut dyn LineEventSink) {
        if let Some(overflow) = self.overflow.take() {
            self.report_overflow(overflow, sink);
            return;
        }
        if self.buffer.is_empty() {
            return;
        }
        let bytes = mem::take(&mut self.buffer);
        if self.flush_final_partial_line {
            self.push_line(bytes, out);
        } else {
            warn!(
                "dropping {} undelimited byte(s) at end of input (line {})",
                bytes.len(),
                self.current_line()
            );
            sink.on_event(LineEvent::PartialLineDropped { bytes: bytes.len() });
        }
    }

    fn extend(&mut self, segment: &[u8]) -> Result<(), LineReadError> {
        if let Some(overflow) = self.overflow.as_mut() {
            overflow.bytes = overflow.bytes.saturating_add(segment.len());
            return Ok(());
        }
        let total = self.buffer.len().saturating_add(segment.len());
        match self.max_line_bytes {
            Some(limit) if total > limit => match self.too_long_line {
                TooLongLinePolicy::Error => Err(LineReadError::LineTooLong {
                    line: self.current_line(),
                    bytes: total,
                    limit,
                }),
                TooLongLinePolicy::Skip => {
                    self.buffer = Vec::new();
                    self.overflow = Some(Overflow {
                        bytes: total,
                        limit,
                    });
                    Ok(())
                }
            },
            _ => {
                self.buffer.extend_from_slice(segment);
                Ok(())
            }
        }
    }

    fn end_line(&mut self, out: &mut VecDeque<NumberedLine>, sink: &mut dyn LineEventSink) {
        if let Some(overflow) = self.overflow.take() {
            self.report_overflow(overflow, sink);
        } else {
            let bytes = mem::take(&mut self.buffer);
            self.push_line(bytes, out);
        }
        self.completed += 1;
    }

    fn push_line(&self, bytes: Vec<u8>, out: &mut VecDeque<NumberedLine>) {
        let text = String::from_utf8(bytes)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());
        out.push_back(NumberedLine {
            number: self.current_line(),
            text,
        });
    }

    fn report_overflow(&self, overflow: Overflow, sink: &mut dyn LineEventSink) {
        debug!(
            "skipping line {}: {} bytes exceeds the {}-byte limit",
            self.current_line(),
            overflow.bytes,
            overflow.limit
        );
        sink.on_event(LineEvent::TooLong {
            bytes: overflow.bytes,
            limit: overflow.limit,
        });
    }
}
