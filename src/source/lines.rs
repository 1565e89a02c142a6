// src/source/lines.rs
//
// Pull-based iterator over capture lines with explicit termination reasons.

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use super::{FrameSource, Poll};

/// Why a line stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source reached end of stream.
    Closed,
    /// A read failed mid-stream; treated as closure.
    ReadFailed(String),
    /// The stop flag was observed between reads.
    Stopped,
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEnd::Closed => write!(f, "source closed"),
            StreamEnd::ReadFailed(e) => write!(f, "read error: {}", e),
            StreamEnd::Stopped => write!(f, "stopped"),
        }
    }
}

/// Lines from a `FrameSource` that contain the filter token.
///
/// The filter is a cheap substring check that spares the decoder most foreign
/// traffic; the decoder still validates every line it receives. An empty
/// filter passes everything.
pub struct FrameLines<S> {
    source: S,
    filter: String,
    stop_flag: Arc<AtomicBool>,
    end: Option<StreamEnd>,
    lines_read: u64,
}

impl<S: FrameSource> FrameLines<S> {
    pub fn new(source: S, filter: impl Into<String>, stop_flag: Arc<AtomicBool>) -> Self {
        Self {
            source,
            filter: filter.into(),
            stop_flag,
            end: None,
            lines_read: 0,
        }
    }

    pub fn label(&self) -> &str {
        self.source.label()
    }

    /// Substring a line must contain to be yielded.
    pub fn filter_token(&self) -> &str {
        &self.filter
    }

    /// Termination reason, once the iterator has returned `None`.
    pub fn end(&self) -> Option<&StreamEnd> {
        self.end.as_ref()
    }

    /// Lines read from the source, including filtered ones.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    fn finish(&mut self, end: StreamEnd) {
        self.source.close();
        self.end = Some(end);
    }
}

impl<S: FrameSource> Iterator for FrameLines<S> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.end.is_some() {
                return None;
            }

            if self.stop_flag.load(Ordering::Relaxed) {
                self.finish(StreamEnd::Stopped);
                continue;
            }

            match self.source.poll_line() {
                Ok(Poll::Line(line)) => {
                    self.lines_read += 1;
                    if self.filter.is_empty() || line.contains(self.filter.as_str()) {
                        return Some(line);
                    }
                }
                Ok(Poll::Idle) => {
                    // Read timeout - loop to re-check the stop flag
                }
                Ok(Poll::Closed) => self.finish(StreamEnd::Closed),
                Err(e) => self.finish(StreamEnd::ReadFailed(e.to_string())),
            }
        }
    }
}

impl<S: FrameSource> std::iter::FusedIterator for FrameLines<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReaderSource;
    use std::collections::VecDeque;
    use std::io;

    fn lines_over(text: &str, filter: &str) -> FrameLines<ReaderSource<io::Cursor<Vec<u8>>>> {
        let source = ReaderSource::new("test", io::Cursor::new(text.as_bytes().to_vec()));
        FrameLines::new(source, filter, Arc::new(AtomicBool::new(false)))
    }

    /// Replays scripted poll results.
    struct Scripted {
        polls: VecDeque<io::Result<Poll>>,
        closed: bool,
    }

    impl FrameSource for Scripted {
        fn label(&self) -> &str {
            "scripted"
        }

        fn poll_line(&mut self) -> io::Result<Poll> {
            self.polls.pop_front().unwrap_or(Ok(Poll::Closed))
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn test_filter_token_skips_lines() {
        let mut lines = lines_over("can0 241 [8] 9A\ncan0 100 [8] 11\ncan0 242 [8] 9A\n", "9A");
        assert_eq!(lines.filter_token(), "9A");
        assert_eq!(lines.next().as_deref(), Some("can0 241 [8] 9A"));
        assert_eq!(lines.next().as_deref(), Some("can0 242 [8] 9A"));
        assert_eq!(lines.next(), None);
        assert_eq!(lines.end(), Some(&StreamEnd::Closed));
        assert_eq!(lines.lines_read(), 3);
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let lines: Vec<String> = lines_over("a\nb\r\n\nc", "").collect();
        assert_eq!(lines, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_stop_flag_checked_before_read() {
        let stop_flag = Arc::new(AtomicBool::new(true));
        let source = ReaderSource::new("test", io::Cursor::new(b"9A\n".to_vec()));
        let mut lines = FrameLines::new(source, "9A", stop_flag);
        assert_eq!(lines.next(), None);
        assert_eq!(lines.end(), Some(&StreamEnd::Stopped));
        assert_eq!(lines.lines_read(), 0);
    }

    #[test]
    fn test_stop_between_lines() {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let source = ReaderSource::new("test", io::Cursor::new(b"9A 1\n9A 2\n".to_vec()));
        let mut lines = FrameLines::new(source, "9A", stop_flag.clone());
        assert_eq!(lines.next().as_deref(), Some("9A 1"));
        stop_flag.store(true, Ordering::Relaxed);
        assert_eq!(lines.next(), None);
        assert_eq!(lines.end(), Some(&StreamEnd::Stopped));
    }

    #[test]
    fn test_read_error_ends_stream() {
        let source = Scripted {
            polls: VecDeque::from(vec![
                Ok(Poll::Line("9A".to_string())),
                Ok(Poll::Idle),
                Err(io::Error::new(io::ErrorKind::Other, "device gone")),
                Ok(Poll::Line("9A never".to_string())),
            ]),
            closed: false,
        };
        let mut lines = FrameLines::new(source, "9A", Arc::new(AtomicBool::new(false)));
        assert_eq!(lines.next().as_deref(), Some("9A"));
        assert_eq!(lines.next(), None);
        assert_eq!(
            lines.end(),
            Some(&StreamEnd::ReadFailed("device gone".to_string()))
        );
        // Fused: the line after the error is never read
        assert_eq!(lines.next(), None);
        assert!(lines.source.closed);
    }

    #[test]
    fn test_stream_end_display() {
        assert_eq!(StreamEnd::Closed.to_string(), "source closed");
        assert_eq!(StreamEnd::Stopped.to_string(), "stopped");
        assert_eq!(
            StreamEnd::ReadFailed("x".to_string()).to_string(),
            "read error: x"
        );
    }
}
