// src/source/mod.rs
//
// Capture sources. Each source yields one text line per CAN frame in the
// capture tool's format; `FrameLines` turns a source into the filtered,
// stoppable line stream the decoder consumes.
//
// Sources:
// - command.rs   - stdout of a capture command (e.g. `candump can0`)
// - ReaderSource - any buffered reader (stdin, files, test fixtures)
// - socketcan.rs - Linux SocketCAN interface rendered as candump lines

mod command;
mod lines;
mod socketcan;

pub use command::CommandSource;
pub use lines::{FrameLines, StreamEnd};
pub use socketcan::render_candump_line;
#[cfg(target_os = "linux")]
pub use socketcan::SocketCanSource;

use std::io::{self, BufRead};

use crate::config::{SourceConfig, SourceKind};
use crate::error::MonitorError;

// ============================================================================
// Source Trait
// ============================================================================

/// Result of one read attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    /// One capture line, without its line terminator.
    Line(String),
    /// Nothing arrived before the read timeout.
    Idle,
    /// End of stream.
    Closed,
}

/// A blocking source of capture lines.
pub trait FrameSource: Send {
    /// Human-readable source description for logs (e.g. `command(candump can0)`).
    fn label(&self) -> &str;

    /// Block until a line arrives, the source closes, or a read timeout elapses.
    fn poll_line(&mut self) -> io::Result<Poll>;

    /// Release the underlying resource. Called once the stream has ended.
    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn poll_line(&mut self) -> io::Result<Poll> {
        (**self).poll_line()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// ============================================================================
// Buffered Reader Source
// ============================================================================

/// Line source over any buffered reader.
pub struct ReaderSource<R> {
    label: String,
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead + Send> ReaderSource<R> {
    pub fn new(label: impl Into<String>, reader: R) -> Self {
        Self {
            label: label.into(),
            reader,
            buf: Vec::with_capacity(128),
        }
    }
}

impl ReaderSource<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new("stdin", io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send> FrameSource for ReaderSource<R> {
    fn label(&self) -> &str {
        &self.label
    }

    fn poll_line(&mut self) -> io::Result<Poll> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(Poll::Closed);
        }

        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }

        // Capture tools emit ASCII; a stray byte should cost one frame, not the stream
        Ok(Poll::Line(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

// ============================================================================
// Source Factory
// ============================================================================

/// Open the configured source. Failure here is fatal for the run.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, MonitorError> {
    match config.kind {
        SourceKind::Command => Ok(Box::new(CommandSource::spawn(&config.command)?)),
        SourceKind::Stdin => Ok(Box::new(ReaderSource::stdin())),
        SourceKind::Socketcan => open_socketcan(&config.interface),
    }
}

#[cfg(target_os = "linux")]
fn open_socketcan(interface: &str) -> Result<Box<dyn FrameSource>, MonitorError> {
    Ok(Box::new(SocketCanSource::open(interface)?))
}

#[cfg(not(target_os = "linux"))]
fn open_socketcan(interface: &str) -> Result<Box<dyn FrameSource>, MonitorError> {
    Err(MonitorError::source_unavailable(
        &format!("socketcan({})", interface),
        "SocketCAN is only available on Linux",
    ))
}
