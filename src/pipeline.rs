// src/pipeline.rs
//
// Read -> decode -> emit loop. One frame is processed start to finish before
// the next read; the stop flag is observed between frames.

use std::sync::{atomic::AtomicBool, Arc};

use crate::decoder::{FrameDecoder, Outcome};
use crate::sink::ReadingSink;
use crate::source::{FrameLines, FrameSource, StreamEnd};

/// Counters and termination reason of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Lines read from the source, before the filter token check
    pub lines_read: u64,
    /// Lines that passed the filter and reached the decoder
    pub lines_decoded: u64,
    pub readings_emitted: u64,
    pub frames_discarded: u64,
    pub sink_failures: u64,
    pub end: StreamEnd,
}

pub struct Pipeline<S, K> {
    lines: FrameLines<S>,
    decoder: FrameDecoder,
    sink: K,
    stop_flag: Arc<AtomicBool>,
    stats_interval: u64,
}

impl<S: FrameSource, K: ReadingSink> Pipeline<S, K> {
    pub fn new(source: S, filter: &str, decoder: FrameDecoder, sink: K) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        Self {
            lines: FrameLines::new(source, filter, stop_flag.clone()),
            decoder,
            sink,
            stop_flag,
            stats_interval: 0,
        }
    }

    /// Log counters every `lines` lines read (0 disables).
    pub fn with_stats_interval(mut self, lines: u64) -> Self {
        self.stats_interval = lines;
        self
    }

    /// Setting this flag ends the run at the next frame boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn run(mut self) -> RunSummary {
        let family = self.decoder.family();
        tlog!(
            "[pipeline] Reading {} (filter {:?}, ids 0x{:X}+{}, layout {:?}, id base {:?}, pace {:?})",
            self.lines.label(),
            self.lines.filter_token(),
            family.base_id(),
            family.size(),
            self.decoder.layout(),
            self.decoder.id_base(),
            self.decoder.pacer().interval()
        );

        let mut lines_decoded = 0u64;
        let mut readings_emitted = 0u64;
        let mut frames_discarded = 0u64;
        let mut sink_failures = 0u64;
        let mut next_stats = self.stats_interval;

        while let Some(line) = self.lines.next() {
            lines_decoded += 1;

            match self.decoder.process(&line, &mut self.sink) {
                Outcome::Emitted(frame, reading) => {
                    if readings_emitted == 0 {
                        tlog!(
                            "[pipeline] First reading: {} -> motor {} at {:.1} V",
                            frame,
                            reading.motor_id,
                            reading.voltage
                        );
                    }
                    readings_emitted += 1;
                }
                // Foreign and malformed traffic is expected on a shared bus
                Outcome::Discarded(_) => frames_discarded += 1,
                Outcome::SinkFailed(reading, e) => {
                    sink_failures += 1;
                    tlog!(
                        "[pipeline] Dropped reading for motor {}: {}",
                        reading.motor_id,
                        e
                    );
                }
            }

            if self.stats_interval > 0 && self.lines.lines_read() >= next_stats {
                next_stats = self.lines.lines_read() + self.stats_interval;
                tlog!(
                    "[pipeline] {} lines read, {} decoded, {} readings, {} discarded, {} sink failures",
                    self.lines.lines_read(),
                    lines_decoded,
                    readings_emitted,
                    frames_discarded,
                    sink_failures
                );
            }
        }

        let end = self.lines.end().cloned().unwrap_or(StreamEnd::Closed);
        let summary = RunSummary {
            lines_read: self.lines.lines_read(),
            lines_decoded,
            readings_emitted,
            frames_discarded,
            sink_failures,
            end,
        };

        tlog!(
            "[pipeline] Stream ended ({}): {} lines read, {} readings emitted, {} discarded, {} sink failures",
            summary.end,
            summary.lines_read,
            summary.readings_emitted,
            summary.frames_discarded,
            summary.sink_failures
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FrameLayout, IdBase, MotorFamily, Pacer};
    use crate::error::SinkError;
    use crate::sink::MemorySink;
    use crate::source::ReaderSource;
    use crate::types::MotorVoltageReading;
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    const CAPTURE: &str = "\
  can0  241   [8]  9A 32 00 01 E5 01 04 00
  can0  100   [8]  11 22 33 44 55 66 77 88
  can0  242   [8]  9A 32 00 01 10 02 04 00
  can0  245   [8]  9A 32 00 01 10 02 04 00
  can0  243   [5]  9A 32 00 01 E5
  can0  244   [8]  9A 32 00 01 G0 02 04 00
";

    fn decoder() -> FrameDecoder {
        FrameDecoder::new(
            FrameLayout::CANDUMP,
            IdBase::Hex,
            MotorFamily::default(),
            Pacer::disabled(),
        )
        .unwrap()
    }

    fn source(text: &str) -> ReaderSource<Cursor<Vec<u8>>> {
        ReaderSource::new("fixture", Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_run_over_capture() {
        let sink = MemorySink::new();
        let summary = Pipeline::new(source(CAPTURE), "9A", decoder(), sink.clone()).run();

        assert_eq!(
            sink.readings(),
            vec![
                MotorVoltageReading {
                    motor_id: 0x141,
                    voltage: 48.5
                },
                MotorVoltageReading {
                    motor_id: 0x142,
                    voltage: 52.8
                },
            ]
        );
        assert_eq!(summary.lines_read, 6);
        assert_eq!(summary.lines_decoded, 5);
        assert_eq!(summary.readings_emitted, 2);
        assert_eq!(summary.frames_discarded, 3);
        assert_eq!(summary.sink_failures, 0);
        assert_eq!(summary.end, StreamEnd::Closed);
    }

    #[test]
    fn test_empty_capture_ends_cleanly() {
        let sink = MemorySink::new();
        let summary = Pipeline::new(source(""), "9A", decoder(), sink.clone()).run();
        assert!(sink.readings().is_empty());
        assert_eq!(summary.end, StreamEnd::Closed);
        assert_eq!(summary.lines_read, 0);
    }

    #[test]
    fn test_partial_last_line_is_discarded() {
        let sink = MemorySink::new();
        let summary = Pipeline::new(
            source("  can0  241   [8]  9A 32 00 01 E5"),
            "9A",
            decoder(),
            sink.clone(),
        )
        .run();
        assert!(sink.readings().is_empty());
        assert_eq!(summary.frames_discarded, 1);
        assert_eq!(summary.end, StreamEnd::Closed);
    }

    #[test]
    fn test_stop_before_run() {
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(source(CAPTURE), "9A", decoder(), sink.clone());
        pipeline.stop_handle().store(true, Ordering::Relaxed);
        let summary = pipeline.run();
        assert!(sink.readings().is_empty());
        assert_eq!(summary.end, StreamEnd::Stopped);
    }

    #[test]
    fn test_sink_failures_do_not_stop_reading() {
        /// Refuses every other reading.
        struct Flaky {
            calls: u32,
            accepted: Vec<MotorVoltageReading>,
        }

        impl ReadingSink for Flaky {
            fn publish(&mut self, reading: &MotorVoltageReading) -> Result<(), SinkError> {
                self.calls += 1;
                if self.calls % 2 == 1 {
                    return Err(SinkError::Unavailable("queue full".to_string()));
                }
                self.accepted.push(*reading);
                Ok(())
            }
        }

        let capture = CAPTURE.repeat(2);
        let summary = Pipeline::new(
            source(&capture),
            "9A",
            decoder(),
            Flaky {
                calls: 0,
                accepted: Vec::new(),
            },
        )
        .with_stats_interval(4)
        .run();

        assert_eq!(summary.readings_emitted, 2);
        assert_eq!(summary.sink_failures, 2);
        assert_eq!(summary.end, StreamEnd::Closed);
    }
}
