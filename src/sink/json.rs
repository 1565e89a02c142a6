// src/sink/json.rs
//
// Newline-delimited JSON sink: one `{"motor_id":..,"motor_v":..}` per line.

use std::io::{self, Write};

use super::ReadingSink;
use crate::error::SinkError;
use crate::types::MotorVoltageReading;

pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReadingSink for JsonLinesSink<W> {
    fn publish(&mut self, reading: &MotorVoltageReading) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, reading)?;
        self.writer.write_all(b"\n")?;
        // Downstream consumers read line by line; don't sit in the buffer
        self.writer.flush()?;
        Ok(())
    }
}
