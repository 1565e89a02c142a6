// src/sink/mod.rs
//
// Output sinks for decoded readings. The pipeline owns exactly one sink and
// injects it into the decoder; sinks never see raw frames.

mod json;
mod memory;
mod mqtt;

pub use json::JsonLinesSink;
pub use memory::MemorySink;
pub use mqtt::{drain_event_loop, MqttConfig, MqttSink};

use crate::error::SinkError;
use crate::types::MotorVoltageReading;

/// Destination for decoded readings.
pub trait ReadingSink {
    /// Hand one reading to the sink. Must not block on a full queue.
    fn publish(&mut self, reading: &MotorVoltageReading) -> Result<(), SinkError>;
}

impl<S: ReadingSink + ?Sized> ReadingSink for Box<S> {
    fn publish(&mut self, reading: &MotorVoltageReading) -> Result<(), SinkError> {
        (**self).publish(reading)
    }
}
