// src/sink/memory.rs
//
// In-process sink that records readings. Clones share the same record, so a
// test can keep one handle while the pipeline owns the other.

use std::sync::{Arc, Mutex};

use super::ReadingSink;
use crate::error::SinkError;
use crate::types::MotorVoltageReading;

#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    readings: Arc<Mutex<Vec<MotorVoltageReading>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn readings(&self) -> Vec<MotorVoltageReading> {
        self.readings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReadingSink for MemorySink {
    fn publish(&mut self, reading: &MotorVoltageReading) -> Result<(), SinkError> {
        self.readings
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink poisoned".to_string()))?
            .push(*reading);
        Ok(())
    }
}
