// src/types.rs
//
// Values that cross module boundaries: the decoded reading handed to sinks.

use serde::{Deserialize, Serialize};

/// One decoded motor voltage sample, published once per accepted frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotorVoltageReading {
    /// Frame identifier minus the family's motor offset.
    pub motor_id: u32,
    /// Supply voltage in volts.
    #[serde(rename = "motor_v")]
    pub voltage: f64,
}
