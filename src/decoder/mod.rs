// src/decoder/mod.rs
//
// Motor status frame decoder.
//
// Accepts capture lines from the frame source, keeps only the motor status
// frame family, extracts the supply voltage and hands one reading per frame
// to the injected sink.
//
// Voltage field: data bytes 4 (LSB) and 5 (MSB), uint16 little-endian, 0.1 V/LSB.

pub mod codec;
mod pacing;

pub use codec::{parse_frame, DecodeError, FrameLayout, IdBase, ParsedFrame};
pub use pacing::{Pacer, DEFAULT_PACE_MS};

use crate::error::{MonitorError, SinkError};
use crate::sink::ReadingSink;
use crate::types::MotorVoltageReading;

// ============================================================================
// Constants
// ============================================================================

/// First motor status reply identifier.
pub const DEFAULT_BASE_ID: u32 = 0x241;
/// Number of consecutive status identifiers (one per motor).
pub const DEFAULT_FAMILY_SIZE: u32 = 4;
/// Subtracted from the identifier to form `motor_id`.
pub const DEFAULT_MOTOR_OFFSET: u32 = 0x100;

/// Index of the voltage LSB in the data window; the MSB follows it.
const VOLTAGE_LSB_INDEX: usize = 4;
/// Raw voltage counts per volt (0.1 V/LSB).
const COUNTS_PER_VOLT: f64 = 10.0;

/// Shortest data window the decoder will extract from.
pub const MIN_DATA_WIDTH: usize = 8;

// ============================================================================
// Motor Family
// ============================================================================

/// The consecutive identifiers that carry motor status, and the offset that
/// maps them to motor ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotorFamily {
    base_id: u32,
    size: u32,
    motor_offset: u32,
}

impl MotorFamily {
    pub fn new(base_id: u32, size: u32, motor_offset: u32) -> Result<Self, MonitorError> {
        if size == 0 {
            return Err(MonitorError::config("motor family size must be at least 1"));
        }
        if base_id.checked_add(size - 1).is_none() {
            return Err(MonitorError::config(format!(
                "motor family 0x{:X} + {} overflows the identifier range",
                base_id, size
            )));
        }
        if motor_offset > base_id {
            return Err(MonitorError::config(format!(
                "motor offset 0x{:X} exceeds base identifier 0x{:X}",
                motor_offset, base_id
            )));
        }
        Ok(Self {
            base_id,
            size,
            motor_offset,
        })
    }

    pub fn contains(&self, identifier: u32) -> bool {
        identifier >= self.base_id && identifier - self.base_id < self.size
    }

    /// Motor id for an identifier inside the family.
    pub fn motor_id(&self, identifier: u32) -> u32 {
        identifier - self.motor_offset
    }

    pub fn base_id(&self) -> u32 {
        self.base_id
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Default for MotorFamily {
    fn default() -> Self {
        Self {
            base_id: DEFAULT_BASE_ID,
            size: DEFAULT_FAMILY_SIZE,
            motor_offset: DEFAULT_MOTOR_OFFSET,
        }
    }
}

/// Little-endian uint16 at bytes 4..=5, scaled to volts.
pub fn decode_voltage(data: &[u8]) -> Option<f64> {
    let lo = *data.get(VOLTAGE_LSB_INDEX)?;
    let hi = *data.get(VOLTAGE_LSB_INDEX + 1)?;
    Some(f64::from(u16::from_le_bytes([lo, hi])) / COUNTS_PER_VOLT)
}

// ============================================================================
// Frame Decoder
// ============================================================================

/// Result of handing one line to the decoder.
#[derive(Debug)]
pub enum Outcome {
    /// A reading was built and accepted by the sink.
    Emitted(ParsedFrame, MotorVoltageReading),
    /// The line was not a decodable motor status frame.
    Discarded(DecodeError),
    /// A reading was built but the sink refused it.
    SinkFailed(MotorVoltageReading, SinkError),
}

#[derive(Clone, Debug, Default)]
pub struct FrameDecoder {
    layout: FrameLayout,
    id_base: IdBase,
    family: MotorFamily,
    pacer: Pacer,
}

impl FrameDecoder {
    pub fn new(
        layout: FrameLayout,
        id_base: IdBase,
        family: MotorFamily,
        pacer: Pacer,
    ) -> Result<Self, MonitorError> {
        if layout.data_width < MIN_DATA_WIDTH {
            return Err(MonitorError::config(format!(
                "data window of {} bytes is narrower than {}",
                layout.data_width, MIN_DATA_WIDTH
            )));
        }
        if layout.id_token >= layout.data_offset {
            return Err(MonitorError::config(format!(
                "identifier token {} must precede the data window at {}",
                layout.id_token, layout.data_offset
            )));
        }
        Ok(Self {
            layout,
            id_base,
            family,
            pacer,
        })
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn id_base(&self) -> IdBase {
        self.id_base
    }

    pub fn family(&self) -> &MotorFamily {
        &self.family
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Parse a line that belongs to the motor family.
    pub fn parse(&self, line: &str) -> Result<ParsedFrame, DecodeError> {
        let (tokens, identifier) = codec::parse_header(line, &self.layout, self.id_base)?;

        // Reject foreign traffic before touching the data window
        if !self.family.contains(identifier) {
            return Err(DecodeError::NotInFamily(identifier));
        }

        codec::frame_from_tokens(&tokens, identifier, &self.layout)
    }

    /// Voltage reading carried by a motor status frame.
    pub fn reading(&self, frame: &ParsedFrame) -> Result<MotorVoltageReading, DecodeError> {
        let voltage = decode_voltage(&frame.data_bytes)
            .ok_or(DecodeError::WindowTooShort(frame.data_bytes.len()))?;
        Ok(MotorVoltageReading {
            motor_id: self.family.motor_id(frame.identifier),
            voltage,
        })
    }

    /// Decode one capture line without side effects.
    pub fn decode(&self, line: &str) -> Result<MotorVoltageReading, DecodeError> {
        self.reading(&self.parse(line)?)
    }

    /// Decode one line and, if it yields a reading, publish it and pace.
    pub fn process<S: ReadingSink + ?Sized>(&self, line: &str, sink: &mut S) -> Outcome {
        let decoded = self
            .parse(line)
            .and_then(|frame| self.reading(&frame).map(|reading| (frame, reading)));
        let (frame, reading) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => return Outcome::Discarded(e),
        };

        let result = sink.publish(&reading);
        self.pacer.pause();

        match result {
            Ok(()) => Outcome::Emitted(frame, reading),
            Err(e) => Outcome::SinkFailed(reading, e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
