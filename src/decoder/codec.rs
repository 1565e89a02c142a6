// src/decoder/codec.rs
//
// Whitespace-tokenized CAN capture line codec.
//
// Line format (as printed by the capture tool):
//   <bus> <ID> [<len>] <B0> <B1> ... <B7>
//
// Token positions are not fixed across capture tools, so the identifier token
// and the data-byte window are described by a `FrameLayout`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Layout and Identifier Base
// ============================================================================

/// Numeric base of the identifier token.
///
/// `candump` prints identifiers as bare hexadecimal (`241`), so `Hex` is the
/// default. `Decimal` reproduces monitors that read the token as base-10 text.
/// The default `FrameLayout::LEGACY` window needs 15 tokens; plain
/// `candump can0` output has 11, so decode it with `--candump-layout`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum IdBase {
    #[default]
    Hex,
    Decimal,
}

impl IdBase {
    pub fn radix(self) -> u32 {
        match self {
            IdBase::Hex => 16,
            IdBase::Decimal => 10,
        }
    }

    /// Parse an identifier token, tolerating a `0x` prefix in hex mode.
    pub fn parse(self, token: &str) -> Option<u32> {
        let digits = match self {
            IdBase::Hex => token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token),
            IdBase::Decimal => token,
        };
        u32::from_str_radix(digits, self.radix()).ok()
    }
}

/// Token positions of the identifier and the data-byte window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    /// Index of the identifier token.
    pub id_token: usize,
    /// Index of the first data-byte token.
    pub data_offset: usize,
    /// Number of data-byte tokens in the window.
    pub data_width: usize,
}

impl FrameLayout {
    /// Historical monitor layout: data bytes at tokens 7..=14.
    pub const LEGACY: FrameLayout = FrameLayout {
        id_token: 1,
        data_offset: 7,
        data_width: 8,
    };

    /// Plain `candump <iface>` output: `can0  241   [8]  9A 32 00 01 E5 01 04 00`.
    pub const CANDUMP: FrameLayout = FrameLayout {
        id_token: 1,
        data_offset: 3,
        data_width: 8,
    };

    /// Minimum token count for a line to be decodable.
    pub fn min_tokens(&self) -> usize {
        self.data_offset + self.data_width
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::LEGACY
    }
}

// ============================================================================
// Parsed Frame
// ============================================================================

/// Structural view of one capture line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedFrame {
    pub bus_name: String,
    pub identifier: u32,
    /// Length from a `[n]` marker after the identifier, if one is present.
    /// Informational only; never checked against `data_bytes`.
    pub declared_length: Option<u8>,
    pub data_bytes: Vec<u8>,
}

impl fmt::Display for ParsedFrame {
    /// Compact `candump -L` style: `can0 241#9A320001E5010400`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:03X}#{}",
            self.bus_name,
            self.identifier,
            hex::encode_upper(&self.data_bytes)
        )
    }
}

/// Why a line did not produce a reading.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("too few tokens: {found}, need at least {required}")]
    TooFewTokens { found: usize, required: usize },

    #[error("invalid identifier token: {0}")]
    BadIdentifier(String),

    #[error("identifier 0x{0:X} is not a motor status frame")]
    NotInFamily(u32),

    #[error("invalid hex byte at token {position}: {token}")]
    BadByte { position: usize, token: String },

    #[error("data window of {0} bytes is too short for the voltage field")]
    WindowTooShort(usize),
}

/// Parse the bus name and identifier, leaving the data window untouched.
///
/// Returns the tokens so the caller can decide whether the data window is
/// worth parsing.
pub fn parse_header<'a>(
    line: &'a str,
    layout: &FrameLayout,
    base: IdBase,
) -> Result<(Vec<&'a str>, u32), DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if tokens.len() < layout.min_tokens() || tokens.len() <= layout.id_token {
        return Err(DecodeError::TooFewTokens {
            found: tokens.len(),
            required: layout.min_tokens().max(layout.id_token + 1),
        });
    }

    let id_str = tokens[layout.id_token];
    let identifier = base
        .parse(id_str)
        .ok_or_else(|| DecodeError::BadIdentifier(id_str.to_string()))?;

    Ok((tokens, identifier))
}

/// Parse the data-byte window from already tokenized input.
pub fn parse_data(tokens: &[&str], layout: &FrameLayout) -> Result<Vec<u8>, DecodeError> {
    let end = layout.data_offset + layout.data_width;
    let window = tokens
        .get(layout.data_offset..end)
        .ok_or(DecodeError::TooFewTokens {
            found: tokens.len(),
            required: end,
        })?;

    window
        .iter()
        .enumerate()
        .map(|(i, token)| {
            u8::from_str_radix(token, 16).map_err(|_| DecodeError::BadByte {
                position: layout.data_offset + i,
                token: token.to_string(),
            })
        })
        .collect()
}

/// Parse a full capture line into a `ParsedFrame`.
pub fn parse_frame(
    line: &str,
    layout: &FrameLayout,
    base: IdBase,
) -> Result<ParsedFrame, DecodeError> {
    let (tokens, identifier) = parse_header(line, layout, base)?;
    frame_from_tokens(&tokens, identifier, layout)
}

/// Finish parsing a line whose header has already been read.
pub fn frame_from_tokens(
    tokens: &[&str],
    identifier: u32,
    layout: &FrameLayout,
) -> Result<ParsedFrame, DecodeError> {
    let data_bytes = parse_data(tokens, layout)?;
    Ok(ParsedFrame {
        bus_name: tokens[0].to_string(),
        identifier,
        declared_length: declared_length(tokens, layout),
        data_bytes,
    })
}

/// Read a `[n]` marker directly after the identifier, if present.
fn declared_length(tokens: &[&str], layout: &FrameLayout) -> Option<u8> {
    tokens
        .get(layout.id_token + 1)?
        .strip_prefix('[')?
        .strip_suffix(']')?
        .parse()
        .ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CANDUMP_LINE: &str = "  can0  241   [8]  9A 32 00 01 E5 01 04 00";

    #[test]
    fn test_parse_candump_line() {
        let frame = parse_frame(CANDUMP_LINE, &FrameLayout::CANDUMP, IdBase::Hex).unwrap();
        assert_eq!(frame.bus_name, "can0");
        assert_eq!(frame.identifier, 0x241);
        assert_eq!(frame.declared_length, Some(8));
        assert_eq!(
            frame.data_bytes,
            vec![0x9A, 0x32, 0x00, 0x01, 0xE5, 0x01, 0x04, 0x00]
        );
    }

    #[test]
    fn test_parse_legacy_layout_window() {
        let line = "can0 241 [8] x x x x 9A 32 00 01 E5 01 04 00";
        let frame = parse_frame(line, &FrameLayout::LEGACY, IdBase::Hex).unwrap();
        assert_eq!(frame.data_bytes[4], 0xE5);
        assert_eq!(frame.data_bytes[5], 0x01);
    }

    #[test]
    fn test_legacy_layout_requires_fifteen_tokens() {
        assert_eq!(FrameLayout::default().min_tokens(), 15);
        let err = parse_frame(CANDUMP_LINE, &FrameLayout::LEGACY, IdBase::Hex).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TooFewTokens {
                found: 11,
                required: 15
            }
        );
    }

    #[test]
    fn test_id_base_pinned() {
        // candump prints identifiers in hex
        assert_eq!(IdBase::Hex.parse("241"), Some(0x241));
        assert_eq!(IdBase::Hex.parse("0x241"), Some(0x241));
        assert_eq!(IdBase::Hex.parse("577"), Some(0x577));
        assert_eq!(IdBase::Decimal.parse("577"), Some(0x241));
        assert_eq!(IdBase::Decimal.parse("24A"), None);
    }

    #[test]
    fn test_bad_identifier() {
        let line = "can0 zz [8] 9A 32 00 01 E5 01 04 00";
        let err = parse_frame(line, &FrameLayout::CANDUMP, IdBase::Hex).unwrap_err();
        assert_eq!(err, DecodeError::BadIdentifier("zz".to_string()));
    }

    #[test]
    fn test_bad_data_byte() {
        let line = "can0 241 [8] 9A 32 00 01 G5 01 04 00";
        let err = parse_frame(line, &FrameLayout::CANDUMP, IdBase::Hex).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadByte {
                position: 7,
                token: "G5".to_string()
            }
        );
    }

    #[test]
    fn test_missing_length_marker_is_not_an_error() {
        let line = "can0 241 9A 32 00 01 E5 01 04 00";
        let layout = FrameLayout {
            id_token: 1,
            data_offset: 2,
            data_width: 8,
        };
        let frame = parse_frame(line, &layout, IdBase::Hex).unwrap();
        assert_eq!(frame.declared_length, None);
        assert_eq!(frame.data_bytes.len(), 8);
    }

    #[test]
    fn test_display_compact_form() {
        let frame = parse_frame(CANDUMP_LINE, &FrameLayout::CANDUMP, IdBase::Hex).unwrap();
        assert_eq!(frame.to_string(), "can0 241#9A320001E5010400");
    }
}
