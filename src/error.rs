// src/error.rs
//
// Operator-visible failures. Per-line decode failures live in the decoder and
// never reach this type.

use thiserror::Error;

/// Fatal errors surfaced to the caller of the pipeline.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The capture source could not be started or opened.
    #[error("{source_name}: source unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    /// Invalid configuration file, flag, or value.
    #[error("configuration error: {0}")]
    Config(String),

    /// The blocking pipeline thread panicked or was cancelled.
    #[error("pipeline worker failed: {0}")]
    Worker(String),
}

impl MonitorError {
    pub fn source_unavailable(source_name: &str, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Failure to hand a reading to the output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink is disconnected or its outstanding-message queue is full.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_display() {
        let err = MonitorError::source_unavailable("command(candump can0)", "No such file");
        assert_eq!(
            err.to_string(),
            "command(candump can0): source unavailable: No such file"
        );
    }

    #[test]
    fn test_sink_error_display() {
        let err = SinkError::Unavailable("queue full".to_string());
        assert_eq!(err.to_string(), "sink unavailable: queue full");
    }
}
