//! End-to-end runs against a real capture command.
//!
//! The capture tool is stood in for by `printf`, so these tests exercise the
//! child process plumbing, the filter token, the decoder and the sink without
//! needing a CAN interface.

#![cfg(unix)]

use motor_voltage_lib::decoder::{FrameDecoder, FrameLayout, IdBase, MotorFamily, Pacer};
use motor_voltage_lib::source::CommandSource;
use motor_voltage_lib::{MemorySink, MonitorConfig, MotorVoltageReading, Pipeline, StreamEnd};

const CAPTURE_COMMAND: &str = "printf '%s\\n' \
    '  can0  241   [8]  9A 32 00 01 E5 01 04 00' \
    '  can0  0C8   [8]  11 22 33 44 55 66 77 88' \
    '  can0  244   [8]  9A 32 00 01 00 00 04 00' \
    '  can0  240   [8]  9A 32 00 01 E5 01 04 00'";

fn candump_decoder() -> FrameDecoder {
    FrameDecoder::new(
        FrameLayout::CANDUMP,
        IdBase::Hex,
        MotorFamily::default(),
        Pacer::disabled(),
    )
    .unwrap()
}

#[test]
fn test_command_capture_to_memory_sink() {
    let source = CommandSource::spawn(CAPTURE_COMMAND).unwrap();
    let sink = MemorySink::new();

    let summary = Pipeline::new(source, "9A", candump_decoder(), sink.clone()).run();

    assert_eq!(
        sink.readings(),
        vec![
            MotorVoltageReading {
                motor_id: 321,
                voltage: 48.5
            },
            MotorVoltageReading {
                motor_id: 324,
                voltage: 0.0
            },
        ]
    );
    assert_eq!(summary.end, StreamEnd::Closed);
    assert_eq!(summary.lines_read, 4);
    assert_eq!(summary.lines_decoded, 3);
    assert_eq!(summary.frames_discarded, 1);
}

#[test]
fn test_truncated_capture_emits_nothing() {
    // No trailing newline and only five data bytes
    let source = CommandSource::spawn("printf '  can0  241   [8]  9A 32 00 01 E5'").unwrap();
    let sink = MemorySink::new();

    let summary = Pipeline::new(source, "9A", candump_decoder(), sink.clone()).run();

    assert!(sink.readings().is_empty());
    assert_eq!(summary.end, StreamEnd::Closed);
    assert_eq!(summary.frames_discarded, 1);
}

#[test]
fn test_decimal_identifiers_with_legacy_parse() {
    let source = CommandSource::spawn("printf '  can0  577   [8]  9A 32 00 01 E5 01 04 00\\n'")
        .unwrap();
    let sink = MemorySink::new();
    let decoder = FrameDecoder::new(
        FrameLayout::CANDUMP,
        IdBase::Decimal,
        MotorFamily::default(),
        Pacer::disabled(),
    )
    .unwrap();

    Pipeline::new(source, "9A", decoder, sink.clone()).run();

    assert_eq!(
        sink.readings(),
        vec![MotorVoltageReading {
            motor_id: 321,
            voltage: 48.5
        }]
    );
}

#[tokio::test]
async fn test_run_monitor_from_config() {
    let config = MonitorConfig::from_toml_str(&format!(
        r#"
[source]
kind = "command"
command = "{}"

[decoder]
data_offset = 3
pace_ms = 0
"#,
        "printf '  can0  242   [8]  9A 32 00 01 10 02 04 00\\\\n'"
    ))
    .unwrap();

    let summary = motor_voltage_lib::run_monitor(config).await.unwrap();

    assert_eq!(summary.readings_emitted, 1);
    assert_eq!(summary.end, StreamEnd::Closed);
}

#[tokio::test]
async fn test_run_monitor_missing_capture_tool_fails() {
    let config = MonitorConfig::from_toml_str(
        r#"
[source]
command = "candump-not-installed can0"
"#,
    )
    .unwrap();

    let summary = motor_voltage_lib::run_monitor(config).await.unwrap();

    assert_eq!(summary.lines_read, 0);
    assert_eq!(summary.readings_emitted, 0);
    match &summary.end {
        StreamEnd::ReadFailed(msg) => assert!(msg.contains("could not be started")),
        other => panic!("expected a read failure, got {:?}", other),
    }
    assert_eq!(
        motor_voltage_lib::exit_code(&summary.end),
        std::process::ExitCode::FAILURE
    );
}
