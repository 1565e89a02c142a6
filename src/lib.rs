#[macro_use]
mod logging;

pub mod config;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;
mod types;

pub use config::{Cli, MonitorConfig};
pub use decoder::{FrameDecoder, FrameLayout, IdBase, MotorFamily, Pacer, ParsedFrame};
pub use error::{MonitorError, SinkError};
pub use logging::{init_file_logging, stop_file_logging};
pub use pipeline::{Pipeline, RunSummary};
pub use sink::{JsonLinesSink, MemorySink, MqttSink, ReadingSink};
pub use source::{FrameSource, StreamEnd};
pub use types::MotorVoltageReading;

use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use config::SinkKind;

/// Upper bound on waiting for queued MQTT readings after the source ends.
const MQTT_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Process entry point: parse flags, run until the source closes or Ctrl-C.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            tlog!("[setup] {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &config.log.file {
        if let Err(e) = init_file_logging(path) {
            tlog!("[setup] {}", e);
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tlog!("[setup] Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run_monitor(config));
    stop_file_logging();

    match result {
        Ok(summary) => exit_code(&summary.end),
        Err(e) => {
            tlog!("[setup] {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Process status for a finished run. A source that failed mid-stream or
/// never started is a failure; EOF and Ctrl-C are not.
pub fn exit_code(end: &StreamEnd) -> ExitCode {
    match end {
        StreamEnd::ReadFailed(_) => ExitCode::FAILURE,
        StreamEnd::Closed | StreamEnd::Stopped => ExitCode::SUCCESS,
    }
}

/// Build the sink and source, then drive the pipeline on a blocking thread.
pub async fn run_monitor(config: MonitorConfig) -> Result<RunSummary, MonitorError> {
    let decoder = config.decoder.build()?;

    let mut event_loop = None;
    let sink: Box<dyn ReadingSink + Send> = match config.sink.kind {
        SinkKind::Stdout => Box::new(JsonLinesSink::stdout()),
        SinkKind::Mqtt => {
            let mut sink = MqttSink::connect(&config.sink.mqtt(), &tokio::runtime::Handle::current());
            event_loop = sink.take_event_loop();
            Box::new(sink)
        }
    };

    let source = source::open_source(&config.source)?;

    let pipeline = Pipeline::new(source, &config.source.filter, decoder, sink)
        .with_stats_interval(config.log.stats_interval);

    let stop_flag = pipeline.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tlog!("[setup] Shutdown requested");
            stop_flag.store(true, Ordering::Relaxed);
        }
    });

    // The sink is dropped with the pipeline, which queues the MQTT disconnect
    let summary = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .map_err(|e| MonitorError::Worker(e.to_string()))?;

    if let Some(task) = event_loop {
        crate::sink::drain_event_loop(task, MQTT_DRAIN_TIMEOUT).await;
    }

    Ok(summary)
}
