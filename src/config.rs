// src/config.rs
//
// Startup configuration: an optional TOML file, overridden by command-line
// flags. Fixed for the lifetime of the run.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::decoder::{
    FrameDecoder, FrameLayout, IdBase, MotorFamily, Pacer, DEFAULT_BASE_ID, DEFAULT_FAMILY_SIZE,
    DEFAULT_MOTOR_OFFSET, DEFAULT_PACE_MS,
};
use crate::error::MonitorError;
use crate::sink::MqttConfig;

// ============================================================================
// File Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// stdout of a capture command
    #[default]
    Command,
    /// capture lines piped into this process
    Stdin,
    /// Linux SocketCAN interface
    Socketcan,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Substring a line must contain to reach the decoder ("" = all lines)
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_command() -> String {
    "candump can0".to_string()
}
fn default_interface() -> String {
    "can0".to_string()
}
fn default_filter() -> String {
    "9A".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            command: default_command(),
            interface: default_interface(),
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderConfig {
    #[serde(default)]
    pub id_base: IdBase,
    #[serde(default = "default_id_token")]
    pub id_token: usize,
    #[serde(default = "default_data_offset")]
    pub data_offset: usize,
    #[serde(default = "default_data_width")]
    pub data_width: usize,
    #[serde(default = "default_base_id")]
    pub base_id: u32,
    #[serde(default = "default_family_size")]
    pub family_size: u32,
    #[serde(default = "default_motor_offset")]
    pub motor_offset: u32,
    /// Delay after each published reading (0 = no pacing)
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

fn default_id_token() -> usize {
    FrameLayout::LEGACY.id_token
}
fn default_data_offset() -> usize {
    FrameLayout::LEGACY.data_offset
}
fn default_data_width() -> usize {
    FrameLayout::LEGACY.data_width
}
fn default_base_id() -> u32 {
    DEFAULT_BASE_ID
}
fn default_family_size() -> u32 {
    DEFAULT_FAMILY_SIZE
}
fn default_motor_offset() -> u32 {
    DEFAULT_MOTOR_OFFSET
}
fn default_pace_ms() -> u64 {
    DEFAULT_PACE_MS
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            id_base: IdBase::default(),
            id_token: default_id_token(),
            data_offset: default_data_offset(),
            data_width: default_data_width(),
            base_id: default_base_id(),
            family_size: default_family_size(),
            motor_offset: default_motor_offset(),
            pace_ms: default_pace_ms(),
        }
    }
}

impl DecoderConfig {
    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            id_token: self.id_token,
            data_offset: self.data_offset,
            data_width: self.data_width,
        }
    }

    pub fn build(&self) -> Result<FrameDecoder, MonitorError> {
        let family = MotorFamily::new(self.base_id, self.family_size, self.motor_offset)?;
        FrameDecoder::new(
            self.layout(),
            self.id_base,
            family,
            Pacer::from_millis(self.pace_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// JSON lines on stdout
    #[default]
    Stdout,
    /// JSON messages to an MQTT broker
    Mqtt,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Maximum outstanding messages before publishes are refused
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    MqttConfig::default().host
}
fn default_port() -> u16 {
    MqttConfig::default().port
}
fn default_topic() -> String {
    MqttConfig::default().topic
}
fn default_capacity() -> usize {
    MqttConfig::default().capacity
}
fn default_client_id() -> String {
    MqttConfig::default().client_id
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            host: default_host(),
            port: default_port(),
            topic: default_topic(),
            capacity: default_capacity(),
            client_id: default_client_id(),
            username: None,
            password: None,
        }
    }
}

impl SinkConfig {
    pub fn mqtt(&self) -> MqttConfig {
        MqttConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            topic: self.topic.clone(),
            capacity: self.capacity,
            client_id: self.client_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Mirror log output to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Log pipeline counters every N lines read (0 = off)
    #[serde(default)]
    pub stats_interval: u64,
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
            .map_err(|e| MonitorError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, MonitorError> {
        toml::from_str(text).map_err(|e| MonitorError::config(e.to_string()))
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.decoder.build()?;

        if self.sink.kind == SinkKind::Mqtt {
            if self.sink.capacity == 0 {
                return Err(MonitorError::config("sink capacity must be at least 1"));
            }
            if self.sink.topic.is_empty() {
                return Err(MonitorError::config("sink topic must not be empty"));
            }
        }
        if self.source.kind == SourceKind::Command && self.source.command.trim().is_empty() {
            return Err(MonitorError::config("source command must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Command Line
// ============================================================================

/// Decode motor voltage telemetry from a CAN capture and republish it.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture source kind
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Capture command (source = command)
    #[arg(long)]
    pub command: Option<String>,

    /// CAN interface (source = socketcan)
    #[arg(long)]
    pub interface: Option<String>,

    /// Substring a line must contain before it is decoded ("" = all lines)
    #[arg(long)]
    pub filter: Option<String>,

    /// Numeric base of the identifier token
    #[arg(long, value_enum)]
    pub id_base: Option<IdBase>,

    /// Token index of the first data byte
    #[arg(long)]
    pub data_offset: Option<usize>,

    /// Use the plain `candump <iface>` token layout
    #[arg(long, conflicts_with = "data_offset")]
    pub candump_layout: bool,

    /// Delay in milliseconds after each published reading
    #[arg(long)]
    pub pace_ms: Option<u64>,

    /// Output sink kind
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Broker host for the MQTT sink
    #[arg(long)]
    pub mqtt_host: Option<String>,

    /// Broker port for the MQTT sink
    #[arg(long)]
    pub mqtt_port: Option<u16>,

    /// MQTT topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Mirror log output to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Load the config file (if any), apply flag overrides, and validate.
    pub fn resolve(&self) -> Result<MonitorConfig, MonitorError> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)?,
            None => MonitorConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(kind) = self.source {
            config.source.kind = kind;
        }
        if let Some(command) = &self.command {
            config.source.command = command.clone();
        }
        if let Some(interface) = &self.interface {
            config.source.interface = interface.clone();
        }
        if let Some(filter) = &self.filter {
            config.source.filter = filter.clone();
        }
        if let Some(id_base) = self.id_base {
            config.decoder.id_base = id_base;
        }
        if self.candump_layout {
            let layout = FrameLayout::CANDUMP;
            config.decoder.id_token = layout.id_token;
            config.decoder.data_offset = layout.data_offset;
            config.decoder.data_width = layout.data_width;
        }
        if let Some(offset) = self.data_offset {
            config.decoder.data_offset = offset;
        }
        if let Some(pace_ms) = self.pace_ms {
            config.decoder.pace_ms = pace_ms;
        }
        if let Some(kind) = self.sink {
            config.sink.kind = kind;
        }
        if let Some(host) = &self.mqtt_host {
            config.sink.host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            config.sink.port = port;
        }
        if let Some(topic) = &self.topic {
            config.sink.topic = topic.clone();
        }
        if let Some(path) = &self.log_file {
            config.log.file = Some(path.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
