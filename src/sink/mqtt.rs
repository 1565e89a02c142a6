// src/sink/mqtt.rs
//
// MQTT sink - publishes readings as JSON to a broker topic.
//
// JSON message format:
// {
//   "motor_id": 321,    // frame identifier minus motor offset
//   "motor_v": 48.5     // volts
// }
//
// The client's request queue is bounded by `capacity`. When the queue is full
// (broker slow or unreachable) a publish fails immediately instead of stalling
// the frame reader.

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use super::ReadingSink;
use crate::error::SinkError;
use crate::types::MotorVoltageReading;

// ============================================================================
// Configuration
// ============================================================================

/// Delay before the event loop retries after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Broker connection and topic for published readings.
#[derive(Clone, Debug)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,
    /// Broker port (1883 for plain TCP)
    pub port: u16,
    /// Credentials are sent only when both are set
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic readings are published to
    pub topic: String,
    /// Maximum outstanding publish requests
    pub capacity: usize,
    /// Must be unique per broker
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            topic: "motor_voltage".to_string(),
            capacity: 4,
            client_id: "motor-voltage-monitor".to_string(),
        }
    }
}

impl MqttConfig {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }

        options
    }
}

// ============================================================================
// MQTT Sink
// ============================================================================

pub struct MqttSink {
    client: AsyncClient,
    topic: String,
    task_handle: Option<JoinHandle<()>>,
}

impl MqttSink {
    /// Create the client and drive its event loop on `runtime`.
    ///
    /// Connection happens in the background; publishes made before the broker
    /// answers are queued up to `capacity`.
    pub fn connect(config: &MqttConfig, runtime: &Handle) -> Self {
        let (client, eventloop) = AsyncClient::new(config.options(), config.capacity.max(1));
        let source = format!("mqtt://{}:{}", config.host, config.port);
        let task_handle = runtime.spawn(drive_event_loop(eventloop, source));

        Self {
            client,
            topic: config.topic.clone(),
            task_handle: Some(task_handle),
        }
    }

    /// Hand the event loop task to the caller so it can be awaited after the
    /// sink is dropped. The sink no longer aborts it on a failed disconnect.
    pub fn take_event_loop(&mut self) -> Option<JoinHandle<()>> {
        self.task_handle.take()
    }

    #[cfg(test)]
    fn detached(client: AsyncClient, topic: &str) -> Self {
        Self {
            client,
            topic: topic.to_string(),
            task_handle: None,
        }
    }
}

impl ReadingSink for MqttSink {
    fn publish(&mut self, reading: &MotorVoltageReading) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(reading)?;
        self.client
            .try_publish(self.topic.clone(), QoS::AtMostOnce, false, payload)
            .map_err(|e| SinkError::Unavailable(format!("MQTT publish to '{}': {}", self.topic, e)))
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        // The event loop ends once the disconnect request goes out
        if self.client.try_disconnect().is_err() {
            if let Some(handle) = self.task_handle.take() {
                handle.abort();
            }
        }
    }
}

/// Wait up to `timeout` for the event loop to flush queued readings and the
/// disconnect. Returns false if it was still running.
pub async fn drain_event_loop(task: JoinHandle<()>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, task).await {
        Ok(_) => true,
        Err(_) => {
            tlog!("[mqtt] Gave up on queued readings after {:?}", timeout);
            false
        }
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, source: String) {
    let mut connected = false;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                tlog!("[mqtt] Connected to {}", source);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tlog!("[mqtt] Disconnected from {}", source);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if connected {
                    tlog!("[mqtt] Connection to {} lost: {}", source, e);
                } else {
                    tlog!("[mqtt] Cannot reach {}: {}", source, e);
                }
                connected = false;
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
