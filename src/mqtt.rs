//! MQTT session wrapper shared by the MQTT reporter and the Home Assistant
//! integration. Each session owns its own broker connection; nothing is
//! pooled.
//!
//! The rumqttc event loop is polled in a spawned task that tracks a
//! connected flag from `ConnAck` and connection errors. Callers that need
//! to gate on the connection await the returned `ConnAck` signal with a
//! timeout; callers that publish best-effort just check `is_connected`.

use crate::error::{MonitorError, Result};
use log::{error, info};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CHANNEL_CAPACITY: usize = 100;

pub struct MqttSessionOptions {
    pub broker: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub last_will: Option<LastWill>,
}

/// One broker connection with a background event-loop task.
pub struct MqttSession {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    event_loop_task: Option<JoinHandle<()>>,
}

impl MqttSession {
    /// Start a session. Returns immediately; the returned receiver fires
    /// once on the first `ConnAck`.
    pub fn connect(options: MqttSessionOptions) -> Result<(Self, oneshot::Receiver<()>)> {
        let (host, port) = parse_broker(&options.broker)?;

        let mut mqtt_options = MqttOptions::new(&options.client_id, host, port);
        mqtt_options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            mqtt_options.set_credentials(username, password);
        }
        if let Some(will) = options.last_will {
            mqtt_options.set_last_will(will);
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let connected = Arc::new(AtomicBool::new(false));
        let (connack_tx, connack_rx) = oneshot::channel();

        let broker = options.broker.clone();
        let connected_flag = connected.clone();
        let event_loop_task = tokio::spawn(async move {
            let mut connack_tx = Some(connack_tx);
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected_flag.store(true, Ordering::SeqCst);
                        info!("MQTT: Connected to {broker}");
                        if let Some(tx) = connack_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        connected_flag.store(false, Ordering::SeqCst);
                        info!("MQTT: Disconnected from {broker}");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        connected_flag.store(false, Ordering::SeqCst);
                        error!("MQTT: Connection error on {broker}: {e}");
                        // rumqttc reconnects on the next poll
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Ok((
            Self {
                client,
                connected,
                event_loop_task: Some(event_loop_task),
            },
            connack_rx,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.client.publish(topic, qos, retain, payload).await?;
        Ok(())
    }

    /// End the session without waiting for in-flight publishes to drain.
    pub async fn shutdown(&mut self) -> Result<()> {
        let result = self.client.disconnect().await;
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        result.map_err(Into::into)
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}

/// Split a broker address into host and port. Accepts `mqtt://host:port`,
/// `tcp://host:port`, `host:port` and bare `host` (default port 1883).
pub fn parse_broker(broker: &str) -> Result<(String, u16)> {
    let trimmed = broker
        .strip_prefix("mqtt://")
        .or_else(|| broker.strip_prefix("tcp://"))
        .unwrap_or(broker);

    if trimmed.is_empty() {
        return Err(MonitorError::InvalidBroker(broker.to_string()));
    }

    match trimmed.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(MonitorError::InvalidBroker(broker.to_string()));
            }
            let port = port
                .parse()
                .map_err(|_| MonitorError::InvalidBroker(broker.to_string()))?;
            Ok((host.to_string(), port))
        }
        None => Ok((trimmed.to_string(), 1883)),
    }
}
