//! Home Assistant MQTT discovery integration.
//!
//! One MQTT session shared across all lines carries a retained
//! online/offline availability topic (backed by a last-will message) and,
//! per line, a retained discovery document telling Home Assistant how to
//! render the line's state topic as a binary sensor.
//!
//! Topic and payload shapes are a wire contract with Home Assistant:
//! `<prefix>/binary_sensor/<deviceId>_gpio_<pin>/config`, states `OPEN`
//! and `CLOSED`.

use crate::config::{HomeAssistantConfig, LineConfig};
use crate::error::{MonitorError, Result};
use crate::mqtt::{MqttSession, MqttSessionOptions};
use log::{debug, error, info, warn};
use rumqttc::{LastWill, QoS};
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
const DEFAULT_AVAILABILITY_TOPIC: &str = "security-monitor/availability";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Lets the broker flush the retained "offline" publish before the
/// transport closes.
const OFFLINE_FLUSH_DELAY: Duration = Duration::from_millis(100);

pub struct HomeAssistantDiscovery {
    config: HomeAssistantConfig,
    discovery_prefix: String,
    availability_topic: String,
    device_name: String,
    device_id: String,
    session: Option<MqttSession>,
}

/// Discovery document for one binary sensor. Field names and the
/// `payload_on`/`payload_off` literals are fixed by Home Assistant.
#[derive(Debug, Serialize)]
struct DiscoveryPayload {
    name: String,
    unique_id: String,
    state_topic: String,
    availability_topic: String,
    device_class: &'static str,
    payload_on: &'static str,
    payload_off: &'static str,
    value_template: &'static str,
    json_attributes_topic: String,
    device: DeviceInfo,
}

/// Shared device block so Home Assistant groups every line under one
/// logical device.
#[derive(Debug, Serialize)]
struct DeviceInfo {
    identifiers: Vec<String>,
    name: String,
    model: &'static str,
    manufacturer: &'static str,
    sw_version: &'static str,
}

impl HomeAssistantDiscovery {
    pub fn new(config: &HomeAssistantConfig) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();

        Self {
            discovery_prefix: config
                .discovery_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_DISCOVERY_PREFIX.to_string()),
            availability_topic: config
                .availability_topic
                .clone()
                .unwrap_or_else(|| DEFAULT_AVAILABILITY_TOPIC.to_string()),
            device_name: config
                .device_name
                .clone()
                .unwrap_or_else(|| format!("Security Monitor ({hostname})")),
            device_id: config
                .device_id
                .clone()
                .unwrap_or_else(|| format!("security-monitor-{hostname}")),
            config: config.clone(),
            session: None,
        }
    }

    /// Open the hub session with the availability last will and publish
    /// "online" once connected. Fails after a fixed timeout; the caller
    /// treats that as "continue without hub integration".
    pub async fn connect(&mut self) -> Result<()> {
        let will = LastWill::new(&self.availability_topic, "offline", QoS::AtLeastOnce, true);

        let (mut session, connack) = MqttSession::connect(MqttSessionOptions {
            broker: self.config.broker.clone(),
            client_id: format!("{}-ha", self.device_id),
            username: self.config.username.clone(),
            password: self.config.password.clone(),
            last_will: Some(will),
        })?;

        match timeout(CONNECT_TIMEOUT, connack).await {
            Ok(Ok(())) => {}
            _ => {
                let _ = session.shutdown().await;
                return Err(MonitorError::ConnectTimeout);
            }
        }

        info!("Home Assistant: Connected to {}", self.config.broker);
        session
            .publish(
                &self.availability_topic,
                QoS::AtLeastOnce,
                true,
                b"online".to_vec(),
            )
            .await?;

        self.session = Some(session);
        Ok(())
    }

    /// Unique id binding the sensor to this device: `<deviceId>_gpio_<pin>`.
    fn sensor_id(&self, line: &LineConfig) -> String {
        format!("{}_gpio_{}", self.device_id, line.gpio)
    }

    fn discovery_topic(&self, line: &LineConfig) -> String {
        format!(
            "{}/binary_sensor/{}/config",
            self.discovery_prefix,
            self.sensor_id(line)
        )
    }

    /// Infer the Home Assistant device class from the line name, by
    /// substring priority, falling back on the momentary flag.
    fn device_class(name: &str, momentary: bool) -> &'static str {
        let name = name.to_lowercase();

        if name.contains("door") && !name.contains("garage") {
            return "door";
        }
        if name.contains("window") {
            return "window";
        }
        if name.contains("motion") {
            return "motion";
        }
        if name.contains("garage") {
            return "garage_door";
        }
        if name.contains("lock") {
            return "lock";
        }
        if name.contains("opening") {
            return "opening";
        }

        if momentary { "motion" } else { "opening" }
    }

    fn discovery_payload(&self, line: &LineConfig, state_topic: &str) -> DiscoveryPayload {
        DiscoveryPayload {
            name: line.name.clone(),
            unique_id: self.sensor_id(line),
            state_topic: state_topic.to_string(),
            availability_topic: self.availability_topic.clone(),
            device_class: Self::device_class(&line.name, line.momentary),
            payload_on: "OPEN",
            payload_off: "CLOSED",
            value_template: "{{ value_json.state }}",
            json_attributes_topic: state_topic.to_string(),
            device: DeviceInfo {
                identifiers: vec![self.device_id.clone()],
                name: self.device_name.clone(),
                model: "GPIO Security Monitor",
                manufacturer: "Custom",
                sw_version: env!("CARGO_PKG_VERSION"),
            },
        }
    }

    /// Publish the retained discovery document for one line.
    pub async fn publish_discovery(&self, line: &LineConfig, state_topic: &str) -> Result<()> {
        let Some(session) = &self.session else {
            warn!("Home Assistant: Not connected, skipping discovery");
            return Ok(());
        };

        let payload = self.discovery_payload(line, state_topic);
        session
            .publish(
                &self.discovery_topic(line),
                QoS::AtLeastOnce,
                true,
                serde_json::to_vec(&payload)?,
            )
            .await?;

        info!(
            "Home Assistant: Discovery published for {} ({})",
            line.name, payload.device_class
        );
        Ok(())
    }

    /// Publish discovery for every line that has an MQTT state topic.
    /// One line failing never blocks the rest.
    pub async fn publish_all(&self, lines: &[LineConfig]) {
        for line in lines {
            let Some(state_topic) = line.state_topic() else {
                debug!(
                    "Home Assistant: {} has no MQTT reporter, skipping discovery",
                    line.name
                );
                continue;
            };

            if let Err(e) = self.publish_discovery(line, state_topic).await {
                error!(
                    "Home Assistant: Error publishing discovery for {}: {}",
                    line.name, e
                );
            }
        }
    }

    /// Publish "offline" retained, give the broker a moment to flush,
    /// then end the session.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if let Err(e) = session
            .publish(
                &self.availability_topic,
                QoS::AtLeastOnce,
                true,
                b"offline".to_vec(),
            )
            .await
        {
            error!("Home Assistant: Error publishing offline status: {e}");
        }
        tokio::time::sleep(OFFLINE_FLUSH_DELAY).await;

        session.shutdown().await?;
        info!("Home Assistant: Connection closed");
        Ok(())
    }
}
