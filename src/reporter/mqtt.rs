//! MQTT reporter: publishes each event as JSON to one configured topic.
//!
//! Each reporter owns an independent broker connection. While disconnected,
//! `report` drops the event with a warning; nothing is queued or replayed
//! on reconnect. This matches what the Home Assistant side expects from
//! the availability topic: gaps in the state topic are covered by the
//! integration going offline, not by stale replays.

use crate::error::Result;
use crate::event::StateChangeEvent;
use crate::mqtt::{MqttSession, MqttSessionOptions};
use log::{debug, warn};
use rumqttc::QoS;

pub struct MqttReporter {
    topic: String,
    session: MqttSession,
}

impl MqttReporter {
    /// Open the broker connection. Does not wait for the connection to
    /// establish; events are skipped until the session reports connected.
    pub fn new(
        broker: &str,
        topic: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let client_id = format!("security-monitor-{:08x}", rand::random::<u32>());
        let (session, _connack) = MqttSession::connect(MqttSessionOptions {
            broker: broker.to_string(),
            client_id,
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            last_will: None,
        })?;

        Ok(Self {
            topic: topic.to_string(),
            session,
        })
    }

    pub async fn report(&self, event: &StateChangeEvent) -> Result<()> {
        if !self.session.is_connected() {
            warn!(
                "MQTT: Not connected, skipping report for {} ({})",
                event.name, event.state
            );
            return Ok(());
        }

        let payload = serde_json::to_vec(event)?;
        self.session
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await?;
        debug!("MQTT: Published to {}", self.topic);
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.session.shutdown().await
    }
}
