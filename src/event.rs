//! State-change event value object shared by monitors, reporters and
//! the Home Assistant integration.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Classified logical state of a monitored line.
///
/// The mapping from raw electrical level to `Open`/`Closed` is owned by
/// [`crate::line_monitor::LineMonitor::classify`]; everything else only
/// displays or serializes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineState {
    Open,
    Closed,
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineState::Open => write!(f, "OPEN"),
            LineState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// One reportable line transition. Built fresh per dispatch and never
/// mutated afterwards.
///
/// Serializes to the wire payload `{name, gpio, value, state, timestamp}`
/// consumed by MQTT subscribers and Home Assistant's `value_template`.
#[derive(Debug, Clone, Serialize)]
pub struct StateChangeEvent {
    pub name: String,
    pub gpio: u32,
    pub value: u8,
    pub state: LineState,
    pub timestamp: DateTime<Utc>,
}

impl StateChangeEvent {
    pub fn new(name: &str, gpio: u32, value: u8, state: LineState) -> Self {
        Self {
            name: name.to_string(),
            gpio,
            value,
            state,
            timestamp: Utc::now(),
        }
    }

    /// RFC 3339 timestamp with millisecond precision, as used in log lines.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_matches_wire_literals() {
        assert_eq!(LineState::Open.to_string(), "OPEN");
        assert_eq!(LineState::Closed.to_string(), "CLOSED");
    }

    #[test]
    fn test_event_payload_fields() {
        let event = StateChangeEvent::new("Front Door", 17, 0, LineState::Open);
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["name"], "Front Door");
        assert_eq!(json["gpio"], 17);
        assert_eq!(json["value"], 0);
        assert_eq!(json["state"], "OPEN");
        assert!(json["timestamp"].is_string());
    }
}
