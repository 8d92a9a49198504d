//! Configuration model and JSON file loading.
//!
//! The config file uses camelCase keys so existing `config.json` files for
//! the monitor keep working unchanged.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration: the monitored lines plus the optional
/// Home Assistant integration block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub monitors: Vec<LineConfig>,
    #[serde(default)]
    pub home_assistant: Option<HomeAssistantConfig>,
}

/// One monitored digital input line.
///
/// Pin numbers are expected to be unique across all configured lines; this
/// layer does not enforce it. Two lines on the same pin will fail at
/// hardware-open time for whichever initializes second.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    pub name: String,
    pub gpio: u32,
    /// Which raw level maps to CLOSED: `true` means high = CLOSED.
    pub normally_high: bool,
    /// Report only transitions away from the resting level.
    #[serde(default)]
    pub momentary: bool,
    #[serde(default)]
    pub pull: PullMode,
    pub reporters: Vec<ReporterConfig>,
}

impl LineConfig {
    /// State topic used for Home Assistant discovery: the first MQTT
    /// reporter's topic, if the line has one.
    pub fn state_topic(&self) -> Option<&str> {
        self.reporters.iter().find_map(|r| match r {
            ReporterConfig::Mqtt { topic, .. } => Some(topic.as_str()),
            ReporterConfig::Log => None,
        })
    }
}

/// Pull-resistor mode for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullMode {
    #[default]
    None,
    Up,
    Down,
}

/// Declarative reporter configuration, discriminated by the `type` tag.
/// An unrecognized tag fails config parsing, so a bad sink is rejected at
/// startup rather than at first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReporterConfig {
    Log,
    Mqtt {
        broker: String,
        topic: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

/// Home Assistant MQTT discovery settings. Optional fields fall back to
/// hostname-derived defaults in the discovery module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeAssistantConfig {
    pub enabled: bool,
    pub broker: String,
    #[serde(default)]
    pub discovery_prefix: Option<String>,
    #[serde(default)]
    pub availability_topic: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl MonitorConfig {
    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| MonitorError::ConfigLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: MonitorConfig =
            serde_json::from_str(&data).map_err(|e| MonitorError::ConfigLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if config.monitors.is_empty() {
            return Err(MonitorError::NoLinesConfigured);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "monitors": [
            {
                "name": "Front Door",
                "gpio": 17,
                "normallyHigh": true,
                "pull": "up",
                "reporters": [
                    { "type": "log" },
                    {
                        "type": "mqtt",
                        "broker": "mqtt://10.0.0.2:1883",
                        "topic": "security/front-door",
                        "username": "monitor"
                    }
                ]
            },
            {
                "name": "Driveway Motion",
                "gpio": 27,
                "normallyHigh": false,
                "momentary": true,
                "reporters": [ { "type": "log" } ]
            }
        ],
        "homeAssistant": {
            "enabled": true,
            "broker": "mqtt://10.0.0.2:1883",
            "discoveryPrefix": "homeassistant"
        }
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config: MonitorConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.monitors.len(), 2);

        let door = &config.monitors[0];
        assert_eq!(door.gpio, 17);
        assert!(door.normally_high);
        assert!(!door.momentary);
        assert_eq!(door.pull, PullMode::Up);
        assert_eq!(door.reporters.len(), 2);
        assert_eq!(door.state_topic(), Some("security/front-door"));

        let motion = &config.monitors[1];
        assert!(motion.momentary);
        assert_eq!(motion.pull, PullMode::None);
        assert_eq!(motion.state_topic(), None);

        let ha = config.home_assistant.unwrap();
        assert!(ha.enabled);
        assert_eq!(ha.discovery_prefix.as_deref(), Some("homeassistant"));
        assert_eq!(ha.device_id, None);
    }

    #[test]
    fn test_unknown_reporter_type_is_rejected() {
        let raw = r#"{ "type": "webhook", "url": "http://example" }"#;
        let parsed: std::result::Result<ReporterConfig, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_home_assistant_block_is_none() {
        let raw = r#"{ "monitors": [] }"#;
        let config: MonitorConfig = serde_json::from_str(raw).unwrap();
        assert!(config.home_assistant.is_none());
    }
}
