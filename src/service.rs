//! Startup and shutdown sequencing.
//!
//! Startup: hub integration (optional, failure downgraded) → initialize
//! lines, keeping survivors → fatal if none survived → announce initial
//! states → spawn consumer tasks. Shutdown runs at most once and closes
//! the hub session before the lines, so the retained "offline" precedes
//! the lines going silent.

use crate::config::MonitorConfig;
use crate::discovery::HomeAssistantDiscovery;
use crate::error::{MonitorError, Result};
use crate::gpio::GpioBackend;
use crate::line_monitor::LineMonitor;
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct SecurityMonitor {
    config: MonitorConfig,
    discovery: Option<HomeAssistantDiscovery>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_token: CancellationToken,
    running: bool,
}

impl SecurityMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            discovery: None,
            tasks: Vec::new(),
            shutdown_token: CancellationToken::new(),
            running: false,
        }
    }

    /// Bring the whole pipeline up. Only configuration problems and
    /// "zero lines survived" are fatal.
    pub async fn start(&mut self, gpio: &dyn GpioBackend) -> Result<()> {
        info!("Security Monitor starting...");

        self.start_hub_integration().await;

        let configured = self.config.monitors.len();
        info!("Found {configured} line(s) to initialize");

        let mut monitors = Vec::new();
        for line in &self.config.monitors {
            let mut monitor = LineMonitor::new(line.clone());
            match monitor.initialize(gpio).await {
                Ok(()) => monitors.push(monitor),
                Err(e) => {
                    error!(
                        "Failed to initialize {} on GPIO {}: {}",
                        line.name, line.gpio, e
                    );
                }
            }
        }

        if monitors.is_empty() {
            return Err(MonitorError::NoLinesInitialized);
        }
        info!(
            "Successfully initialized {} of {configured} line(s)",
            monitors.len()
        );

        // Initial states are announced unconditionally so subscribers see
        // every line once, regardless of momentary mode.
        for monitor in &monitors {
            monitor.report_current_state().await;
        }

        for monitor in monitors {
            self.tasks.push(monitor.start(self.shutdown_token.clone()));
        }

        self.running = true;
        info!("Monitoring for GPIO state changes...");
        Ok(())
    }

    /// Connect to Home Assistant and publish discovery documents.
    /// Any failure here disables hub integration for the run.
    async fn start_hub_integration(&mut self) {
        let Some(ha_config) = &self.config.home_assistant else {
            return;
        };
        if !ha_config.enabled {
            return;
        }

        let mut discovery = HomeAssistantDiscovery::new(ha_config);
        match discovery.connect().await {
            Ok(()) => {
                discovery.publish_all(&self.config.monitors).await;
                self.discovery = Some(discovery);
            }
            Err(e) => {
                warn!("Home Assistant integration unavailable, continuing without it: {e}");
            }
        }
    }

    /// Graceful shutdown. Idempotent: the second and later calls return
    /// immediately.
    pub async fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        info!("Shutting down Security Monitor...");

        if let Some(mut discovery) = self.discovery.take()
            && let Err(e) = discovery.close().await
        {
            error!("Error closing Home Assistant integration: {e}");
        }

        self.shutdown_token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Line monitor task failed during shutdown: {e}");
            }
        }

        info!("Security Monitor shut down complete");
    }
}
