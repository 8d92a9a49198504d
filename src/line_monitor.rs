//! Per-line monitor: edge detection, state classification, momentary
//! filtering and reporter fan-out.
//!
//! The monitor is the single writer of its own `last_value`. After
//! initialization it runs as the consumer of the line's edge channel, so
//! raw levels are processed in delivery order without shared mutable
//! state.

use crate::config::{LineConfig, PullMode};
use crate::error::Result;
use crate::event::{LineState, StateChangeEvent};
use crate::gpio::{GpioBackend, LineHandle};
use crate::reporter::Reporter;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct LineMonitor {
    config: LineConfig,
    line: Option<Box<dyn LineHandle>>,
    events: Option<mpsc::Receiver<u8>>,
    reporters: Vec<Reporter>,
    /// None until the first successful read. Updated on every observed
    /// change, including ones momentary mode filters from reporting.
    last_value: Option<u8>,
}

impl LineMonitor {
    pub fn new(config: LineConfig) -> Self {
        Self {
            config,
            line: None,
            events: None,
            reporters: Vec::new(),
            last_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Request the line, seed `last_value` with one read, build the
    /// reporter list and take the edge-event receiver.
    ///
    /// An error leaves the monitor un-armed; the orchestrator drops it
    /// and continues with the remaining lines.
    pub async fn initialize(&mut self, gpio: &dyn GpioBackend) -> Result<()> {
        let mut line = gpio.open(self.config.gpio, self.config.pull).await?;
        let initial = line.read().await?;
        self.events = Some(line.watch()?);
        self.reporters = Reporter::build_all(&self.config.reporters)?;
        self.last_value = Some(initial);
        self.line = Some(line);

        let mode = if self.config.momentary {
            " (momentary mode)"
        } else {
            ""
        };
        let pull = match self.config.pull {
            PullMode::Up => " [pull-up]",
            PullMode::Down => " [pull-down]",
            PullMode::None => "",
        };
        info!(
            "Initialized {} on GPIO {}, initial state: {}{}{}",
            self.config.name,
            self.config.gpio,
            self.classify(initial),
            mode,
            pull
        );
        Ok(())
    }

    /// Raw level the line sits at when nothing is happening.
    fn resting_level(&self) -> u8 {
        if self.config.normally_high { 1 } else { 0 }
    }

    /// Map a raw level to the logical state. Single source of truth for
    /// polarity: the resting level is CLOSED, the other level is OPEN.
    pub fn classify(&self, value: u8) -> LineState {
        if value == self.resting_level() {
            LineState::Closed
        } else {
            LineState::Open
        }
    }

    /// Momentary filtering policy. Non-momentary lines report every
    /// transition; momentary lines report only the move away from the
    /// resting level, never the return.
    pub fn should_report(&self, value: u8) -> bool {
        !self.config.momentary || value != self.resting_level()
    }

    /// Process one raw level delivered by the hardware collaborator.
    pub async fn handle_change(&mut self, value: u8) {
        if self.last_value == Some(value) {
            return; // duplicate or ghost edge
        }

        // Track polarity even for transitions that are filtered below.
        self.last_value = Some(value);
        let state = self.classify(value);

        if !self.should_report(value) {
            debug!(
                "{}: GPIO {} returned to resting level (value: {}), not reporting (momentary mode)",
                self.config.name, self.config.gpio, value
            );
            return;
        }

        info!(
            "{}: GPIO {} changed to {} (value: {})",
            self.config.name, self.config.gpio, state, value
        );

        let event = StateChangeEvent::new(&self.config.name, self.config.gpio, value, state);
        self.dispatch(&event).await;
    }

    /// Announce the current value unconditionally, bypassing momentary
    /// filtering. Used once at startup.
    pub async fn report_current_state(&self) {
        let Some(value) = self.last_value else {
            return;
        };

        let state = self.classify(value);
        info!("Reporting initial state for {}: {}", self.config.name, state);

        let event = StateChangeEvent::new(&self.config.name, self.config.gpio, value, state);
        self.dispatch(&event).await;
    }

    /// Sequential fan-out in configuration order. A failing reporter is
    /// logged and never blocks the reporters after it.
    async fn dispatch(&self, event: &StateChangeEvent) {
        for reporter in &self.reporters {
            if let Err(e) = reporter.report(event).await {
                error!(
                    "{}: Error reporting to {} reporter: {}",
                    self.config.name,
                    reporter.kind(),
                    e
                );
            }
        }
    }

    /// Spawn the consumer task: process edges in delivery order until the
    /// channel closes or shutdown is requested, then clean up.
    pub fn start(mut self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let Some(mut events) = self.events.take() else {
                warn!("{}: Started without an armed line", self.config.name);
                return;
            };

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    value = events.recv() => match value {
                        Some(v) => self.handle_change(v).await,
                        None => {
                            warn!(
                                "{}: GPIO {} edge channel closed",
                                self.config.name, self.config.gpio
                            );
                            break;
                        }
                    },
                }
            }

            self.cleanup().await;
        })
    }

    /// Close every reporter (collecting failures as log lines) and
    /// release the line.
    async fn cleanup(&mut self) {
        info!("Cleaning up {}...", self.config.name);

        for reporter in &mut self.reporters {
            if let Err(e) = reporter.close().await {
                error!(
                    "{}: Error closing {} reporter: {}",
                    self.config.name,
                    reporter.kind(),
                    e
                );
            }
        }

        if let Some(mut line) = self.line.take() {
            line.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReporterConfig;
    use crate::gpio::MockGpioBackend;
    use crate::reporter::MockReporter;

    fn line_config(normally_high: bool, momentary: bool) -> LineConfig {
        LineConfig {
            name: "Test Line".to_string(),
            gpio: 17,
            normally_high,
            momentary,
            pull: PullMode::None,
            reporters: Vec::new(),
        }
    }

    /// Monitor armed with a recording reporter and a seeded last value,
    /// with no hardware behind it.
    fn armed_monitor(
        normally_high: bool,
        momentary: bool,
        last_value: u8,
    ) -> (LineMonitor, MockReporter) {
        let mock = MockReporter::new();
        let mut monitor = LineMonitor::new(line_config(normally_high, momentary));
        monitor.reporters = vec![Reporter::Mock(mock.clone())];
        monitor.last_value = Some(last_value);
        (monitor, mock)
    }

    #[test]
    fn test_classify_partitions_both_polarities() {
        let high = LineMonitor::new(line_config(true, false));
        assert_eq!(high.classify(1), LineState::Closed);
        assert_eq!(high.classify(0), LineState::Open);

        let low = LineMonitor::new(line_config(false, false));
        assert_eq!(low.classify(0), LineState::Closed);
        assert_eq!(low.classify(1), LineState::Open);
    }

    #[test]
    fn test_should_report_truth_table() {
        // Non-momentary: every transition reports, both polarities.
        for normally_high in [true, false] {
            let monitor = LineMonitor::new(line_config(normally_high, false));
            assert!(monitor.should_report(0));
            assert!(monitor.should_report(1));
        }

        // Momentary: only the move away from the resting level reports.
        let high = LineMonitor::new(line_config(true, true));
        assert!(high.should_report(0));
        assert!(!high.should_report(1));

        let low = LineMonitor::new(line_config(false, true));
        assert!(low.should_report(1));
        assert!(!low.should_report(0));
    }

    #[test]
    fn test_duplicate_edge_is_suppressed() {
        let (mut monitor, mock) = armed_monitor(true, false, 1);
        tokio_test::block_on(async {
            monitor.handle_change(0).await;
            monitor.handle_change(0).await;
        });
        assert_eq!(mock.report_count(), 1);
    }

    #[tokio::test]
    async fn test_non_momentary_reports_both_directions() {
        let (mut monitor, mock) = armed_monitor(true, false, 1);

        monitor.handle_change(0).await;
        monitor.handle_change(1).await;

        let events = mock.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].state, LineState::Open);
        assert_eq!(events[0].value, 0);
        assert_eq!(events[1].state, LineState::Closed);
        assert_eq!(events[1].value, 1);
    }

    #[tokio::test]
    async fn test_momentary_suppresses_return_to_resting() {
        let (mut monitor, mock) = armed_monitor(true, true, 1);

        monitor.handle_change(0).await;
        monitor.handle_change(1).await;

        let events = mock.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, LineState::Open);

        // last_value tracked the filtered return, so the next press
        // is still seen as a change.
        monitor.handle_change(0).await;
        assert_eq!(mock.report_count(), 2);
    }

    #[tokio::test]
    async fn test_report_current_state_bypasses_momentary_filter() {
        let (monitor, mock) = armed_monitor(true, true, 1);

        // Resting level would be filtered by should_report.
        monitor.report_current_state().await;
        monitor.report_current_state().await;

        let events = mock.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].state, LineState::Closed);
    }

    #[tokio::test]
    async fn test_report_current_state_without_seed_is_noop() {
        let mock = MockReporter::new();
        let mut monitor = LineMonitor::new(line_config(true, false));
        monitor.reporters = vec![Reporter::Mock(mock.clone())];

        monitor.report_current_state().await;
        assert_eq!(mock.report_count(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_survives_failing_reporter() {
        let first = MockReporter::new();
        let failing = MockReporter::failing();
        let last = MockReporter::new();

        let mut monitor = LineMonitor::new(line_config(true, false));
        monitor.reporters = vec![
            Reporter::Mock(first.clone()),
            Reporter::Mock(failing.clone()),
            Reporter::Mock(last.clone()),
        ];
        monitor.last_value = Some(1);

        monitor.handle_change(0).await;

        assert_eq!(first.report_count(), 1);
        assert_eq!(failing.report_count(), 1);
        assert_eq!(last.report_count(), 1);
    }

    #[tokio::test]
    async fn test_initialize_seeds_from_hardware_read() {
        let gpio = MockGpioBackend::new();
        gpio.set_initial(17, 1);

        let mut config = line_config(true, false);
        config.reporters = vec![ReporterConfig::Log];

        let mut monitor = LineMonitor::new(config);
        monitor.initialize(&gpio).await.unwrap();

        assert_eq!(monitor.last_value, Some(1));
        assert_eq!(monitor.reporters.len(), 1);
        assert!(monitor.events.is_some());
    }

    #[tokio::test]
    async fn test_initialize_fails_when_line_unavailable() {
        let gpio = MockGpioBackend::new();
        gpio.fail_pin(17);

        let mut monitor = LineMonitor::new(line_config(true, false));
        assert!(monitor.initialize(&gpio).await.is_err());
        assert_eq!(monitor.last_value, None);
    }

    #[tokio::test]
    async fn test_consumer_task_processes_edges_and_cleans_up() {
        let gpio = MockGpioBackend::new();
        gpio.set_initial(17, 1);
        let edges = gpio.edge_sender(17);

        let mock = MockReporter::new();
        let mut monitor = LineMonitor::new(line_config(true, false));
        monitor.initialize(&gpio).await.unwrap();
        monitor.reporters = vec![Reporter::Mock(mock.clone())];

        let shutdown = CancellationToken::new();
        let task = monitor.start(shutdown.clone());

        edges.send(0).await.unwrap();
        edges.send(1).await.unwrap();

        // Closing the edge channel ends the consumer loop.
        drop(edges);
        drop(gpio);
        task.await.unwrap();

        assert_eq!(mock.report_count(), 2);
        assert!(mock.is_closed());
    }
}
