//! Event sinks.
//!
//! The reporter set is small and closed (log, MQTT), so reporters are a
//! tagged enum rather than trait objects. Fan-out and failure isolation
//! live in the line monitor, not here: one reporter failing must never
//! silence the others.

mod log;
mod mqtt;

pub use self::log::LogReporter;
pub use self::mqtt::MqttReporter;

#[cfg(test)]
pub use self::mock::MockReporter;

use crate::config::ReporterConfig;
use crate::error::Result;
use crate::event::StateChangeEvent;

/// A sink that receives state-change events and is closed at shutdown.
pub enum Reporter {
    Log(LogReporter),
    Mqtt(MqttReporter),
    #[cfg(test)]
    Mock(MockReporter),
}

impl Reporter {
    /// Build one reporter from its declarative configuration.
    pub fn from_config(config: &ReporterConfig) -> Result<Self> {
        match config {
            ReporterConfig::Log => Ok(Reporter::Log(LogReporter::new())),
            ReporterConfig::Mqtt {
                broker,
                topic,
                username,
                password,
            } => Ok(Reporter::Mqtt(MqttReporter::new(
                broker,
                topic,
                username.as_deref(),
                password.as_deref(),
            )?)),
        }
    }

    /// Build the full reporter list for one line, in configuration order.
    pub fn build_all(configs: &[ReporterConfig]) -> Result<Vec<Reporter>> {
        configs.iter().map(Reporter::from_config).collect()
    }

    pub async fn report(&self, event: &StateChangeEvent) -> Result<()> {
        match self {
            Reporter::Log(r) => r.report(event),
            Reporter::Mqtt(r) => r.report(event).await,
            #[cfg(test)]
            Reporter::Mock(r) => r.report(event),
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        match self {
            Reporter::Log(_) => Ok(()),
            Reporter::Mqtt(r) => r.close().await,
            #[cfg(test)]
            Reporter::Mock(r) => r.close(),
        }
    }

    /// Short tag used in fan-out error logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Reporter::Log(_) => "log",
            Reporter::Mqtt(_) => "mqtt",
            #[cfg(test)]
            Reporter::Mock(_) => "mock",
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Recording reporter for fan-out and filtering tests.

    use super::*;
    use crate::error::MonitorError;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockState {
        events: Vec<StateChangeEvent>,
        fail_reports: bool,
        closed: bool,
    }

    #[derive(Clone, Default)]
    pub struct MockReporter {
        state: Arc<Mutex<MockState>>,
    }

    impl MockReporter {
        pub fn new() -> Self {
            Self::default()
        }

        /// A reporter whose `report` always fails.
        pub fn failing() -> Self {
            let reporter = Self::default();
            reporter.state.lock().unwrap().fail_reports = true;
            reporter
        }

        pub fn report(&self, event: &StateChangeEvent) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.events.push(event.clone());
            if state.fail_reports {
                return Err(MonitorError::Reporter("mock reporter failure".to_string()));
            }
            Ok(())
        }

        pub fn close(&self) -> Result<()> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }

        pub fn events(&self) -> Vec<StateChangeEvent> {
            self.state.lock().unwrap().events.clone()
        }

        pub fn report_count(&self) -> usize {
            self.state.lock().unwrap().events.len()
        }

        pub fn is_closed(&self) -> bool {
            self.state.lock().unwrap().closed
        }
    }
}
