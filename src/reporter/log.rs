//! Log reporter: one human-readable line per event on the diagnostic stream.

use crate::error::Result;
use crate::event::StateChangeEvent;
use log::info;

#[derive(Default)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, event: &StateChangeEvent) -> Result<()> {
        info!(
            "[{}] {} (GPIO {}): {} (value: {})",
            event.timestamp_rfc3339(),
            event.name,
            event.gpio,
            event.state,
            event.value
        );
        Ok(())
    }
}
