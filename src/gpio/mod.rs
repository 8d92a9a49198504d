//! Hardware collaborator boundary.
//!
//! Line monitors never talk to a GPIO crate directly. They open lines
//! through a [`GpioBackend`] and consume raw level changes from a per-line
//! channel, so the state machine runs identically against real hardware,
//! the timer-driven simulation, or the scripted mock used in tests.

#[cfg(feature = "hardware-gpio")]
mod cdev;
mod mock;
mod sim;

#[cfg(feature = "hardware-gpio")]
pub use cdev::CdevGpioBackend;
pub use mock::MockGpioBackend;
pub use sim::SimulatedGpioBackend;

use crate::config::PullMode;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Opens monitored lines. One backend instance is shared by all monitors.
#[async_trait]
pub trait GpioBackend: Send + Sync {
    /// Request `pin` as an edge-triggered input with the given pull bias.
    ///
    /// Errors are per-line: a failed open drops that line and leaves the
    /// rest of the process running.
    async fn open(&self, pin: u32, pull: PullMode) -> Result<Box<dyn LineHandle>>;
}

/// One requested line. Released on [`LineHandle::release`] or drop.
///
/// Handles are held by monitors that run inside spawned tasks, so they
/// must be `Send + Sync`.
#[async_trait]
pub trait LineHandle: Send + Sync {
    /// The raw level sampled when the line was requested.
    async fn read(&mut self) -> Result<u8>;

    /// Take the edge-event receiver. Raw levels arrive in delivery order;
    /// callable once per handle.
    fn watch(&mut self) -> Result<mpsc::Receiver<u8>>;

    /// Release the line and stop edge delivery.
    async fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monitors holding a line handle are moved into tokio::spawn, so the
    // boxed handle must satisfy the spawn bounds.
    #[tokio::test]
    async fn test_line_handles_satisfy_task_bounds() {
        fn assert_spawnable<T: Send + Sync>(_: &T) {}

        let gpio = MockGpioBackend::new();
        let line: Box<dyn LineHandle> = gpio.open(17, PullMode::None).await.unwrap();
        assert_spawnable(&line);
    }
}
