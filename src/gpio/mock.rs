//! Scripted GPIO backend for tests.
//!
//! Pins are seeded with an initial level and edges are injected through a
//! plain channel sender, so tests drive the exact sequence a kernel edge
//! interrupt would deliver.

use super::{GpioBackend, LineHandle};
use crate::config::PullMode;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 16;

struct MockPin {
    initial: u8,
    fail_open: bool,
    sender: mpsc::Sender<u8>,
    receiver: Option<mpsc::Receiver<u8>>,
}

/// In-memory backend with per-pin scripted behavior.
#[derive(Default)]
pub struct MockGpioBackend {
    pins: Mutex<HashMap<u32, MockPin>>,
}

impl MockGpioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `pin` with an initial raw level.
    pub fn set_initial(&self, pin: u32, value: u8) {
        let mut pins = self.pins.lock().unwrap();
        pins.entry(pin)
            .or_insert_with(|| MockPin::new(value))
            .initial = value;
    }

    /// Make `open` fail for `pin`, simulating a busy or missing line.
    pub fn fail_pin(&self, pin: u32) {
        let mut pins = self.pins.lock().unwrap();
        pins.entry(pin).or_insert_with(|| MockPin::new(0)).fail_open = true;
    }

    /// Sender used to inject raw edge values for `pin`.
    pub fn edge_sender(&self, pin: u32) -> mpsc::Sender<u8> {
        let mut pins = self.pins.lock().unwrap();
        pins.entry(pin)
            .or_insert_with(|| MockPin::new(0))
            .sender
            .clone()
    }
}

impl MockPin {
    fn new(initial: u8) -> Self {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            initial,
            fail_open: false,
            sender,
            receiver: Some(receiver),
        }
    }
}

#[async_trait]
impl GpioBackend for MockGpioBackend {
    async fn open(&self, pin: u32, _pull: PullMode) -> Result<Box<dyn LineHandle>> {
        let mut pins = self.pins.lock().unwrap();
        let entry = pins.entry(pin).or_insert_with(|| MockPin::new(0));

        if entry.fail_open {
            return Err(MonitorError::Gpio {
                pin,
                reason: "line unavailable".to_string(),
            });
        }

        let receiver = entry.receiver.take().ok_or(MonitorError::Gpio {
            pin,
            reason: "line already requested".to_string(),
        })?;

        Ok(Box::new(MockLineHandle {
            initial: entry.initial,
            receiver: Some(receiver),
        }))
    }
}

struct MockLineHandle {
    initial: u8,
    receiver: Option<mpsc::Receiver<u8>>,
}

#[async_trait]
impl LineHandle for MockLineHandle {
    async fn read(&mut self) -> Result<u8> {
        Ok(self.initial)
    }

    fn watch(&mut self) -> Result<mpsc::Receiver<u8>> {
        self.receiver.take().ok_or(MonitorError::AlreadyWatched)
    }

    async fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_reads_seeded_value_and_delivers_edges() {
        let gpio = MockGpioBackend::new();
        gpio.set_initial(17, 1);
        let edges = gpio.edge_sender(17);

        let mut line = gpio.open(17, PullMode::Up).await.unwrap();
        assert_eq!(line.read().await.unwrap(), 1);

        let mut events = line.watch().unwrap();
        edges.send(0).await.unwrap();
        edges.send(1).await.unwrap();
        assert_eq!(events.recv().await, Some(0));
        assert_eq!(events.recv().await, Some(1));
    }

    #[tokio::test]
    async fn test_failed_pin_rejects_open() {
        let gpio = MockGpioBackend::new();
        gpio.fail_pin(22);
        assert!(gpio.open(22, PullMode::None).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_is_single_use() {
        let gpio = MockGpioBackend::new();
        let mut line = gpio.open(4, PullMode::None).await.unwrap();
        assert!(line.watch().is_ok());
        assert!(line.watch().is_err());
    }
}
