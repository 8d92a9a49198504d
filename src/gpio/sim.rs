//! Simulated GPIO backend.
//!
//! Each opened line starts at its pull-implied resting level and toggles on
//! a fixed interval, exercising the whole pipeline without hardware.
//! Selected with `--simulate`.

use super::{GpioBackend, LineHandle};
use crate::config::PullMode;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Backend that toggles every opened line on a timer.
pub struct SimulatedGpioBackend {
    period: Duration,
}

impl SimulatedGpioBackend {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait]
impl GpioBackend for SimulatedGpioBackend {
    async fn open(&self, pin: u32, pull: PullMode) -> Result<Box<dyn LineHandle>> {
        // A pulled-up line rests high, everything else rests low.
        let initial: u8 = match pull {
            PullMode::Up => 1,
            PullMode::Down | PullMode::None => 0,
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let period = self.period;

        let toggler = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await; // first tick is immediate
            let mut value = initial;
            loop {
                ticker.tick().await;
                value ^= 1;
                debug!("[Sim] GPIO {pin} toggled to {value}");
                if tx.send(value).await.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(SimulatedLineHandle {
            initial,
            receiver: Some(rx),
            toggler,
        }))
    }
}

struct SimulatedLineHandle {
    initial: u8,
    receiver: Option<mpsc::Receiver<u8>>,
    toggler: JoinHandle<()>,
}

#[async_trait]
impl LineHandle for SimulatedLineHandle {
    async fn read(&mut self) -> Result<u8> {
        Ok(self.initial)
    }

    fn watch(&mut self) -> Result<mpsc::Receiver<u8>> {
        self.receiver.take().ok_or(MonitorError::AlreadyWatched)
    }

    async fn release(&mut self) {
        self.toggler.abort();
    }
}

impl Drop for SimulatedLineHandle {
    fn drop(&mut self) {
        self.toggler.abort();
    }
}
