//! Linux GPIO character-device backend built on `gpiocdev`.
//!
//! The kernel edge read is blocking, so each line gets a dedicated
//! blocking task that forwards edges into the monitor's channel. The
//! forwarder exits once the monitor drops its receiver; until the next
//! edge arrives it sits in the kernel read, which is harmless.

use super::{GpioBackend, LineHandle};
use crate::config::PullMode;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use gpiocdev::Request;
use gpiocdev::line::{Bias, EdgeDetection, EdgeKind, Value};
use log::warn;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 16;
const CONSUMER_LABEL: &str = "security-monitor";

/// Backend that requests lines from a GPIO character device
/// (e.g. `/dev/gpiochip0`).
pub struct CdevGpioBackend {
    chip_path: PathBuf,
}

impl CdevGpioBackend {
    pub fn new(chip_path: &Path) -> Self {
        Self {
            chip_path: chip_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl GpioBackend for CdevGpioBackend {
    async fn open(&self, pin: u32, pull: PullMode) -> Result<Box<dyn LineHandle>> {
        let chip_path = self.chip_path.clone();

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (initial_tx, initial_rx) = oneshot::channel();

        let forwarder = tokio::task::spawn_blocking(move || {
            let (request, initial) = match request_line(&chip_path, pin, pull) {
                Ok(ok) => ok,
                Err(e) => {
                    let _ = initial_tx.send(Err(MonitorError::Gpio {
                        pin,
                        reason: e.to_string(),
                    }));
                    return;
                }
            };

            if initial_tx.send(Ok(initial)).is_err() {
                return;
            }

            for event in request.edge_events() {
                let value = match event {
                    Ok(ev) => edge_value(ev.kind),
                    Err(e) => {
                        warn!("Error watching GPIO {pin}: {e}");
                        continue;
                    }
                };
                if event_tx.blocking_send(value).is_err() {
                    break;
                }
            }
        });

        let initial = initial_rx.await.map_err(|_| MonitorError::Gpio {
            pin,
            reason: "event forwarder exited before the initial read".to_string(),
        })??;

        Ok(Box::new(CdevLineHandle {
            initial,
            receiver: Some(event_rx),
            forwarder,
        }))
    }
}

/// Request the line edge-triggered with the configured bias and sample
/// its current level.
fn request_line(
    chip_path: &Path,
    pin: u32,
    pull: PullMode,
) -> std::result::Result<(Request, u8), gpiocdev::Error> {
    let mut builder = Request::builder();
    builder
        .on_chip(chip_path)
        .with_consumer(CONSUMER_LABEL)
        .with_line(pin)
        .as_input()
        .with_edge_detection(EdgeDetection::BothEdges);

    match pull {
        PullMode::Up => {
            builder.with_bias(Bias::PullUp);
        }
        PullMode::Down => {
            builder.with_bias(Bias::PullDown);
        }
        PullMode::None => {}
    }

    let request = builder.request()?;
    let initial = match request.value(pin)? {
        Value::Active => 1,
        Value::Inactive => 0,
    };
    Ok((request, initial))
}

/// Raw level implied by an edge: rising ends high, falling ends low.
fn edge_value(kind: EdgeKind) -> u8 {
    match kind {
        EdgeKind::Rising => 1,
        EdgeKind::Falling => 0,
    }
}

struct CdevLineHandle {
    initial: u8,
    receiver: Option<mpsc::Receiver<u8>>,
    forwarder: JoinHandle<()>,
}

#[async_trait]
impl LineHandle for CdevLineHandle {
    async fn read(&mut self) -> Result<u8> {
        Ok(self.initial)
    }

    fn watch(&mut self) -> Result<mpsc::Receiver<u8>> {
        self.receiver.take().ok_or(MonitorError::AlreadyWatched)
    }

    async fn release(&mut self) {
        // Dropping the receiver makes the forwarder's next send fail,
        // which releases the kernel line request.
        self.receiver = None;
        self.forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_value_matches_raw_levels() {
        assert_eq!(edge_value(EdgeKind::Rising), 1);
        assert_eq!(edge_value(EdgeKind::Falling), 0);
    }
}
