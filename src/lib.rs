//! GPIO security monitor library.
//!
//! Watches digital input lines (door/window/motion contacts), classifies
//! each line's OPEN/CLOSED state from its raw level and configured
//! polarity, and fans state changes out to log and MQTT reporters, with
//! optional Home Assistant MQTT discovery.

pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod gpio;
pub mod instance_lock;
pub mod line_monitor;
pub mod mqtt;
pub mod reporter;
pub mod service;
