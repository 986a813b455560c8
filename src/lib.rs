//! # Magbank - charge-session monitor for the FNB58 USB tester
//!
//! Reads telemetry from an FNB-series USB power-path tester, turns the raw
//! fixed-point records into calibrated measurements and keeps a running
//! charge session: accumulated charge and energy, min/avg/max statistics,
//! a smoothed temperature, the inferred charging protocol and a debounced
//! charge-completion state machine. Host network counters can be sampled
//! alongside and reported as per-second rates.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration, defaults and validation
//! - `logging`: tracing setup and component loggers
//! - `decoder`: 64-byte packet / 15-byte record decoding
//! - `protocol`: D+/D− protocol classification and vote smoothing
//! - `session`: coulomb and energy accumulation, running statistics
//! - `charge`: charge-completion detection
//! - `rates`: counter deltas to per-second rates
//! - `counters`: host counter sources (sysfs)
//! - `transport`: packet sources (FNB58 over USB, simulator)
//! - `monitor`: the acquisition task, snapshots and its control handle

pub mod charge;
pub mod config;
pub mod counters;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod protocol;
pub mod rates;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{MonitorError, Result};
pub use monitor::{Monitor, MonitorHandle, Snapshot};
