//! Session orchestration
//!
//! [`Monitor`] owns the [`SessionCore`] and the packet source and runs as
//! one task. Host counters run in a second task on their own cadence.
//! Both publish immutable snapshots over `watch` channels; callers talk to
//! the monitor only through a [`MonitorHandle`], so resets land between
//! packets.

use crate::counters::CounterSource;
use crate::error::{MonitorError, Result};
use crate::logging::StructuredLogger;
use crate::rates::RateSnapshot;
use crate::transport::PacketSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

mod core;
mod runtime;
mod snapshot;
mod types;

pub use self::core::SessionCore;
pub use types::{LinkState, MonitorCommand, SessionSnapshot, Snapshot};

/// The acquisition task
pub struct Monitor {
    core: SessionCore,
    source: Box<dyn PacketSource>,
    source_name: String,
    counters: Option<Box<dyn CounterSource>>,
    counters_interval: Duration,
    read_timeout: Duration,
    max_consecutive_failures: u32,
    reconnect_interval: Duration,
    link: LinkState,
    consecutive_failures: u32,
    commands_rx: mpsc::UnboundedReceiver<MonitorCommand>,
    snapshot_tx: watch::Sender<Arc<SessionSnapshot>>,
    rates_tx: watch::Sender<Arc<Vec<RateSnapshot>>>,
    logger: StructuredLogger,
}

/// Cloneable control and read access to a running [`Monitor`]
#[derive(Clone)]
pub struct MonitorHandle {
    commands_tx: mpsc::UnboundedSender<MonitorCommand>,
    snapshot_rx: watch::Receiver<Arc<SessionSnapshot>>,
    rates_rx: watch::Receiver<Arc<Vec<RateSnapshot>>>,
}

impl MonitorHandle {
    fn send(&self, cmd: MonitorCommand) -> Result<()> {
        self.commands_tx
            .send(cmd)
            .map_err(|_| MonitorError::generic("monitor is not running"))
    }

    /// Ask the monitor to start a fresh session
    pub fn reset(&self) -> Result<()> {
        self.send(MonitorCommand::Reset)
    }

    /// Ask the monitor to release the device and stop
    pub fn quit(&self) -> Result<()> {
        self.send(MonitorCommand::Quit)
    }

    /// Latest tester session merged with the latest counter rates
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::merge(
            self.snapshot_rx.borrow().clone(),
            self.rates_rx.borrow().clone(),
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_rates(&self) -> watch::Receiver<Arc<Vec<RateSnapshot>>> {
        self.rates_rx.clone()
    }
}

/// Wait for a spawned [`Monitor::run`] to finish, giving up after `grace`
pub async fn join(task: JoinHandle<Result<()>>, grace: Duration) -> Result<()> {
    match timeout(grace, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(MonitorError::generic(format!("monitor task failed: {}", e))),
        Err(_) => Err(MonitorError::timeout(format!(
            "monitor did not stop within {:?}",
            grace
        ))),
    }
}
