use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout};

use bytes::Bytes;

use super::core::SessionCore;
use super::types::{LinkState, MonitorCommand, SessionSnapshot};
use super::{Monitor, MonitorHandle};
use crate::config::Config;
use crate::counters::CounterSource;
use crate::error::{AcquisitionError, Result};
use crate::logging::get_logger;
use crate::rates::{RateComputer, RateSnapshot};
use crate::transport::PacketSource;

/// What woke the loop up
enum Event {
    Command(Option<MonitorCommand>),
    Opened(std::result::Result<(), AcquisitionError>),
    Packet(std::result::Result<Bytes, AcquisitionError>),
    ReconnectDue,
}

impl Monitor {
    /// Build a monitor and the handle that controls it
    pub fn new(
        config: &Config,
        source: Box<dyn PacketSource>,
        counters: Option<Box<dyn CounterSource>>,
    ) -> (Self, MonitorHandle) {
        let core = SessionCore::new(&config.session);
        let source_name = source.describe();
        let link = LinkState::Connecting;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) =
            watch::channel::<Arc<SessionSnapshot>>(Arc::new(core.snapshot(link, &source_name)));
        let (rates_tx, rates_rx) = watch::channel::<Arc<Vec<RateSnapshot>>>(Arc::new(Vec::new()));

        let monitor = Self {
            core,
            source,
            source_name,
            counters,
            counters_interval: Duration::from_millis(config.counters.refresh_interval_ms),
            read_timeout: Duration::from_millis(config.device.read_timeout_ms),
            max_consecutive_failures: config.device.max_consecutive_failures,
            reconnect_interval: Duration::from_millis(config.device.reconnect_interval_ms),
            link,
            consecutive_failures: 0,
            commands_rx,
            snapshot_tx,
            rates_tx,
            logger: get_logger("monitor"),
        };
        let handle = MonitorHandle {
            commands_tx,
            snapshot_rx,
            rates_rx,
        };
        (monitor, handle)
    }

    /// Run until a quit command arrives or every handle is dropped
    pub async fn run(mut self) -> Result<()> {
        self.logger
            .info(&format!("Starting monitor on {}", self.source_name));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters_task = self.counters.take().map(|source| {
            tokio::spawn(run_counters(
                source,
                self.counters_interval,
                self.rates_tx.clone(),
                shutdown_rx,
            ))
        });

        loop {
            let event = self.next_event().await;
            let keep_running = match event {
                Event::Command(Some(cmd)) => self.handle_command(cmd),
                Event::Command(None) => {
                    self.logger.info("All monitor handles dropped");
                    false
                }
                Event::Opened(result) => {
                    self.handle_opened(result);
                    true
                }
                Event::Packet(result) => {
                    self.handle_read(result).await;
                    true
                }
                Event::ReconnectDue => {
                    self.link = LinkState::Connecting;
                    true
                }
            };
            self.publish();
            if !keep_running {
                break;
            }
        }

        self.source.close().await;
        let _ = shutdown_tx.send(true);
        if let Some(task) = counters_task {
            let _ = task.await;
        }
        self.logger.info("Monitor stopped");
        Ok(())
    }

    async fn next_event(&mut self) -> Event {
        match self.link {
            LinkState::Connecting => tokio::select! {
                biased;
                cmd = self.commands_rx.recv() => Event::Command(cmd),
                opened = self.source.open() => Event::Opened(opened),
            },
            LinkState::Connected | LinkState::Degraded { .. } => {
                let read_timeout = self.read_timeout;
                tokio::select! {
                    biased;
                    cmd = self.commands_rx.recv() => Event::Command(cmd),
                    read = timeout(read_timeout, self.source.next_packet()) => {
                        Event::Packet(read.unwrap_or_else(|_| Err(AcquisitionError::Timeout {
                            after_ms: u64::try_from(read_timeout.as_millis()).unwrap_or(u64::MAX),
                        })))
                    }
                }
            }
            LinkState::Disconnected => tokio::select! {
                biased;
                cmd = self.commands_rx.recv() => Event::Command(cmd),
                _ = sleep(self.reconnect_interval) => Event::ReconnectDue,
            },
            LinkState::Ended => Event::Command(self.commands_rx.recv().await),
        }
    }

    fn handle_command(&mut self, cmd: MonitorCommand) -> bool {
        match cmd {
            MonitorCommand::Reset => {
                self.core.reset();
                true
            }
            MonitorCommand::Quit => {
                self.logger.info("Quit requested");
                false
            }
        }
    }

    fn handle_opened(&mut self, result: std::result::Result<(), AcquisitionError>) {
        match result {
            Ok(()) => {
                self.logger
                    .info(&format!("Connected to {}", self.source.describe()));
                self.consecutive_failures = 0;
                self.link = LinkState::Connected;
            }
            Err(e) => {
                self.logger.warn(&format!(
                    "Could not open {}: {}; retrying in {:?}",
                    self.source_name, e, self.reconnect_interval
                ));
                self.link = LinkState::Disconnected;
            }
        }
    }

    async fn handle_read(&mut self, result: std::result::Result<Bytes, AcquisitionError>) {
        match result {
            Ok(bytes) => {
                if self.consecutive_failures > 0 {
                    self.logger.info(&format!(
                        "Reads recovered after {} failures",
                        self.consecutive_failures
                    ));
                }
                self.consecutive_failures = 0;
                self.link = LinkState::Connected;
                // Malformed transfers are counted and logged by the core
                let _ = self.core.ingest_packet(&bytes, self.source.framing());
            }
            Err(AcquisitionError::EndOfStream) => {
                self.logger.info("Source reached end of stream");
                self.source.close().await;
                self.link = LinkState::Ended;
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.logger.warn(&format!(
                    "Read failed ({}/{}): {}",
                    self.consecutive_failures, self.max_consecutive_failures, e
                ));
                if self.consecutive_failures >= self.max_consecutive_failures {
                    self.logger.error(&format!(
                        "{} disconnected; reconnecting every {:?}",
                        self.source_name, self.reconnect_interval
                    ));
                    self.source.close().await;
                    self.link = LinkState::Disconnected;
                } else {
                    self.link = LinkState::Degraded {
                        consecutive_failures: self.consecutive_failures,
                    };
                }
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.core.snapshot(self.link, &self.source_name);
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}

/// Sample counters on a fixed cadence until shutdown
async fn run_counters(
    mut source: Box<dyn CounterSource>,
    every: Duration,
    rates_tx: watch::Sender<Arc<Vec<RateSnapshot>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let logger = get_logger("counters");
    let mut rates = RateComputer::new();
    let mut ticker = interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let readings = source.read_counters().await;
                let now = Instant::now();
                for reading in readings {
                    match reading.value {
                        Some(value) => rates.observe(&reading.name, value, now),
                        None => rates.mark_unreadable(&reading.name),
                    };
                }
                rates_tx.send_replace(Arc::new(rates.snapshot()));
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    logger.debug("Counter sampling stopped");
}
