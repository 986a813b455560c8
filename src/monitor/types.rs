use crate::charge::ChargeStatus;
use crate::decoder::Sample;
use crate::protocol::ProtocolLabel;
use crate::rates::RateSnapshot;
use crate::session::StatsSummary;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Commands accepted by the monitor from its handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    /// Start a fresh session at the next packet boundary
    Reset,
    /// Release the device and stop
    Quit,
}

/// Health of the tester link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state")]
pub enum LinkState {
    /// Opening the device
    Connecting,
    /// Reads succeeding
    Connected,
    /// Recent reads failed but the failure bound is not reached
    Degraded { consecutive_failures: u32 },
    /// Too many consecutive failures; waiting to reconnect
    Disconnected,
    /// The source has no more data
    Ended,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Connecting => f.write_str("connecting"),
            LinkState::Connected => f.write_str("connected"),
            LinkState::Degraded {
                consecutive_failures,
            } => write!(f, "degraded ({} failures)", consecutive_failures),
            LinkState::Disconnected => f.write_str("disconnected"),
            LinkState::Ended => f.write_str("ended"),
        }
    }
}

/// Point-in-time view of the tester session, published after every packet
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub captured_at: String,
    pub session_id: String,
    pub source: String,
    pub link: LinkState,
    /// Most recent sample, `None` until the first one arrives
    pub latest: Option<Sample>,
    pub power_w: f64,
    pub protocol: ProtocolLabel,
    pub charge: ChargeStatus,
    pub counting: bool,
    pub capacity_mah: f64,
    pub energy_wh: f64,
    pub elapsed_s: f64,
    pub voltage: StatsSummary,
    pub current: StatsSummary,
    pub power: StatsSummary,
    pub temperature_c: Option<f64>,
    pub packets_decoded: u64,
    pub packets_dropped: u64,
}

/// Tester session merged with the latest counter rates
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub tester: Arc<SessionSnapshot>,
    pub counters: Arc<Vec<RateSnapshot>>,
}
