//! Per-second rates from monotonic hardware counters
//!
//! Only the previous observation of each counter is kept. A counter that
//! goes backwards (driver reload, device re-enumeration) starts a new
//! baseline instead of producing a negative delta.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// One counter observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSample {
    pub counter_value: u64,
    pub observed_at: Instant,
}

/// Whether the counter could be read on the last attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CounterStatus {
    Live,
    Disconnected,
}

/// Published view of one counter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    pub counter: String,
    pub rate_per_sec: f64,
    /// Sum of all non-negative deltas seen so far
    pub total: u64,
    pub status: CounterStatus,
    pub discontinuities: u64,
}

#[derive(Debug, Clone)]
struct CounterTrack {
    previous: Option<RateSample>,
    total: u64,
    last_rate: f64,
    status: CounterStatus,
    discontinuities: u64,
}

impl Default for CounterTrack {
    fn default() -> Self {
        Self {
            previous: None,
            total: 0,
            last_rate: 0.0,
            status: CounterStatus::Live,
            discontinuities: 0,
        }
    }
}

impl CounterTrack {
    fn snapshot(&self, name: &str) -> RateSnapshot {
        RateSnapshot {
            counter: name.to_string(),
            rate_per_sec: self.last_rate,
            total: self.total,
            status: self.status,
            discontinuities: self.discontinuities,
        }
    }
}

/// Tracks any number of named counters
#[derive(Debug, Clone, Default)]
pub struct RateComputer {
    tracks: BTreeMap<String, CounterTrack>,
}

impl RateComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading and return the counter's updated view.
    #[allow(clippy::cast_precision_loss)]
    pub fn observe(&mut self, counter: &str, value: u64, at: Instant) -> RateSnapshot {
        let track = self.tracks.entry(counter.to_string()).or_default();
        track.status = CounterStatus::Live;

        track.last_rate = match track.previous {
            None => 0.0,
            Some(prev) if value < prev.counter_value => {
                track.discontinuities += 1;
                tracing::debug!(
                    counter,
                    previous = prev.counter_value,
                    value,
                    "counter went backwards, rebaselining"
                );
                0.0
            }
            Some(prev) => {
                let delta = value - prev.counter_value;
                track.total = track.total.saturating_add(delta);
                let dt = at.saturating_duration_since(prev.observed_at).as_secs_f64();
                if dt > 0.0 {
                    delta as f64 / dt
                } else {
                    0.0
                }
            }
        };

        track.previous = Some(RateSample {
            counter_value: value,
            observed_at: at,
        });
        track.snapshot(counter)
    }

    /// The counter could not be read; the next good read starts a new baseline.
    pub fn mark_unreadable(&mut self, counter: &str) -> RateSnapshot {
        let track = self.tracks.entry(counter.to_string()).or_default();
        track.status = CounterStatus::Disconnected;
        track.previous = None;
        track.last_rate = 0.0;
        track.snapshot(counter)
    }

    /// All tracked counters, ordered by name
    pub fn snapshot(&self) -> Vec<RateSnapshot> {
        self.tracks
            .iter()
            .map(|(name, track)| track.snapshot(name))
            .collect()
    }
}
