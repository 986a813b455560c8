//! Charge session accounting for Magbank
//!
//! This module owns the running session: coulomb counting, energy
//! integration, elapsed time, min/avg/max statistics and the smoothed
//! temperature. The charge-completion detector flips the counting flag;
//! while it is off the time integrals hold still but live statistics keep
//! updating.

use crate::decoder::Sample;
use serde::{Deserialize, Serialize};

/// Default EMA weight for temperature
pub const DEFAULT_TEMPERATURE_ALPHA: f64 = 0.1;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Neumaier-compensated running sum.
///
/// Session integrals add ~100 tiny increments per second for hours; plain
/// `+=` loses the low bits once the total dwarfs each increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Running min/max/mean of one quantity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    min: f64,
    max: f64,
    sum: CompensatedSum,
    count: u64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum.add(value);
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Mean of everything pushed, clamped into `[min, max]` against rounding
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.sum.value() / self.count as f64).clamp(self.min, self.max))
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            min: self.min(),
            avg: self.average(),
            max: self.max(),
            count: self.count,
        }
    }
}

/// Serializable view of [`RunningStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
    pub count: u64,
}

/// The accumulator's mutable core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    capacity_mah: CompensatedSum,
    energy_wh: CompensatedSum,
    elapsed_s: CompensatedSum,
    pub voltage_stats: RunningStats,
    pub current_stats: RunningStats,
    pub power_stats: RunningStats,
    /// `None` until the first sample
    pub temperature_ema: Option<f64>,
}

impl SessionState {
    /// Accumulated charge (mAh)
    pub fn capacity_mah(&self) -> f64 {
        self.capacity_mah.value()
    }

    /// Accumulated energy (Wh)
    pub fn energy_wh(&self) -> f64 {
        self.energy_wh.value()
    }

    /// Time spent counting (s)
    pub fn elapsed_s(&self) -> f64 {
        self.elapsed_s.value()
    }
}

/// Integrates samples into a [`SessionState`]
#[derive(Debug, Clone)]
pub struct SessionAccumulator {
    state: SessionState,
    counting: bool,
    temperature_alpha: f64,
}

impl SessionAccumulator {
    pub fn new(temperature_alpha: f64) -> Self {
        Self {
            state: SessionState::default(),
            counting: true,
            temperature_alpha,
        }
    }

    /// Fold one sample in.
    ///
    /// Statistics and temperature always update. Charge, energy and elapsed
    /// time advance only while counting and only for a positive, finite `dt`.
    pub fn ingest(&mut self, sample: &Sample, dt_seconds: f64) {
        let power_w = sample.power_w();

        self.state.voltage_stats.push(sample.voltage_v);
        self.state.current_stats.push(sample.current_a);
        self.state.power_stats.push(power_w);

        let alpha = self.temperature_alpha;
        self.state.temperature_ema = Some(match self.state.temperature_ema {
            None => sample.temperature_c,
            Some(prev) => alpha * sample.temperature_c + (1.0 - alpha) * prev,
        });

        if !self.counting || !(dt_seconds.is_finite() && dt_seconds > 0.0) {
            return;
        }

        self.state
            .capacity_mah
            .add(sample.current_a * dt_seconds * 1000.0 / SECONDS_PER_HOUR);
        self.state
            .energy_wh
            .add(power_w * dt_seconds / SECONDS_PER_HOUR);
        self.state.elapsed_s.add(dt_seconds);
    }

    /// Back to an empty session with counting enabled
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.counting = true;
    }

    pub fn set_counting(&mut self, counting: bool) {
        self.counting = counting;
    }

    pub fn is_counting(&self) -> bool {
        self.counting
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }
}

impl Default for SessionAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f64, a: f64, t: f64) -> Sample {
        Sample {
            voltage_v: v,
            current_a: a,
            dplus_v: 0.0,
            dminus_v: 0.0,
            temperature_c: t,
        }
    }

    #[test]
    fn coulomb_and_energy_integration() {
        let mut acc = SessionAccumulator::default();
        // one hour at 5 V / 1 A in one-second steps
        for _ in 0..3600 {
            acc.ingest(&sample(5.0, 1.0, 25.0), 1.0);
        }
        let s = acc.state();
        assert!((s.capacity_mah() - 1000.0).abs() < 1e-9);
        assert!((s.energy_wh() - 5.0).abs() < 1e-9);
        assert!((s.elapsed_s() - 3600.0).abs() < 1e-9);
    }

    #[test]
    fn compensated_sum_beats_naive_drift() {
        let mut comp = CompensatedSum::default();
        let mut naive = 0.0_f64;
        for _ in 0..1_000_000 {
            comp.add(0.01);
            naive += 0.01;
        }
        assert!((comp.value() - 10_000.0).abs() < 1e-9);
        assert!((comp.value() - 10_000.0).abs() <= (naive - 10_000.0).abs());
    }

    #[test]
    fn non_positive_dt_only_updates_stats() {
        let mut acc = SessionAccumulator::default();
        acc.ingest(&sample(5.0, 2.0, 25.0), 0.0);
        acc.ingest(&sample(5.2, 2.0, 25.0), -1.0);
        acc.ingest(&sample(5.1, 2.0, 25.0), f64::NAN);
        let s = acc.state();
        assert_eq!(s.capacity_mah(), 0.0);
        assert_eq!(s.energy_wh(), 0.0);
        assert_eq!(s.elapsed_s(), 0.0);
        assert_eq!(s.voltage_stats.count(), 3);
        assert_eq!(s.voltage_stats.max(), Some(5.2));
    }

    #[test]
    fn counting_gate_freezes_integrals_not_stats() {
        let mut acc = SessionAccumulator::default();
        acc.ingest(&sample(5.0, 2.0, 25.0), 1.0);
        let frozen = acc.state().capacity_mah();

        acc.set_counting(false);
        acc.ingest(&sample(9.0, 3.0, 40.0), 1.0);
        assert_eq!(acc.state().capacity_mah(), frozen);
        assert_eq!(acc.state().voltage_stats.max(), Some(9.0));
        assert_eq!(acc.state().current_stats.count(), 2);
    }

    #[test]
    fn temperature_ema_seeds_from_first_sample() {
        let mut acc = SessionAccumulator::new(0.1);
        assert_eq!(acc.state().temperature_ema, None);
        acc.ingest(&sample(5.0, 0.0, 30.0), 0.01);
        assert_eq!(acc.state().temperature_ema, Some(30.0));
        acc.ingest(&sample(5.0, 0.0, 40.0), 0.01);
        let ema = acc.state().temperature_ema.unwrap();
        assert!((ema - 31.0).abs() < 1e-12);
    }

    #[test]
    fn average_stays_within_bounds() {
        let mut stats = RunningStats::default();
        for _ in 0..1000 {
            stats.push(0.1);
        }
        let avg = stats.average().unwrap();
        assert!(stats.min().unwrap() <= avg && avg <= stats.max().unwrap());
    }

    #[test]
    fn reset_returns_to_identity() {
        let mut acc = SessionAccumulator::default();
        acc.ingest(&sample(5.0, 2.0, 25.0), 1.0);
        acc.set_counting(false);
        acc.reset();
        assert_eq!(acc.state(), &SessionState::default());
        assert!(acc.is_counting());
        assert_eq!(acc.state().voltage_stats.summary(), StatsSummary::default());
    }
}
