use super::core::SessionCore;
use super::types::{LinkState, SessionSnapshot, Snapshot};
use crate::charge::ChargeStatus;
use crate::rates::RateSnapshot;
use std::sync::Arc;

impl SessionCore {
    pub fn snapshot(&self, link: LinkState, source: &str) -> SessionSnapshot {
        let state = self.accumulator.state();
        SessionSnapshot {
            captured_at: chrono::Utc::now().to_rfc3339(),
            session_id: self.session_id.clone(),
            source: source.to_string(),
            link,
            latest: self.latest,
            power_w: self.latest.map_or(0.0, |s| s.power_w()),
            protocol: self.protocol,
            charge: ChargeStatus::at(&self.detector.state(), self.clock),
            counting: self.accumulator.is_counting(),
            capacity_mah: state.capacity_mah(),
            energy_wh: state.energy_wh(),
            elapsed_s: state.elapsed_s(),
            voltage: state.voltage_stats.summary(),
            current: state.current_stats.summary(),
            power: state.power_stats.summary(),
            temperature_c: state.temperature_ema,
            packets_decoded: self.packets_decoded,
            packets_dropped: self.packets_dropped,
        }
    }
}

impl Snapshot {
    pub fn merge(tester: Arc<SessionSnapshot>, counters: Arc<Vec<RateSnapshot>>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tester,
            counters,
        }
    }

    /// One-line summary for the periodic log
    pub fn summary_line(&self) -> String {
        let t = &self.tester;
        let (volts, amps) = t
            .latest
            .map_or((0.0, 0.0), |s| (s.voltage_v, s.current_a));
        let mut line = format!(
            "[{}] {:.3} V {:.3} A {:.2} W | {:.1} mAh {:.3} Wh | {} | {} | {}",
            t.link,
            volts,
            amps,
            t.power_w,
            t.capacity_mah,
            t.energy_wh,
            t.protocol,
            t.charge.state,
            t.temperature_c
                .map_or_else(|| "-- °C".to_string(), |c| format!("{:.1} °C", c)),
        );
        for rate in self.counters.iter().filter(|r| r.rate_per_sec > 0.0) {
            line.push_str(&format!(" | {} {:.0}/s", rate.counter, rate.rate_per_sec));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::decoder::Sample;
    use crate::rates::CounterStatus;

    #[test]
    fn snapshot_populates_core_fields() {
        let mut core = SessionCore::new(&SessionConfig::default());
        core.ingest_sample(&Sample {
            voltage_v: 5.0,
            current_a: 2.0,
            dplus_v: 2.7,
            dminus_v: 2.7,
            temperature_c: 31.0,
        });

        let snap = core.snapshot(LinkState::Connected, "test");
        assert_eq!(snap.session_id, core.session_id());
        assert!((snap.power_w - 10.0).abs() < 1e-12);
        assert_eq!(snap.charge.state, "Active");
        assert!(snap.counting);
        assert_eq!(snap.voltage.count, 1);
        assert_eq!(snap.temperature_c, Some(31.0));
        assert!(snap.capacity_mah > 0.0);
    }

    #[test]
    fn summary_line_lists_active_counters() {
        let core = SessionCore::new(&SessionConfig::default());
        let tester = Arc::new(core.snapshot(LinkState::Disconnected, "test"));
        let counters = Arc::new(vec![
            RateSnapshot {
                counter: "eth0/rx_bytes".to_string(),
                rate_per_sec: 1500.0,
                total: 3000,
                status: CounterStatus::Live,
                discontinuities: 0,
            },
            RateSnapshot {
                counter: "eth0/tx_bytes".to_string(),
                rate_per_sec: 0.0,
                total: 0,
                status: CounterStatus::Disconnected,
                discontinuities: 0,
            },
        ]);
        let line = Snapshot::merge(tester, counters).summary_line();
        assert!(line.starts_with("[disconnected]"));
        assert!(line.contains("Idle"));
        assert!(line.contains("eth0/rx_bytes 1500/s"));
        assert!(!line.contains("tx_bytes"));
    }
}
