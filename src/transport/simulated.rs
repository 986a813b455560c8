//! Synthetic charge cycle for running without hardware
//!
//! Produces bare-framed packets of a constant-current charge, a linear
//! ramp down to zero current and an idle tail, sampled on the same 10 ms
//! grid the tester uses.

use super::PacketSource;
use crate::config::SimulationConfig;
use crate::decoder::{Framing, SAMPLES_PER_PACKET, Sample, encode_packet};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Data-line level of the simulated DCP charger (V)
const SIM_DATA_LINE_V: f64 = 0.6;
/// Simulated board temperature at t = 0 (°C)
const SIM_BASE_TEMPERATURE_C: f64 = 30.0;

pub struct SimulatedSource {
    config: SimulationConfig,
    sample_interval: Duration,
    next_index: u64,
    packets_sent: u64,
    packet_limit: Option<u64>,
    open: bool,
}

impl SimulatedSource {
    pub fn new(config: SimulationConfig, sample_interval: Duration) -> Self {
        Self {
            config,
            sample_interval,
            next_index: 0,
            packets_sent: 0,
            packet_limit: None,
            open: false,
        }
    }

    /// End the stream after `packets` transfers
    pub fn with_packet_limit(mut self, packets: u64) -> Self {
        self.packet_limit = Some(packets);
        self
    }

    fn cycle_s(&self) -> f64 {
        self.config.charge_s + self.config.ramp_s + self.config.idle_s
    }

    /// Current drawn at `t` seconds into the simulation
    pub fn current_at(&self, t: f64) -> f64 {
        let c = &self.config;
        let cycle = self.cycle_s();
        let t = if c.repeat && cycle > 0.0 { t % cycle } else { t };

        if t < c.charge_s {
            c.current_a
        } else if t < c.charge_s + c.ramp_s {
            c.current_a * (1.0 - (t - c.charge_s) / c.ramp_s)
        } else {
            0.0
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn sample_at(&self, index: u64) -> Sample {
        let t = index as f64 * self.sample_interval.as_secs_f64();
        Sample {
            voltage_v: self.config.voltage_v,
            current_a: self.current_at(t).max(0.0),
            dplus_v: SIM_DATA_LINE_V,
            dminus_v: SIM_DATA_LINE_V,
            temperature_c: SIM_BASE_TEMPERATURE_C + t / 60.0,
        }
    }
}

#[async_trait]
impl PacketSource for SimulatedSource {
    async fn open(&mut self) -> Result<(), AcquisitionError> {
        self.open = true;
        tracing::info!(
            charge_s = self.config.charge_s,
            ramp_s = self.config.ramp_s,
            idle_s = self.config.idle_s,
            "simulated charge cycle ready"
        );
        Ok(())
    }

    async fn next_packet(&mut self) -> Result<Bytes, AcquisitionError> {
        if !self.open {
            return Err(AcquisitionError::gone("simulator not open"));
        }
        if self
            .packet_limit
            .is_some_and(|limit| self.packets_sent >= limit)
        {
            return Err(AcquisitionError::EndOfStream);
        }
        if self.config.realtime {
            tokio::time::sleep(self.sample_interval * SAMPLES_PER_PACKET as u32).await;
        }

        let base = self.next_index;
        let samples: [Sample; SAMPLES_PER_PACKET] =
            std::array::from_fn(|i| self.sample_at(base + i as u64));
        self.next_index += SAMPLES_PER_PACKET as u64;
        self.packets_sent += 1;
        Ok(Bytes::copy_from_slice(&encode_packet(&samples)))
    }

    async fn close(&mut self) {
        self.open = false;
    }

    fn framing(&self) -> Framing {
        Framing::Bare
    }

    fn describe(&self) -> String {
        format!(
            "simulator {:.1} V / {:.1} A",
            self.config.voltage_v, self.config.current_a
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn fast() -> SimulationConfig {
        SimulationConfig {
            realtime: false,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn profile_shape() {
        let src = SimulatedSource::new(fast(), Duration::from_millis(10));
        assert_eq!(src.current_at(0.0), 2.0);
        assert_eq!(src.current_at(14.99), 2.0);
        assert!((src.current_at(17.5) - 1.0).abs() < 1e-12);
        assert_eq!(src.current_at(20.0), 0.0);
        assert_eq!(src.current_at(500.0), 0.0);
    }

    #[test]
    fn repeat_wraps_cycle() {
        let cfg = SimulationConfig {
            repeat: true,
            ..fast()
        };
        let src = SimulatedSource::new(cfg, Duration::from_millis(10));
        assert_eq!(src.current_at(31.0), 2.0);
    }

    #[tokio::test]
    async fn packets_decode_in_sequence() {
        let mut src = SimulatedSource::new(fast(), Duration::from_millis(10)).with_packet_limit(2);
        src.open().await.unwrap();

        let first = decode(&src.next_packet().await.unwrap()).unwrap();
        assert!((first[0].voltage_v - 5.0).abs() < 1e-9);
        assert!((first[0].current_a - 2.0).abs() < 1e-9);
        assert!((first[0].dplus_v - 0.6).abs() < 1e-9);

        src.next_packet().await.unwrap();
        assert_eq!(src.next_packet().await, Err(AcquisitionError::EndOfStream));
    }

    #[tokio::test]
    async fn closed_simulator_refuses_reads() {
        let mut src = SimulatedSource::new(fast(), Duration::from_millis(10));
        assert!(src.next_packet().await.is_err());
        src.open().await.unwrap();
        src.close().await;
        assert!(src.next_packet().await.is_err());
    }
}
