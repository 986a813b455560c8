//! Single-owner session state
//!
//! Everything that mutates during acquisition lives here and is driven one
//! sample at a time. Per sample the order is: advance the charge detector,
//! let its new state set the counting flag, integrate, then classify the
//! data lines. The sample that completes a charge is not integrated; the
//! one that restarts it is.

use crate::charge::{ChargeCompletionDetector, ChargeState};
use crate::config::SessionConfig;
use crate::decoder::{Framing, Sample, decode_framed};
use crate::error::DecodeError;
use crate::logging::{StructuredLogger, get_logger};
use crate::protocol::{ProtocolLabel, ProtocolVote, classify_with_vbus};
use crate::session::{SessionAccumulator, SessionState};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct SessionCore {
    pub(super) accumulator: SessionAccumulator,
    pub(super) detector: ChargeCompletionDetector,
    vote: ProtocolVote,
    pub(super) protocol: ProtocolLabel,
    pub(super) latest: Option<Sample>,
    /// Sample clock: timestamp the next sample will carry
    pub(super) clock: Instant,
    interval: Duration,
    pub(super) session_id: String,
    pub(super) packets_decoded: u64,
    pub(super) packets_dropped: u64,
    logger: StructuredLogger,
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

impl SessionCore {
    pub fn new(config: &SessionConfig) -> Self {
        let session_id = new_session_id();
        let logger = get_logger("session").for_session(&session_id);
        logger.info("Session started");
        Self {
            accumulator: SessionAccumulator::new(config.temperature_alpha),
            detector: ChargeCompletionDetector::new(config.charge_threshold_w, config.debounce()),
            vote: ProtocolVote::new(config.protocol_vote_window),
            protocol: ProtocolLabel::Unknown,
            latest: None,
            clock: Instant::now(),
            interval: config.sample_interval(),
            session_id,
            packets_decoded: 0,
            packets_dropped: 0,
            logger,
        }
    }

    /// Decode one transfer and ingest its samples.
    ///
    /// Returns the number of samples ingested (zero for frames without
    /// samples). A malformed transfer leaves the session untouched.
    pub fn ingest_packet(&mut self, bytes: &[u8], framing: Framing) -> Result<usize, DecodeError> {
        match decode_framed(bytes, framing) {
            Ok(Some(samples)) => {
                self.packets_decoded += 1;
                for sample in &samples {
                    self.ingest_sample(sample);
                }
                Ok(samples.len())
            }
            Ok(None) => {
                self.logger.trace("Ignoring frame without samples");
                Ok(0)
            }
            Err(e) => {
                self.packets_dropped += 1;
                self.logger.debug(&format!("Dropping malformed packet: {}", e));
                Err(e)
            }
        }
    }

    pub fn ingest_sample(&mut self, sample: &Sample) {
        let now = self.clock;

        self.detector.update(sample.power_w(), now);
        self.accumulator
            .set_counting(self.detector.state().counts());
        self.accumulator
            .ingest(sample, self.interval.as_secs_f64());

        let label = classify_with_vbus(sample.dplus_v, sample.dminus_v, sample.voltage_v);
        let voted = self.vote.push(label);
        if voted != self.protocol {
            self.logger
                .info(&format!("Protocol {} -> {}", self.protocol, voted));
            self.protocol = voted;
        }

        self.latest = Some(*sample);
        self.clock += self.interval;
    }

    /// Drop all session state and start a new session id
    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.detector.reset();
        self.vote.clear();
        self.protocol = ProtocolLabel::Unknown;
        self.latest = None;
        self.session_id = new_session_id();
        self.logger = self.logger.for_session(&self.session_id);
        self.logger.info("Session reset");
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn charge_state(&self) -> ChargeState {
        self.detector.state()
    }

    pub fn session_state(&self) -> &SessionState {
        self.accumulator.state()
    }

    pub fn protocol(&self) -> ProtocolLabel {
        self.protocol
    }

    /// Timestamp the next sample will carry
    pub fn clock(&self) -> Instant {
        self.clock
    }
}
