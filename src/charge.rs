//! Debounced charge-completion detection
//!
//! A small state machine over instantaneous power:
//!
//! ```text
//!   Idle ──p>T──▶ Active ──p<T──▶ Settling{since}
//!                   ▲  ▲               │
//!                   │  └─────p>T───────┤
//!                   │                  │ below T for `debounce`
//!                   └──p>T── Complete ◀┘
//! ```
//!
//! Every transition is evaluated against the caller-supplied timestamp, so
//! the detector never reads a clock itself.

use crate::logging::{StructuredLogger, get_logger};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Default charging threshold (W)
pub const DEFAULT_THRESHOLD_W: f64 = 1.0;
/// Default time power must stay low before charging counts as complete
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

/// Charge-completion state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    /// Nothing drawing power yet
    Idle,
    /// Power above threshold
    Active,
    /// Power fell below threshold at `since`; waiting out the debounce window
    Settling { since: Instant },
    /// Charging finished. `duration` runs from `started_at` to the moment
    /// power first dropped; `detected_at` is when the debounce expired.
    Complete {
        started_at: Instant,
        duration: Duration,
        detected_at: Instant,
    },
}

impl ChargeState {
    /// Whether session integrals should advance in this state
    pub fn counts(&self) -> bool {
        match self {
            ChargeState::Idle | ChargeState::Active | ChargeState::Settling { .. } => true,
            ChargeState::Complete { .. } => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChargeState::Idle => "Idle",
            ChargeState::Active => "Active",
            ChargeState::Settling { .. } => "Settling",
            ChargeState::Complete { .. } => "Complete",
        }
    }
}

/// Serializable view of [`ChargeState`] relative to a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeStatus {
    pub state: &'static str,
    /// Seconds spent below threshold so far (Settling only)
    pub settling_for_s: Option<f64>,
    /// Charging time of the completed charge (Complete only)
    pub charge_duration_s: Option<f64>,
}

impl ChargeStatus {
    pub fn at(state: &ChargeState, now: Instant) -> Self {
        let (settling_for_s, charge_duration_s) = match state {
            ChargeState::Idle | ChargeState::Active => (None, None),
            ChargeState::Settling { since } => {
                (Some(now.saturating_duration_since(*since).as_secs_f64()), None)
            }
            ChargeState::Complete { duration, .. } => (None, Some(duration.as_secs_f64())),
        };
        Self {
            state: state.name(),
            settling_for_s,
            charge_duration_s,
        }
    }
}

/// Watches power and decides when the device under test has finished
#[derive(Debug, Clone)]
pub struct ChargeCompletionDetector {
    state: ChargeState,
    threshold_w: f64,
    debounce: Duration,
    session_started_at: Option<Instant>,
    charge_started_at: Option<Instant>,
    logger: StructuredLogger,
}

impl ChargeCompletionDetector {
    pub fn new(threshold_w: f64, debounce: Duration) -> Self {
        Self {
            state: ChargeState::Idle,
            threshold_w,
            debounce,
            session_started_at: None,
            charge_started_at: None,
            logger: get_logger("charge"),
        }
    }

    pub fn state(&self) -> ChargeState {
        self.state
    }

    /// First time anything charged in this session
    pub fn session_started_at(&self) -> Option<Instant> {
        self.session_started_at
    }

    /// Feed one power reading; returns the new state if it changed.
    pub fn update(&mut self, power_w: f64, now: Instant) -> Option<ChargeState> {
        let above = power_w > self.threshold_w;
        let below = power_w < self.threshold_w;

        let next = match self.state {
            ChargeState::Idle if above => {
                self.session_started_at.get_or_insert(now);
                self.charge_started_at = Some(now);
                Some(ChargeState::Active)
            }
            ChargeState::Active if below => Some(ChargeState::Settling { since: now }),
            ChargeState::Settling { .. } if above => Some(ChargeState::Active),
            ChargeState::Settling { since }
                if below && now.saturating_duration_since(since) >= self.debounce =>
            {
                let started_at = self.charge_started_at.unwrap_or(since);
                Some(ChargeState::Complete {
                    started_at,
                    duration: since.saturating_duration_since(started_at),
                    detected_at: now,
                })
            }
            ChargeState::Complete { .. } if above => {
                self.charge_started_at = Some(now);
                Some(ChargeState::Active)
            }
            _ => None,
        }?;

        self.logger.info(&format!(
            "Charge state {} -> {} at {:.2} W",
            self.state.name(),
            next.name(),
            power_w
        ));
        if let ChargeState::Complete { duration, .. } = next {
            self.logger.info(&format!(
                "Charge complete after {:.1} s",
                duration.as_secs_f64()
            ));
        }
        self.state = next;
        Some(next)
    }

    /// Back to `Idle` with no session start recorded
    pub fn reset(&mut self) {
        self.state = ChargeState::Idle;
        self.session_started_at = None;
        self.charge_started_at = None;
    }
}

impl Default for ChargeCompletionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_W, DEFAULT_DEBOUNCE)
    }
}
