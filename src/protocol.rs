//! Charging protocol inference from the D+/D− lines
//!
//! Classification is a best-effort reading of the voltage-divider and
//! short-circuit signatures chargers put on the data lines. It is a pure
//! function of its inputs; smoothing over time lives in [`ProtocolVote`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Half-width of the window around a nominal data-line level (V)
const LEVEL_TOLERANCE_V: f64 = 0.15;
/// Both lines below this are treated as pulled down (V)
const PULLED_DOWN_V: f64 = 0.1;
/// D+/D− closer than this are treated as shorted (V)
const SHORTED_DELTA_V: f64 = 0.05;
/// BC1.2 primary detection band for a shorted pair (V)
const DCP_BAND_V: (f64, f64) = (0.3, 0.8);
/// Default USB VBUS window; outside it the source must have negotiated (V)
const VBUS_DEFAULT_BAND_V: (f64, f64) = (4.5, 5.5);
/// Below this no source is attached (V)
const VBUS_PRESENT_V: f64 = 1.0;
/// QC 2.0/3.0 request levels on the data lines (V)
const QC_LEVELS_V: [f64; 2] = [0.6, 3.3];

/// Inferred charging protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProtocolLabel {
    #[default]
    Unknown,
    /// Standard downstream port, data lines held low
    #[serde(rename = "SDP")]
    Sdp,
    /// Dedicated charging port, D+ shorted to D−
    #[serde(rename = "DCP")]
    Dcp,
    /// Apple divider, D+ 2.0 V / D− 2.7 V
    Apple1A,
    /// Apple divider, D+ 2.7 V / D− 2.0 V
    Apple2_1A,
    /// Apple divider, D+ 2.7 V / D− 2.7 V
    Apple2_4A,
    /// Samsung divider, D+ ≈ D− ≈ 1.2 V
    Samsung2A,
    /// Qualcomm Quick Charge high-voltage request
    #[serde(rename = "QC")]
    Qc,
    /// USB Power Delivery contract (negotiated over CC)
    #[serde(rename = "PD")]
    Pd,
}

impl ProtocolLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolLabel::Unknown => "Unknown",
            ProtocolLabel::Sdp => "SDP",
            ProtocolLabel::Dcp => "DCP",
            ProtocolLabel::Apple1A => "Apple 1A",
            ProtocolLabel::Apple2_1A => "Apple 2.1A",
            ProtocolLabel::Apple2_4A => "Apple 2.4A",
            ProtocolLabel::Samsung2A => "Samsung 2A",
            ProtocolLabel::Qc => "QC",
            ProtocolLabel::Pd => "PD",
        }
    }
}

impl fmt::Display for ProtocolLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn near(value: f64, nominal: f64) -> bool {
    (value - nominal).abs() <= LEVEL_TOLERANCE_V
}

fn within(value: f64, (lo, hi): (f64, f64)) -> bool {
    value >= lo && value <= hi
}

/// Classify from the data-line voltages alone.
pub fn classify(dplus_v: f64, dminus_v: f64) -> ProtocolLabel {
    if !(dplus_v.is_finite() && dminus_v.is_finite()) {
        return ProtocolLabel::Unknown;
    }

    match (dplus_v, dminus_v) {
        (dp, dm) if near(dp, 2.7) && near(dm, 2.7) => ProtocolLabel::Apple2_4A,
        (dp, dm) if near(dp, 2.7) && near(dm, 2.0) => ProtocolLabel::Apple2_1A,
        (dp, dm) if near(dp, 2.0) && near(dm, 2.7) => ProtocolLabel::Apple1A,
        (dp, dm) if near(dp, 1.2) && near(dm, 1.2) => ProtocolLabel::Samsung2A,
        (dp, dm) if dp < PULLED_DOWN_V && dm < PULLED_DOWN_V => ProtocolLabel::Sdp,
        (dp, dm) if (dp - dm).abs() <= SHORTED_DELTA_V && within(dp, DCP_BAND_V) => {
            ProtocolLabel::Dcp
        }
        _ => ProtocolLabel::Unknown,
    }
}

/// Classify using VBUS as the stronger signal for negotiated protocols.
///
/// Inside the default 5 V window this is [`classify`]. Outside it (with a
/// source present) the supply has negotiated a higher or lower voltage: QC
/// when both data lines sit on QC request levels, PD otherwise. The two
/// overlap in the 5–9 V region, so this is a guess, not a protocol decode.
pub fn classify_with_vbus(dplus_v: f64, dminus_v: f64, vbus_v: f64) -> ProtocolLabel {
    if !vbus_v.is_finite() || vbus_v < VBUS_PRESENT_V {
        return ProtocolLabel::Unknown;
    }
    if within(vbus_v, VBUS_DEFAULT_BAND_V) {
        return classify(dplus_v, dminus_v);
    }

    let on_qc_level = |v: f64| QC_LEVELS_V.iter().any(|&level| near(v, level));
    if on_qc_level(dplus_v) && on_qc_level(dminus_v) {
        ProtocolLabel::Qc
    } else {
        ProtocolLabel::Pd
    }
}

/// Majority vote over the last few labels.
///
/// Ties go to whichever tied label was seen most recently.
#[derive(Debug, Clone)]
pub struct ProtocolVote {
    window: VecDeque<ProtocolLabel>,
    capacity: usize,
}

impl ProtocolVote {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a label and return the current majority
    pub fn push(&mut self, label: ProtocolLabel) -> ProtocolLabel {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(label);
        self.current()
    }

    pub fn current(&self) -> ProtocolLabel {
        let mut best = ProtocolLabel::Unknown;
        let mut best_count = 0;
        // Walk newest first so the most recent label wins ties
        for candidate in self.window.iter().rev() {
            let count = self.window.iter().filter(|l| *l == candidate).count();
            if count > best_count {
                best = *candidate;
                best_count = count;
            }
        }
        best
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
