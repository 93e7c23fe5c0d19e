use serde::{Deserialize, Serialize};

use crate::prelude::TestKind;

/// Feature values a verdict was based on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Measurement {
    PulseEcho {
        vpp: f64,
        bandwidth_hz: f64,
        peak_hz: f64,
    },
    Capacitance {
        farads: f64,
    },
}

impl Measurement {
    /// Values in report order.
    pub fn values(&self) -> Vec<f64> {
        match *self {
            Measurement::PulseEcho {
                vpp,
                bandwidth_hz,
                peak_hz,
            } => vec![vpp, bandwidth_hz, peak_hz],
            Measurement::Capacitance { farads } => vec![farads],
        }
    }
}

/// Pass/fail outcome for one (channel, test kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub test_kind: TestKind,
    pub measured: Measurement,
}

impl Verdict {
    pub fn measured_values(&self) -> Vec<f64> {
        self.measured.values()
    }

    /// A pulse-echo verdict with zeroed values means no element answered.
    pub fn is_dead_element(&self) -> bool {
        matches!(
            self.measured,
            Measurement::PulseEcho {
                vpp,
                bandwidth_hz,
                peak_hz,
            } if vpp == 0.0 && bandwidth_hz == 0.0 && peak_hz == 0.0
        )
    }
}

/// Physical state suggested by a capacitance reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementCondition {
    Nominal,
    Open,
    Short,
}
