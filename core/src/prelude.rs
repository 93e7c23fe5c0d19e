use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::processing::routing::ChannelClass;

/// Which measurement a channel is put through.
///
/// Variant order is the order tests run within a single channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    PulseEcho,
    Impedance,
    Dongle,
}

impl TestKind {
    pub const ALL: [TestKind; 3] = [TestKind::PulseEcho, TestKind::Impedance, TestKind::Dongle];

    /// Signal path the relay bank must select before this test runs.
    pub fn instrument(self) -> Instrument {
        match self {
            TestKind::PulseEcho => Instrument::Scope,
            TestKind::Impedance | TestKind::Dongle => Instrument::Vna,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestKind::PulseEcho => "pulse-echo",
            TestKind::Impedance => "impedance",
            TestKind::Dongle => "dongle",
        };
        f.write_str(name)
    }
}

impl FromStr for TestKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pulse-echo" | "pulseecho" | "pe" => Ok(TestKind::PulseEcho),
            "impedance" | "z" => Ok(TestKind::Impedance),
            "dongle" => Ok(TestKind::Dongle),
            other => Err(format!("unknown test kind '{}'", other)),
        }
    }
}

/// Instrument attached to the relay bank's common port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Instrument {
    Vna,
    Scope,
}

/// Common error type for every measurement operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("channel {channel} is outside the {class} array")]
    InvalidChannel { channel: usize, class: ChannelClass },
    #[error("degenerate waveform: {0}")]
    DegenerateWaveform(String),
    #[error("window [{start}, {end}) falls outside the {available} available samples")]
    WindowOutOfRange {
        start: i64,
        end: i64,
        available: usize,
    },
    #[error("reflection coefficient is 1 at {frequency_hz} Hz")]
    SingularReflection { frequency_hz: f64 },
    #[error("no sweep point within one bin of {target_hz} Hz")]
    FrequencyNotSwept { target_hz: f64 },
    #[error("impedance at {frequency_hz} Hz has no reactance")]
    ZeroReactance { frequency_hz: f64 },
    #[error("instrument unavailable: {0}")]
    InstrumentUnavailable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MeasureError {
    /// True when the failure only costs the current test, not the whole call.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MeasureError::InvalidChannel { .. } | MeasureError::InvalidConfig(_)
        )
    }
}

pub type MeasureResult<T> = Result<T, MeasureError>;

/// Trait describing one reduction step of the measurement pipeline.
pub trait ProcessingStage {
    type Config;
    type Input;
    type Output;

    fn initialize(&mut self, config: &Self::Config) -> MeasureResult<()>;
    fn execute(&mut self, input: Self::Input) -> MeasureResult<Self::Output>;
    fn cleanup(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_cli_spellings() {
        assert_eq!("pulse-echo".parse::<TestKind>().unwrap(), TestKind::PulseEcho);
        assert_eq!("Impedance".parse::<TestKind>().unwrap(), TestKind::Impedance);
        assert!("resistance".parse::<TestKind>().is_err());
    }

    #[test]
    fn vna_tests_route_to_analyzer_path() {
        assert_eq!(TestKind::Impedance.instrument(), Instrument::Vna);
        assert_eq!(TestKind::Dongle.instrument(), Instrument::Vna);
        assert_eq!(TestKind::PulseEcho.instrument(), Instrument::Scope);
    }

    #[test]
    fn channel_errors_are_not_recoverable() {
        let err = MeasureError::InvalidChannel {
            channel: 70,
            class: ChannelClass::C64,
        };
        assert!(!err.is_recoverable());
        assert!(MeasureError::FrequencyNotSwept { target_hz: 1.0 }.is_recoverable());
    }
}
