//! Externally supplied bench constants.
//!
//! Threshold rows and acquisition windows change with every catheter revision,
//! so none of them are hard-wired into the pipeline: the orchestrator and the
//! verdict engine receive a `BenchConfig` at construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bench_interface::{SParameter, SweepScale};
use crate::prelude::{MeasureError, MeasureResult, TestKind};
use crate::processing::routing::ChannelClass;
use crate::processing::spectral::{Smoothing, DEFAULT_CUTOFF_DB};

/// Relative slack applied to both bounds when comparing against limits.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Inclusive `[low, high]` acceptance band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub low: f64,
    pub high: f64,
}

impl Limits {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let low = self.low - self.low.abs() * BOUNDARY_TOLERANCE;
        let high = self.high + self.high.abs() * BOUNDARY_TOLERANCE;
        value >= low && value <= high
    }

    fn validate(&self, name: &str) -> MeasureResult<()> {
        if !self.low.is_finite() || !self.high.is_finite() || self.low > self.high {
            return Err(MeasureError::InvalidConfig(format!(
                "{} limits [{}, {}] are not an ordered pair",
                name, self.low, self.high
            )));
        }
        Ok(())
    }
}

/// Acceptance bands for one pulse-echo acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseEchoLimits {
    pub vpp: Limits,
    pub bandwidth_hz: Limits,
    pub peak_hz: Limits,
}

/// Threshold row for one channel class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub pulse_echo: PulseEchoLimits,
    pub impedance_f: Limits,
    pub dongle_f: Limits,
}

impl ClassThresholds {
    fn validate(&self, class: ChannelClass) -> MeasureResult<()> {
        self.pulse_echo.vpp.validate(&format!("{} vpp", class))?;
        self.pulse_echo
            .bandwidth_hz
            .validate(&format!("{} bandwidth", class))?;
        self.pulse_echo.peak_hz.validate(&format!("{} peak", class))?;
        self.impedance_f.validate(&format!("{} impedance", class))?;
        self.dongle_f.validate(&format!("{} dongle", class))
    }
}

/// Threshold rows for every class plus the class-independent constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    /// Pulse-echo Vpp at or below this means no element answered.
    pub dead_element_vpp: f64,
    /// Capacitance band reported as an open element on the impedance test.
    pub impedance_open_f: Limits,
    /// Capacitance band reported as an open element on the dongle test.
    pub dongle_open_f: Limits,
    pub class32: ClassThresholds,
    pub class64: ClassThresholds,
    pub class96: ClassThresholds,
}

impl ThresholdTable {
    pub fn for_class(&self, class: ChannelClass) -> &ClassThresholds {
        match class {
            ChannelClass::C32 => &self.class32,
            ChannelClass::C64 => &self.class64,
            ChannelClass::C96 => &self.class96,
        }
    }

    pub fn open_band(&self, kind: TestKind) -> Option<&Limits> {
        match kind {
            TestKind::Impedance => Some(&self.impedance_open_f),
            TestKind::Dongle => Some(&self.dongle_open_f),
            TestKind::PulseEcho => None,
        }
    }

    pub fn validate(&self) -> MeasureResult<()> {
        if !(self.dead_element_vpp >= 0.0) {
            return Err(MeasureError::InvalidConfig(format!(
                "dead element floor {} must be non-negative",
                self.dead_element_vpp
            )));
        }
        self.impedance_open_f.validate("impedance open band")?;
        self.dongle_open_f.validate("dongle open band")?;
        for class in ChannelClass::ALL {
            self.for_class(class).validate(class)?;
        }
        Ok(())
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            dead_element_vpp: 0.04,
            impedance_open_f: Limits::new(10e-12, 600e-12),
            dongle_open_f: Limits::new(10e-12, 180e-12),
            class32: ClassThresholds {
                pulse_echo: PulseEchoLimits {
                    vpp: Limits::new(0.06, 1.5),
                    bandwidth_hz: Limits::new(1.5e6, 5.0e6),
                    peak_hz: Limits::new(5.0e6, 9.0e6),
                },
                impedance_f: Limits::new(1.3e-9, 1.6e-9),
                dongle_f: Limits::new(500e-12, 600e-12),
            },
            class64: ClassThresholds {
                pulse_echo: PulseEchoLimits {
                    vpp: Limits::new(0.08, 1.2),
                    bandwidth_hz: Limits::new(1.2e6, 4.0e6),
                    peak_hz: Limits::new(4.5e6, 7.5e6),
                },
                impedance_f: Limits::new(700e-12, 800e-12),
                dongle_f: Limits::new(270e-12, 315e-12),
            },
            class96: ClassThresholds {
                pulse_echo: PulseEchoLimits {
                    vpp: Limits::new(0.05, 1.0),
                    bandwidth_hz: Limits::new(1.0e6, 3.5e6),
                    peak_hz: Limits::new(4.0e6, 7.0e6),
                },
                impedance_f: Limits::new(450e-12, 560e-12),
                dongle_f: Limits::new(180e-12, 230e-12),
            },
        }
    }
}

/// Scope acquisition and spectral reduction settings for the pulse-echo test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseEchoSettings {
    pub scope_channel: u8,
    /// Wait between routing the element and arming the capture.
    pub trigger_delay_ms: u64,
    pub acquisition_start_s: f64,
    pub acquisition_width_s: f64,
    pub fft_start_hz: f64,
    pub fft_width_hz: f64,
    pub cutoff_db: f64,
    pub smoothing: Option<Smoothing>,
}

impl Default for PulseEchoSettings {
    fn default() -> Self {
        Self {
            scope_channel: 1,
            trigger_delay_ms: 5_000,
            acquisition_start_s: 0.0,
            acquisition_width_s: 6.0e-6,
            fft_start_hz: 1.0e6,
            fft_width_hz: 14.0e6,
            cutoff_db: DEFAULT_CUTOFF_DB,
            smoothing: Some(Smoothing {
                order: 2,
                cutoff: 0.2,
            }),
        }
    }
}

impl PulseEchoSettings {
    pub fn validate(&self) -> MeasureResult<()> {
        if !(self.acquisition_width_s > 0.0) || !(self.fft_width_hz > 0.0) {
            return Err(MeasureError::InvalidConfig(
                "pulse-echo window widths must be positive".into(),
            ));
        }
        if let Some(smoothing) = self.smoothing {
            crate::math::ZeroPhaseLowpass::butterworth(smoothing.order, smoothing.cutoff)?;
        }
        Ok(())
    }
}

/// Analyzer sweep used by one capacitance test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub start_hz: f64,
    pub stop_hz: f64,
    pub points: usize,
    pub scale: SweepScale,
    pub parameters: Vec<SParameter>,
    /// Frequency at which the series capacitance is read.
    pub probe_hz: f64,
}

impl SweepSettings {
    pub fn validate(&self, name: &str) -> MeasureResult<()> {
        let ordered = self.start_hz > 0.0 && self.stop_hz > self.start_hz;
        let probe_inside = self.probe_hz >= self.start_hz && self.probe_hz <= self.stop_hz;
        if !ordered || !probe_inside || self.points < 2 {
            return Err(MeasureError::InvalidConfig(format!(
                "{} sweep {}..{} Hz with {} points cannot probe {} Hz",
                name, self.start_hz, self.stop_hz, self.points, self.probe_hz
            )));
        }
        if !self.parameters.contains(&SParameter::S11) {
            return Err(MeasureError::InvalidConfig(format!(
                "{} sweep must request s11",
                name
            )));
        }
        Ok(())
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            start_hz: 1.0e5,
            stop_hz: 1.0e8,
            points: 500,
            scale: SweepScale::Log,
            parameters: vec![SParameter::S11],
            probe_hz: 8.0e5,
        }
    }
}

/// Delays and bounded waits around shared hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub channel_settle_ms: u64,
    pub relay_settle_ms: u64,
    pub acquisition_timeout_ms: u64,
}

impl TimingSettings {
    pub fn channel_settle(&self) -> Duration {
        Duration::from_millis(self.channel_settle_ms)
    }

    pub fn relay_settle(&self) -> Duration {
        Duration::from_millis(self.relay_settle_ms)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            channel_settle_ms: 1_000,
            relay_settle_ms: 10,
            acquisition_timeout_ms: 30_000,
        }
    }
}

/// Everything the measurement pipeline needs that may change between hardware revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub reference_ohms: f64,
    pub thresholds: ThresholdTable,
    pub pulse_echo: PulseEchoSettings,
    pub impedance_sweep: SweepSettings,
    pub dongle_sweep: SweepSettings,
    pub timing: TimingSettings,
}

impl BenchConfig {
    pub fn sweep_for(&self, kind: TestKind) -> Option<&SweepSettings> {
        match kind {
            TestKind::Impedance => Some(&self.impedance_sweep),
            TestKind::Dongle => Some(&self.dongle_sweep),
            TestKind::PulseEcho => None,
        }
    }

    pub fn validate(&self) -> MeasureResult<()> {
        if !(self.reference_ohms > 0.0) {
            return Err(MeasureError::InvalidConfig(format!(
                "reference impedance {} must be positive",
                self.reference_ohms
            )));
        }
        self.thresholds.validate()?;
        self.pulse_echo.validate()?;
        self.impedance_sweep.validate("impedance")?;
        self.dongle_sweep.validate("dongle")
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            reference_ohms: crate::processing::impedance::DEFAULT_REFERENCE_OHMS,
            thresholds: ThresholdTable::default(),
            pulse_echo: PulseEchoSettings::default(),
            impedance_sweep: SweepSettings::default(),
            dongle_sweep: SweepSettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BenchConfig::default().validate().unwrap();
    }

    #[test]
    fn limits_are_inclusive_with_tolerance() {
        let band = Limits::new(700e-12, 800e-12);
        assert!(band.contains(800e-12 * (1.0 + 1e-12)));
        assert!(band.contains(700e-12));
        assert!(!band.contains(801e-12));
        assert!(!band.contains(f64::NAN));
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let mut config = BenchConfig::default();
        config.thresholds.class96.dongle_f = Limits::new(300e-12, 200e-12);
        assert!(matches!(
            config.validate(),
            Err(MeasureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn probe_outside_sweep_is_rejected() {
        let mut config = BenchConfig::default();
        config.dongle_sweep.probe_hz = 5.0e4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: BenchConfig =
            serde_json::from_str(r#"{"thresholds": {"dead_element_vpp": 0.02}}"#).unwrap();
        assert_eq!(config.thresholds.dead_element_vpp, 0.02);
        assert_eq!(config.thresholds.class64, ThresholdTable::default().class64);
        assert_eq!(config.pulse_echo.scope_channel, 1);
    }
}
