use cathcore::bench_interface::{
    NetworkAnalyzer, Oscilloscope, RelayTransport, ReflectionPoint, SParameter, SParameterSweep,
    SweepRequest, SweepScale, Waveform,
};
use cathcore::config::{Limits, ThresholdTable};
use cathcore::prelude::Instrument;
use cathcore::processing::impedance::DEFAULT_REFERENCE_OHMS;
use cathcore::{Bench, ChannelClass, ChannelRouter, MeasureError, MeasureResult, RelaySelector, TestKind};
use num_complex::Complex64;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::f64::consts::PI;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::generator::template::tone_burst;
use crate::hal::touchstone;

/// Configuration for the synthetic bench used by `--simulate`.
///
/// Nominal element values sit in the middle of the configured threshold rows
/// for the class under test; `spread` scatters them per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationProfile {
    pub seed: u64,
    /// Fractional per-channel deviation from nominal.
    pub spread: f64,
    pub noise_v: f64,
    pub sample_interval_s: f64,
    pub record_length: usize,
    pub pulse_delay_s: f64,
    /// Channels with no element attached.
    pub dead_channels: Vec<usize>,
    /// What the analyzer reads through a missing element.
    pub open_capacitance_f: f64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            seed: 0,
            spread: 0.03,
            noise_v: 0.002,
            sample_interval_s: 1.0e-9,
            record_length: 8_000,
            pulse_delay_s: 2.0e-6,
            dead_channels: Vec::new(),
            open_capacitance_f: 30e-12,
        }
    }
}

fn midpoint(limits: &Limits) -> f64 {
    0.5 * (limits.low + limits.high)
}

/// Selector most recently written by the simulated relay.
#[derive(Clone, Default)]
pub struct RoutedSelector(Rc<Cell<Option<RelaySelector>>>);

impl RoutedSelector {
    fn set(&self, selector: RelaySelector) {
        self.0.set(Some(selector));
    }

    fn channel(&self, class: ChannelClass, path: Instrument) -> MeasureResult<usize> {
        let selector = self
            .0
            .get()
            .ok_or_else(|| MeasureError::InstrumentUnavailable("no channel routed".into()))?;
        if selector.instrument() != path {
            return Err(MeasureError::InstrumentUnavailable(format!(
                "selector {} does not route the {:?} path",
                selector, path
            )));
        }
        ChannelRouter::channel_for(selector, class).ok_or_else(|| {
            MeasureError::InstrumentUnavailable(format!("selector {} routes no {} channel", selector, class))
        })
    }
}

/// Per-channel deviation in `[-spread, spread]`, stable across captures.
fn channel_factor(seed: u64, channel: usize, salt: u64, spread: f64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed ^ ((channel as u64) << 8) ^ salt);
    if spread > 0.0 {
        1.0 + rng.gen_range(-spread..spread)
    } else {
        1.0
    }
}

pub struct SimulatedRelay {
    routed: RoutedSelector,
    pub writes: Vec<RelaySelector>,
}

impl RelayTransport for SimulatedRelay {
    fn write_relay_selector(&mut self, selector: RelaySelector) -> MeasureResult<()> {
        self.routed.set(selector);
        self.writes.push(selector);
        Ok(())
    }
}

pub struct SimulatedScope {
    profile: SimulationProfile,
    class: ChannelClass,
    vpp: f64,
    center_hz: f64,
    bandwidth_hz: f64,
    routed: RoutedSelector,
    rng: StdRng,
}

impl Oscilloscope for SimulatedScope {
    fn capture_waveform(&mut self, _scope_channel: u8, _timeout: Duration) -> MeasureResult<Waveform> {
        let channel = self.routed.channel(self.class, Instrument::Scope)?;
        let profile = &self.profile;
        let mut voltage = if profile.dead_channels.contains(&channel) {
            vec![0.0; profile.record_length]
        } else {
            tone_burst(
                profile.record_length,
                profile.sample_interval_s,
                profile.pulse_delay_s,
                self.center_hz * channel_factor(profile.seed, channel, 1, profile.spread),
                self.bandwidth_hz,
                self.vpp * channel_factor(profile.seed, channel, 2, profile.spread),
            )
        };
        if profile.noise_v > 0.0 {
            for sample in voltage.iter_mut() {
                *sample += self.rng.gen_range(-profile.noise_v..profile.noise_v);
            }
        }
        Waveform::from_samples(0.0, profile.sample_interval_s, voltage)
    }
}

pub struct SimulatedAnalyzer {
    profile: SimulationProfile,
    class: ChannelClass,
    impedance_f: f64,
    dongle_f: f64,
    routed: RoutedSelector,
}

impl SimulatedAnalyzer {
    fn capacitance_for(&self, channel: usize, request: &SweepRequest) -> f64 {
        if self.profile.dead_channels.contains(&channel) {
            return self.profile.open_capacitance_f;
        }
        // Per-test file bases end in `_<kind>_`.
        let dongle_suffix = format!("_{}_", TestKind::Dongle);
        let nominal = if request
            .output_base
            .to_string_lossy()
            .ends_with(&dongle_suffix)
        {
            self.dongle_f
        } else {
            self.impedance_f
        };
        nominal * channel_factor(self.profile.seed, channel, 3, self.profile.spread)
    }
}

fn sweep_frequencies(request: &SweepRequest) -> Vec<f64> {
    let steps = request.points.saturating_sub(1).max(1) as f64;
    (0..request.points)
        .map(|i| {
            let x = i as f64 / steps;
            match request.scale {
                SweepScale::Linear => request.start_hz + x * (request.stop_hz - request.start_hz),
                SweepScale::Log => request.start_hz * (request.stop_hz / request.start_hz).powf(x),
            }
        })
        .collect()
}

impl NetworkAnalyzer for SimulatedAnalyzer {
    fn sweep(&mut self, request: &SweepRequest, _timeout: Duration) -> MeasureResult<()> {
        let channel = self.routed.channel(self.class, Instrument::Vna)?;
        let capacitance = self.capacitance_for(channel, request);
        let z0 = Complex64::new(DEFAULT_REFERENCE_OHMS, 0.0);
        let points = sweep_frequencies(request)
            .into_iter()
            .map(|f| {
                let z = Complex64::new(0.0, -1.0 / (2.0 * PI * f * capacitance));
                ReflectionPoint {
                    frequency_hz: f,
                    gamma: (z - z0) / (z + z0),
                }
            })
            .collect();
        let sweep = SParameterSweep::new(points)?;
        for parameter in &request.parameters {
            // Only reflection is modelled; every requested file carries S11.
            touchstone::write(&request.output_path(*parameter), &sweep, DEFAULT_REFERENCE_OHMS)?;
        }
        if !request.parameters.contains(&SParameter::S11) {
            return Err(MeasureError::InstrumentUnavailable(
                "simulated analyzer only produces s11".into(),
            ));
        }
        Ok(())
    }

    fn parse_touchstone(&mut self, path: &Path) -> MeasureResult<SParameterSweep> {
        touchstone::read(path).map(|data| data.sweep)
    }
}

pub type SimulatedBench = Bench<SimulatedScope, SimulatedAnalyzer, SimulatedRelay>;

/// Builds a synthetic bench whose nominal elements pass `thresholds` for `class`.
pub fn simulated_bench(
    profile: &SimulationProfile,
    class: ChannelClass,
    thresholds: &ThresholdTable,
) -> SimulatedBench {
    let routed = RoutedSelector::default();
    let row = thresholds.for_class(class);
    SimulatedBench {
        scope: SimulatedScope {
            profile: profile.clone(),
            class,
            vpp: midpoint(&row.pulse_echo.vpp),
            center_hz: midpoint(&row.pulse_echo.peak_hz),
            bandwidth_hz: midpoint(&row.pulse_echo.bandwidth_hz),
            routed: routed.clone(),
            rng: StdRng::seed_from_u64(profile.seed),
        },
        analyzer: SimulatedAnalyzer {
            profile: profile.clone(),
            class,
            impedance_f: midpoint(&row.impedance_f),
            dongle_f: midpoint(&row.dongle_f),
            routed: routed.clone(),
        },
        relay: SimulatedRelay {
            routed,
            writes: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn route(bench: &mut SimulatedBench, channel: usize, class: ChannelClass, path: Instrument) {
        let selector = ChannelRouter::resolve(channel, class, path).unwrap();
        bench.relay.write_relay_selector(selector).unwrap();
    }

    #[test]
    fn scope_requires_scope_path() {
        let class = ChannelClass::C64;
        let mut bench = simulated_bench(&SimulationProfile::default(), class, &ThresholdTable::default());
        assert!(bench.scope.capture_waveform(1, Duration::ZERO).is_err());
        route(&mut bench, 5, class, Instrument::Vna);
        assert!(bench.scope.capture_waveform(1, Duration::ZERO).is_err());
        route(&mut bench, 5, class, Instrument::Scope);
        let wave = bench.scope.capture_waveform(1, Duration::ZERO).unwrap();
        assert_eq!(wave.len(), 8_000);
    }

    #[test]
    fn dead_channel_is_flat_noise() {
        let class = ChannelClass::C32;
        let profile = SimulationProfile {
            dead_channels: vec![4],
            ..SimulationProfile::default()
        };
        let mut bench = simulated_bench(&profile, class, &ThresholdTable::default());
        route(&mut bench, 4, class, Instrument::Scope);
        let wave = bench.scope.capture_waveform(1, Duration::ZERO).unwrap();
        let peak = wave.voltage().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak <= profile.noise_v);
    }

    #[test]
    fn analyzer_writes_a_readable_capacitor_sweep() {
        let dir = tempdir().unwrap();
        let class = ChannelClass::C64;
        let profile = SimulationProfile {
            spread: 0.0,
            ..SimulationProfile::default()
        };
        let mut bench = simulated_bench(&profile, class, &ThresholdTable::default());
        route(&mut bench, 9, class, Instrument::Vna);
        let request = SweepRequest {
            start_hz: 1.0e5,
            stop_hz: 1.0e8,
            points: 50,
            scale: SweepScale::Log,
            parameters: vec![SParameter::S11],
            output_base: dir.path().join("ch9_dongle_"),
        };
        bench.analyzer.sweep(&request, Duration::ZERO).unwrap();
        let sweep = bench
            .analyzer
            .parse_touchstone(&request.output_path(SParameter::S11))
            .unwrap();
        assert_eq!(sweep.len(), 50);
        assert!((sweep.points()[0].frequency_hz - 1.0e5).abs() < 1.0);
        assert!((sweep.points()[49].frequency_hz - 1.0e8).abs() < 1.0e3);
    }

    #[test]
    fn channel_factor_is_stable_and_bounded() {
        let a = channel_factor(7, 12, 1, 0.05);
        assert_eq!(a, channel_factor(7, 12, 1, 0.05));
        assert!((0.95..=1.05).contains(&a));
        assert_eq!(channel_factor(7, 12, 1, 0.0), 1.0);
    }
}
