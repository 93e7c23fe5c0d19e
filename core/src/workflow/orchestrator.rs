use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::bench_interface::{
    NetworkAnalyzer, Oscilloscope, RelayTransport, SParameter, SweepRequest, Verdict,
};
use crate::config::BenchConfig;
use crate::prelude::{Instrument, MeasureError, MeasureResult, ProcessingStage, TestKind};
use crate::processing::capacitance::{CapacitanceSettings, CapacitanceStage};
use crate::processing::pulse_echo::PulseEchoStage;
use crate::processing::routing::{ChannelClass, ChannelRouter, RelaySelector};
use crate::processing::verdict::VerdictEngine;
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::workflow::cancel::CancellationToken;
use crate::workflow::results::{ChannelOutcomes, RunResults, TestOutcome};

/// The instruments and relay link one orchestrator drives.
pub struct Bench<S, V, R> {
    pub scope: S,
    pub analyzer: V,
    pub relay: R,
}

/// Runs requested tests channel by channel over shared bench hardware.
///
/// Every hardware call goes through `&mut self`, so only one channel is ever
/// routed at a time.
pub struct TestOrchestrator<S, V, R> {
    config: BenchConfig,
    verdicts: VerdictEngine,
    bench: Bench<S, V, R>,
    pulse_echo: PulseEchoStage,
    capacitance: CapacitanceStage,
    active_selector: Option<RelaySelector>,
    results: BTreeMap<usize, ChannelOutcomes>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl<S, V, R> TestOrchestrator<S, V, R>
where
    S: Oscilloscope,
    V: NetworkAnalyzer,
    R: RelayTransport,
{
    pub fn new(config: BenchConfig, bench: Bench<S, V, R>) -> MeasureResult<Self> {
        config.validate()?;
        Ok(Self {
            verdicts: VerdictEngine::new(config.thresholds.clone()),
            config,
            bench,
            pulse_echo: PulseEchoStage::new(),
            capacitance: CapacitanceStage::new(),
            active_selector: None,
            results: BTreeMap::new(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new(),
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn bench(&self) -> &Bench<S, V, R> {
        &self.bench
    }

    pub fn into_bench(self) -> Bench<S, V, R> {
        self.bench
    }

    /// Selector most recently written to the relay board.
    pub fn active_selector(&self) -> Option<RelaySelector> {
        self.active_selector
    }

    /// Outcomes accumulated since the last `run_all` started.
    pub fn results(&self) -> &BTreeMap<usize, ChannelOutcomes> {
        &self.results
    }

    /// Runs `tests` on one channel in PulseEcho, Impedance, Dongle order.
    ///
    /// Only `InvalidChannel` and `InvalidConfig` stop the call; any other
    /// failure becomes an absent outcome for that test.
    pub fn run_channel(
        &mut self,
        channel: usize,
        class: ChannelClass,
        tests: &BTreeSet<TestKind>,
        filename_base: &Path,
    ) -> MeasureResult<ChannelOutcomes> {
        ChannelRouter::resolve(channel, class, Instrument::Vna)?;

        let mut outcomes = ChannelOutcomes::new();
        for &kind in tests {
            let outcome = match self.run_test(channel, class, kind, filename_base) {
                Ok(verdict) => {
                    self.metrics.record_verdict(verdict.passed);
                    TestOutcome::Completed(verdict)
                }
                Err(err) if err.is_recoverable() => {
                    self.logger.caution(&format!(
                        "channel {} {} absent: {}",
                        channel, kind, err
                    ));
                    self.metrics.record_absent();
                    TestOutcome::Absent {
                        reason: err.to_string(),
                    }
                }
                Err(err) => return Err(err),
            };
            outcomes.insert(kind, outcome);
        }

        // Kinds not requested this time keep their earlier outcome.
        self.results
            .entry(channel)
            .or_default()
            .extend(outcomes.iter().map(|(kind, outcome)| (*kind, outcome.clone())));
        Ok(outcomes)
    }

    /// Runs every channel of `class` in ascending order.
    ///
    /// Cancellation is honoured between channels only.
    pub fn run_all(
        &mut self,
        class: ChannelClass,
        tests: &BTreeSet<TestKind>,
        filename_base: &Path,
        cancel: &CancellationToken,
    ) -> MeasureResult<RunResults> {
        self.results.clear();
        self.metrics.reset();
        let mut cancelled = false;

        for channel in class.channels() {
            if cancel.is_cancelled() {
                self.logger.caution(&format!(
                    "run cancelled before channel {} of {}",
                    channel,
                    class.size()
                ));
                cancelled = true;
                break;
            }
            if channel > 0 {
                settle(self.config.timing.channel_settle());
            }
            self.run_channel(channel, class, tests, filename_base)?;
        }

        let metrics = self.metrics.snapshot();
        self.logger
            .record(&format!("{} run finished: {}", class, metrics));
        Ok(RunResults {
            class,
            channels: self.results.clone(),
            cancelled,
            metrics,
        })
    }

    fn run_test(
        &mut self,
        channel: usize,
        class: ChannelClass,
        kind: TestKind,
        filename_base: &Path,
    ) -> MeasureResult<Verdict> {
        let selector = ChannelRouter::resolve(channel, class, kind.instrument())?;
        self.route(selector)?;

        match kind {
            TestKind::PulseEcho => self.pulse_echo_test(class),
            TestKind::Impedance | TestKind::Dongle => {
                self.capacitance_test(channel, class, kind, filename_base)
            }
        }
    }

    fn route(&mut self, selector: RelaySelector) -> MeasureResult<()> {
        self.bench.relay.write_relay_selector(selector)?;
        self.active_selector = Some(selector);
        settle(self.config.timing.relay_settle());
        Ok(())
    }

    fn pulse_echo_test(&mut self, class: ChannelClass) -> MeasureResult<Verdict> {
        let settings = &self.config.pulse_echo;
        settle(Duration::from_millis(settings.trigger_delay_ms));

        let wave = self
            .bench
            .scope
            .capture_waveform(settings.scope_channel, self.config.timing.acquisition_timeout())?;
        let features = run_stage(&mut self.pulse_echo, settings, wave)?;
        Ok(self.verdicts.evaluate_pulse_echo(
            features.vpp,
            features.band.bandwidth_hz,
            features.band.peak_hz,
            class,
        ))
    }

    fn capacitance_test(
        &mut self,
        channel: usize,
        class: ChannelClass,
        kind: TestKind,
        filename_base: &Path,
    ) -> MeasureResult<Verdict> {
        let sweep = self.config.sweep_for(kind).ok_or_else(|| {
            MeasureError::InvalidConfig(format!("no sweep configured for {}", kind))
        })?;
        let request = SweepRequest {
            start_hz: sweep.start_hz,
            stop_hz: sweep.stop_hz,
            points: sweep.points,
            scale: sweep.scale,
            parameters: sweep.parameters.clone(),
            output_base: test_file_base(filename_base, channel, kind),
        };
        let stage_settings = CapacitanceSettings {
            reference_ohms: self.config.reference_ohms,
            probe_hz: sweep.probe_hz,
        };

        self.bench
            .analyzer
            .sweep(&request, self.config.timing.acquisition_timeout())?;
        let s11 = self
            .bench
            .analyzer
            .parse_touchstone(&request.output_path(SParameter::S11))?;
        let reading = run_stage(&mut self.capacitance, &stage_settings, s11)?;

        Ok(match kind {
            TestKind::Dongle => self.verdicts.evaluate_dongle(reading.farads, class),
            _ => self.verdicts.evaluate_impedance(reading.farads, class),
        })
    }
}

/// `<base>ch<channel>_<kind>_`, the prefix handed to the analyzer for one test.
pub fn test_file_base(filename_base: &Path, channel: usize, kind: TestKind) -> PathBuf {
    let mut name = filename_base.as_os_str().to_owned();
    name.push(format!("ch{}_{}_", channel, kind));
    PathBuf::from(name)
}

fn run_stage<P: ProcessingStage>(
    stage: &mut P,
    config: &P::Config,
    input: P::Input,
) -> MeasureResult<P::Output> {
    stage.initialize(config)?;
    let output = stage.execute(input);
    stage.cleanup();
    output
}

fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
