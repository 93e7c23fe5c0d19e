use crate::bench_interface::{Measurement, Verdict};
use crate::config::{Limits, ThresholdTable};
use crate::prelude::TestKind;
use crate::processing::routing::ChannelClass;

/// Grades extracted features against the configured threshold rows.
#[derive(Debug, Clone)]
pub struct VerdictEngine {
    thresholds: ThresholdTable,
}

impl VerdictEngine {
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn evaluate_pulse_echo(
        &self,
        vpp: f64,
        bandwidth_hz: f64,
        peak_hz: f64,
        class: ChannelClass,
    ) -> Verdict {
        if vpp <= self.thresholds.dead_element_vpp {
            return Verdict {
                passed: false,
                test_kind: TestKind::PulseEcho,
                measured: Measurement::PulseEcho {
                    vpp: 0.0,
                    bandwidth_hz: 0.0,
                    peak_hz: 0.0,
                },
            };
        }

        let limits = &self.thresholds.for_class(class).pulse_echo;
        let passed = limits.vpp.contains(vpp)
            && limits.bandwidth_hz.contains(bandwidth_hz)
            && limits.peak_hz.contains(peak_hz);

        Verdict {
            passed,
            test_kind: TestKind::PulseEcho,
            measured: Measurement::PulseEcho {
                vpp,
                bandwidth_hz,
                peak_hz,
            },
        }
    }

    pub fn evaluate_impedance(&self, capacitance_f: f64, class: ChannelClass) -> Verdict {
        let band = &self.thresholds.for_class(class).impedance_f;
        Self::capacitance_verdict(TestKind::Impedance, capacitance_f, band)
    }

    pub fn evaluate_dongle(&self, capacitance_f: f64, class: ChannelClass) -> Verdict {
        let band = &self.thresholds.for_class(class).dongle_f;
        Self::capacitance_verdict(TestKind::Dongle, capacitance_f, band)
    }

    fn capacitance_verdict(kind: TestKind, capacitance_f: f64, band: &Limits) -> Verdict {
        Verdict {
            passed: band.contains(capacitance_f),
            test_kind: kind,
            measured: Measurement::Capacitance {
                farads: capacitance_f,
            },
        }
    }
}
