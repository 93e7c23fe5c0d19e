use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bench_interface::Verdict;
use crate::prelude::TestKind;
use crate::processing::routing::ChannelClass;
use crate::telemetry::RunMetrics;

/// What one requested test produced for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TestOutcome {
    Completed(Verdict),
    /// The test could not be measured; `reason` says why.
    Absent { reason: String },
}

impl TestOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            TestOutcome::Completed(verdict) => Some(verdict),
            TestOutcome::Absent { .. } => None,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict().map(|v| v.passed).unwrap_or(false)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, TestOutcome::Absent { .. })
    }
}

pub type ChannelOutcomes = BTreeMap<TestKind, TestOutcome>;

/// Verdict map for a whole array run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub class: ChannelClass,
    pub channels: BTreeMap<usize, ChannelOutcomes>,
    /// Set when the run stopped before the last channel.
    pub cancelled: bool,
    pub metrics: RunMetrics,
}

impl RunResults {
    /// Wraps a single `run_channel` call as a one-channel run.
    pub fn single(class: ChannelClass, channel: usize, outcomes: ChannelOutcomes) -> Self {
        let mut metrics = RunMetrics::default();
        for outcome in outcomes.values() {
            match outcome {
                TestOutcome::Completed(verdict) if verdict.passed => metrics.passed += 1,
                TestOutcome::Completed(_) => metrics.failed += 1,
                TestOutcome::Absent { .. } => metrics.absent += 1,
            }
        }
        let mut channels = BTreeMap::new();
        channels.insert(channel, outcomes);
        Self {
            class,
            channels,
            cancelled: false,
            metrics,
        }
    }

    pub fn outcome(&self, channel: usize, kind: TestKind) -> Option<&TestOutcome> {
        self.channels.get(&channel)?.get(&kind)
    }

    /// Outcomes of one test kind in channel order.
    pub fn outcomes_for(&self, kind: TestKind) -> impl Iterator<Item = (usize, &TestOutcome)> + '_ {
        self.channels
            .iter()
            .filter_map(move |(&channel, outcomes)| outcomes.get(&kind).map(|o| (channel, o)))
    }

    pub fn absent(&self) -> Vec<(usize, TestKind)> {
        self.channels
            .iter()
            .flat_map(|(&channel, outcomes)| {
                outcomes
                    .iter()
                    .filter(|(_, outcome)| outcome.is_absent())
                    .map(move |(&kind, _)| (channel, kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench_interface::Measurement;

    fn sample() -> RunResults {
        let mut channels = BTreeMap::new();
        let mut first = ChannelOutcomes::new();
        first.insert(
            TestKind::Impedance,
            TestOutcome::Completed(Verdict {
                passed: true,
                test_kind: TestKind::Impedance,
                measured: Measurement::Capacitance { farads: 750e-12 },
            }),
        );
        channels.insert(0, first);
        let mut second = ChannelOutcomes::new();
        second.insert(
            TestKind::Impedance,
            TestOutcome::Absent {
                reason: "instrument unavailable: analyzer timed out".into(),
            },
        );
        channels.insert(1, second);
        RunResults {
            class: ChannelClass::C32,
            channels,
            cancelled: false,
            metrics: RunMetrics::default(),
        }
    }

    #[test]
    fn absent_lists_missing_measurements() {
        let results = sample();
        assert_eq!(results.absent(), vec![(1, TestKind::Impedance)]);
        assert!(results.outcome(0, TestKind::Impedance).unwrap().passed());
        assert!(results.outcome(0, TestKind::Dongle).is_none());
        assert_eq!(results.outcomes_for(TestKind::Impedance).count(), 2);
    }

    #[test]
    fn single_channel_run_tallies_outcomes() {
        let outcomes = sample().channels.remove(&1).unwrap();
        let run = RunResults::single(ChannelClass::C64, 9, outcomes);
        assert_eq!(run.metrics.absent, 1);
        assert_eq!(run.metrics.total(), 1);
        assert!(run.outcome(9, TestKind::Impedance).is_some());
    }

    #[test]
    fn outcomes_serialize_with_status_tag() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["class"], 32);
        assert_eq!(json["channels"]["1"]["impedance"]["status"], "absent");
        assert_eq!(json["channels"]["0"]["impedance"]["status"], "completed");
        assert_eq!(json["channels"]["0"]["impedance"]["measured"]["kind"], "capacitance");
        let back: RunResults = serde_json::from_value(json).unwrap();
        assert_eq!(back.absent(), vec![(1, TestKind::Impedance)]);
    }
}
