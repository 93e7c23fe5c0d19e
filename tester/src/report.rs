use anyhow::Context;
use cathcore::bench_interface::{ElementCondition, Measurement};
use cathcore::config::ThresholdTable;
use cathcore::processing::impedance::classify_capacitance;
use cathcore::{RunResults, TestKind, TestOutcome};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Averages over the channels that passed one test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PassingAverages {
    PulseEcho {
        vpp_mv: f64,
        fractional_bandwidth_pct: f64,
        center_mhz: f64,
    },
    Capacitance {
        capacitance_pf: f64,
    },
}

/// Channel flagged by the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelFlag {
    pub channel: usize,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub test_kind: TestKind,
    pub passed: usize,
    pub failed: usize,
    pub absent: usize,
    pub averages: Option<PassingAverages>,
    pub flags: Vec<ChannelFlag>,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    results: &'a RunResults,
    summary: &'a [TestSummary],
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn summarize_kind(results: &RunResults, kind: TestKind, thresholds: &ThresholdTable) -> TestSummary {
    let mut summary = TestSummary {
        test_kind: kind,
        passed: 0,
        failed: 0,
        absent: 0,
        averages: None,
        flags: Vec::new(),
    };
    let mut vpp = Vec::new();
    let mut fractional = Vec::new();
    let mut center = Vec::new();
    let mut capacitance = Vec::new();

    for (channel, outcome) in results.outcomes_for(kind) {
        let verdict = match outcome {
            TestOutcome::Absent { .. } => {
                summary.absent += 1;
                continue;
            }
            TestOutcome::Completed(verdict) => verdict,
        };
        if verdict.passed {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }

        match verdict.measured {
            Measurement::PulseEcho {
                vpp: v,
                bandwidth_hz,
                peak_hz,
            } => {
                if verdict.is_dead_element() {
                    summary.flags.push(ChannelFlag {
                        channel,
                        condition: "dead".into(),
                    });
                } else if verdict.passed && peak_hz > 0.0 {
                    vpp.push(v * 1e3);
                    fractional.push(100.0 * bandwidth_hz / peak_hz);
                    center.push(peak_hz * 1e-6);
                }
            }
            Measurement::Capacitance { farads } => {
                if verdict.passed {
                    capacitance.push(farads * 1e12);
                }
                let condition = thresholds
                    .open_band(kind)
                    .map(|band| classify_capacitance(farads, band))
                    .unwrap_or(ElementCondition::Nominal);
                if condition != ElementCondition::Nominal {
                    summary.flags.push(ChannelFlag {
                        channel,
                        condition: format!("{:?}", condition).to_lowercase(),
                    });
                }
            }
        }
    }

    summary.averages = match kind {
        TestKind::PulseEcho => match (mean(&vpp), mean(&fractional), mean(&center)) {
            (Some(vpp_mv), Some(fractional_bandwidth_pct), Some(center_mhz)) => {
                Some(PassingAverages::PulseEcho {
                    vpp_mv,
                    fractional_bandwidth_pct,
                    center_mhz,
                })
            }
            _ => None,
        },
        TestKind::Impedance | TestKind::Dongle => {
            mean(&capacitance).map(|capacitance_pf| PassingAverages::Capacitance { capacitance_pf })
        }
    };
    summary
}

/// One summary per test kind that appears in `results`.
pub fn summarize(results: &RunResults, thresholds: &ThresholdTable) -> Vec<TestSummary> {
    TestKind::ALL
        .iter()
        .filter(|&&kind| results.outcomes_for(kind).next().is_some())
        .map(|&kind| summarize_kind(results, kind, thresholds))
        .collect()
}

/// `<base>Report.json`
pub fn report_path(output_base: &Path) -> PathBuf {
    let mut name = output_base.as_os_str().to_owned();
    name.push("Report.json");
    PathBuf::from(name)
}

pub fn write_json(
    results: &RunResults,
    summary: &[TestSummary],
    output_base: &Path,
) -> anyhow::Result<PathBuf> {
    let path = report_path(output_base);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&ReportFile { results, summary })
        .context("serializing run report")?;
    fs::write(&path, json).with_context(|| format!("writing report {}", path.display()))?;
    Ok(path)
}

pub fn render_summary(results: &RunResults, summary: &[TestSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} run over {} channels: {}{}",
        results.class,
        results.channels.len(),
        results.metrics,
        if results.cancelled { " (cancelled)" } else { "" }
    );
    for entry in summary {
        let _ = write!(
            out,
            "  {:<10} pass {:>3}  fail {:>3}  absent {:>3}",
            entry.test_kind.to_string(),
            entry.passed,
            entry.failed,
            entry.absent
        );
        match entry.averages {
            Some(PassingAverages::PulseEcho {
                vpp_mv,
                fractional_bandwidth_pct,
                center_mhz,
            }) => {
                let _ = write!(
                    out,
                    "  avg {:.1} mV, {:.2} % bw, {:.2} MHz",
                    vpp_mv, fractional_bandwidth_pct, center_mhz
                );
            }
            Some(PassingAverages::Capacitance { capacitance_pf }) => {
                let _ = write!(out, "  avg {:.2} pF", capacitance_pf);
            }
            None => {}
        }
        out.push('\n');
        for flag in &entry.flags {
            let _ = writeln!(out, "    channel {:>2}: {}", flag.channel, flag.condition);
        }
    }
    for (channel, kind) in results.absent() {
        let reason = match results.outcome(channel, kind) {
            Some(TestOutcome::Absent { reason }) => reason.as_str(),
            _ => "",
        };
        let _ = writeln!(out, "  absent: channel {} {}: {}", channel, kind, reason);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathcore::bench_interface::Verdict;
    use cathcore::workflow::ChannelOutcomes;
    use cathcore::ChannelClass;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn pulse(passed: bool, vpp: f64, bw: f64, peak: f64) -> TestOutcome {
        TestOutcome::Completed(Verdict {
            passed,
            test_kind: TestKind::PulseEcho,
            measured: Measurement::PulseEcho {
                vpp,
                bandwidth_hz: bw,
                peak_hz: peak,
            },
        })
    }

    fn impedance(passed: bool, farads: f64) -> TestOutcome {
        TestOutcome::Completed(Verdict {
            passed,
            test_kind: TestKind::Impedance,
            measured: Measurement::Capacitance { farads },
        })
    }

    fn results() -> RunResults {
        let rows = vec![
            (pulse(true, 0.2, 2.0e6, 6.0e6), impedance(true, 750e-12)),
            (pulse(true, 0.4, 3.0e6, 6.0e6), impedance(true, 770e-12)),
            (pulse(false, 0.0, 0.0, 0.0), impedance(false, 40e-12)),
            (
                TestOutcome::Absent {
                    reason: "instrument unavailable: scope acquisition".into(),
                },
                impedance(false, -15e-12),
            ),
        ];
        let mut channels = BTreeMap::new();
        for (channel, (pe, z)) in rows.into_iter().enumerate() {
            let mut outcomes = ChannelOutcomes::new();
            outcomes.insert(TestKind::PulseEcho, pe);
            outcomes.insert(TestKind::Impedance, z);
            channels.insert(channel, outcomes);
        }
        RunResults {
            class: ChannelClass::C64,
            channels,
            cancelled: false,
            metrics: Default::default(),
        }
    }

    #[test]
    fn summary_counts_averages_and_flags() {
        let summary = summarize(&results(), &ThresholdTable::default());
        assert_eq!(summary.len(), 2);

        let pe = &summary[0];
        assert_eq!((pe.passed, pe.failed, pe.absent), (2, 1, 1));
        match pe.averages {
            Some(PassingAverages::PulseEcho {
                vpp_mv,
                fractional_bandwidth_pct,
                center_mhz,
            }) => {
                assert!((vpp_mv - 300.0).abs() < 1e-9);
                assert!((fractional_bandwidth_pct - 41.666_666).abs() < 1e-3);
                assert!((center_mhz - 6.0).abs() < 1e-9);
            }
            other => panic!("unexpected averages {:?}", other),
        }
        assert_eq!(
            pe.flags,
            vec![ChannelFlag {
                channel: 2,
                condition: "dead".into()
            }]
        );

        let z = &summary[1];
        assert_eq!(z.test_kind, TestKind::Impedance);
        assert_eq!(
            z.flags.iter().map(|f| f.condition.as_str()).collect::<Vec<_>>(),
            vec!["open", "short"]
        );
        match z.averages {
            Some(PassingAverages::Capacitance { capacitance_pf }) => {
                assert!((capacitance_pf - 760.0).abs() < 1e-6)
            }
            other => panic!("unexpected averages {:?}", other),
        }
    }

    #[test]
    fn report_is_written_next_to_output_base() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("lot9").join("run_");
        let results = results();
        let summary = summarize(&results, &ThresholdTable::default());
        let path = write_json(&results, &summary, &base).unwrap();
        assert_eq!(path, dir.path().join("lot9").join("run_Report.json"));

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["results"]["channels"]["3"]["pulse-echo"]["status"], "absent");
        assert_eq!(json["summary"][1]["flags"][1]["condition"], "short");
    }

    #[test]
    fn rendered_summary_lists_absent_tests() {
        let results = results();
        let summary = summarize(&results, &ThresholdTable::default());
        let text = render_summary(&results, &summary);
        assert!(text.contains("absent: channel 3 pulse-echo"));
        assert!(text.contains("channel  2: dead"));
    }
}
