use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bench_interface::sweep::{SParameter, SParameterSweep, SweepScale};
use crate::bench_interface::waveform::Waveform;
use crate::prelude::MeasureResult;
use crate::processing::routing::RelaySelector;

/// Parameters for one analyzer sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub start_hz: f64,
    pub stop_hz: f64,
    pub points: usize,
    pub scale: SweepScale,
    pub parameters: Vec<SParameter>,
    /// Touchstone files are written to `<output_base><parameter>.s1p`.
    pub output_base: PathBuf,
}

impl SweepRequest {
    pub fn output_path(&self, parameter: SParameter) -> PathBuf {
        let mut name = self.output_base.as_os_str().to_owned();
        name.push(format!("{}.s1p", parameter));
        PathBuf::from(name)
    }
}

/// Oscilloscope that captures one pulse-echo trace.
///
/// Implementations must give up once `timeout` elapses and report
/// `MeasureError::InstrumentUnavailable`; the orchestrator has no other
/// bound on the wait.
pub trait Oscilloscope {
    fn capture_waveform(&mut self, scope_channel: u8, timeout: Duration)
        -> MeasureResult<Waveform>;
}

/// Vector network analyzer driven through files on disk.
pub trait NetworkAnalyzer {
    /// Runs a sweep and leaves one Touchstone file per requested parameter.
    ///
    /// Must return `MeasureError::InstrumentUnavailable` once `timeout`
    /// elapses; the orchestrator has no other bound on the wait.
    fn sweep(&mut self, request: &SweepRequest, timeout: Duration) -> MeasureResult<()>;

    fn parse_touchstone(&mut self, path: &Path) -> MeasureResult<SParameterSweep>;
}

/// Serial link to the relay matrix.
pub trait RelayTransport {
    fn write_relay_selector(&mut self, selector: RelaySelector) -> MeasureResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_appends_parameter() {
        let request = SweepRequest {
            start_hz: 1.0e5,
            stop_hz: 1.0e8,
            points: 10,
            scale: SweepScale::Log,
            parameters: vec![SParameter::S11],
            output_base: PathBuf::from("data/run1_ch5_impedance_"),
        };
        assert_eq!(
            request.output_path(SParameter::S11),
            PathBuf::from("data/run1_ch5_impedance_s11.s1p")
        );
    }
}
