use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<RunMetrics>,
}

/// Outcome tallies for one orchestrated run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub passed: usize,
    pub failed: usize,
    pub absent: usize,
}

impl RunMetrics {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.absent
    }
}

impl fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} absent",
            self.passed, self.failed, self.absent
        )
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunMetrics::default()),
        }
    }

    pub fn record_verdict(&self, passed: bool) {
        if let Ok(mut metrics) = self.inner.lock() {
            if passed {
                metrics.passed += 1;
            } else {
                metrics.failed += 1;
            }
        }
    }

    pub fn record_absent(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.absent += 1;
        }
    }

    pub fn reset(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            *metrics = RunMetrics::default();
        }
    }

    pub fn snapshot(&self) -> RunMetrics {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_each_outcome() {
        let recorder = MetricsRecorder::new();
        recorder.record_verdict(true);
        recorder.record_verdict(false);
        recorder.record_verdict(true);
        recorder.record_absent();
        let snapshot = recorder.snapshot();
        assert_eq!(
            snapshot,
            RunMetrics {
                passed: 2,
                failed: 1,
                absent: 1
            }
        );
        assert_eq!(snapshot.total(), 4);

        recorder.reset();
        assert_eq!(recorder.snapshot().total(), 0);
    }
}
