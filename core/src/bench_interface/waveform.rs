use serde::{Deserialize, Serialize};

use crate::prelude::{MeasureError, MeasureResult};

/// Relative jitter tolerated between consecutive sample intervals.
const UNIFORM_TOLERANCE: f64 = 1e-3;

fn validate_axis(axis: &[f64], values: usize, name: &str) -> MeasureResult<()> {
    if axis.len() != values {
        return Err(MeasureError::DegenerateWaveform(format!(
            "{} axis has {} samples but {} values",
            name,
            axis.len(),
            values
        )));
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(MeasureError::DegenerateWaveform(format!(
            "{} axis contains a non-finite sample",
            name
        )));
    }
    if axis.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(MeasureError::DegenerateWaveform(format!(
            "{} axis is not strictly increasing",
            name
        )));
    }
    if axis.len() > 2 {
        let step = axis[1] - axis[0];
        let uneven = axis
            .windows(2)
            .any(|pair| ((pair[1] - pair[0]) - step).abs() > step * UNIFORM_TOLERANCE);
        if uneven {
            return Err(MeasureError::DegenerateWaveform(format!(
                "{} axis is not uniformly spaced",
                name
            )));
        }
    }
    Ok(())
}

fn validate_values(values: &[f64], name: &str) -> MeasureResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(MeasureError::DegenerateWaveform(format!(
            "{} sample {} is not finite",
            name, idx
        ))),
        None => Ok(()),
    }
}

fn uniform_step(axis: &[f64]) -> MeasureResult<f64> {
    if axis.len() < 2 {
        return Err(MeasureError::DegenerateWaveform(format!(
            "need at least 2 samples, got {}",
            axis.len()
        )));
    }
    Ok(axis[1] - axis[0])
}

/// Uniformly sampled time/voltage trace captured from the oscilloscope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    time: Vec<f64>,
    voltage: Vec<f64>,
}

impl Waveform {
    pub fn new(time: Vec<f64>, voltage: Vec<f64>) -> MeasureResult<Self> {
        validate_axis(&time, voltage.len(), "time")?;
        validate_values(&voltage, "voltage")?;
        Ok(Self { time, voltage })
    }

    /// Builds a trace from a start time, a fixed interval and the sampled voltages.
    pub fn from_samples(start: f64, interval: f64, voltage: Vec<f64>) -> MeasureResult<Self> {
        let time = (0..voltage.len())
            .map(|i| start + i as f64 * interval)
            .collect();
        Self::new(time, voltage)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn sample_interval(&self) -> MeasureResult<f64> {
        uniform_step(&self.time)
    }

    /// Time spanned by the samples, counting one interval per sample.
    pub fn duration(&self) -> MeasureResult<f64> {
        Ok(self.sample_interval()? * self.len() as f64)
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            time: self.time[start..end].to_vec(),
            voltage: self.voltage[start..end].to_vec(),
        }
    }
}

/// Magnitude spectrum on a uniform frequency grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    frequency: Vec<f64>,
    amplitude: Vec<f64>,
}

impl Spectrum {
    pub fn new(frequency: Vec<f64>, amplitude: Vec<f64>) -> MeasureResult<Self> {
        validate_axis(&frequency, amplitude.len(), "frequency")?;
        validate_values(&amplitude, "amplitude")?;
        Ok(Self {
            frequency,
            amplitude,
        })
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    pub fn bin_width(&self) -> MeasureResult<f64> {
        uniform_step(&self.frequency)
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            frequency: self.frequency[start..end].to_vec(),
            amplitude: self.amplitude[start..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_rejects_mismatched_lengths() {
        let err = Waveform::new(vec![0.0, 1.0], vec![0.0]).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateWaveform(_)));
    }

    #[test]
    fn waveform_rejects_non_monotonic_time() {
        assert!(Waveform::new(vec![0.0, 2.0, 1.0], vec![0.0; 3]).is_err());
    }

    #[test]
    fn waveform_rejects_uneven_spacing() {
        assert!(Waveform::new(vec![0.0, 1.0, 2.0, 3.5], vec![0.0; 4]).is_err());
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let err = Waveform::from_samples(0.0, 1e-9, vec![0.1, f64::NAN, -0.1]).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateWaveform(ref msg) if msg.contains("sample 1")));
        assert!(Spectrum::new(vec![0.0, 1.0, 2.0], vec![1.0, f64::INFINITY, 0.5]).is_err());
    }

    #[test]
    fn duration_counts_every_sample() {
        let wave = Waveform::from_samples(0.0, 1e-9, vec![0.0; 10]).unwrap();
        assert!((wave.duration().unwrap() - 10e-9).abs() < 1e-18);
    }

    #[test]
    fn single_sample_has_no_interval() {
        let wave = Waveform::from_samples(0.0, 1e-9, vec![0.0]).unwrap();
        assert!(matches!(
            wave.sample_interval(),
            Err(MeasureError::DegenerateWaveform(_))
        ));
    }
}
