use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::prelude::{MeasureError, MeasureResult};

/// One-port reflection measurement at a single swept frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectionPoint {
    pub frequency_hz: f64,
    pub gamma: Complex64,
}

/// Impedance derived from one reflection point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedancePoint {
    pub frequency_hz: f64,
    pub impedance: Complex64,
}

fn check_frequencies(frequencies: impl Iterator<Item = f64>) -> MeasureResult<()> {
    let mut previous: Option<f64> = None;
    for frequency in frequencies {
        if !frequency.is_finite() || frequency < 0.0 {
            return Err(MeasureError::InstrumentUnavailable(format!(
                "sweep contains invalid frequency {}",
                frequency
            )));
        }
        if let Some(last) = previous {
            if frequency <= last {
                return Err(MeasureError::InstrumentUnavailable(format!(
                    "sweep frequencies not increasing at {} Hz",
                    frequency
                )));
            }
        }
        previous = Some(frequency);
    }
    Ok(())
}

/// S11 sweep as returned by the network analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SParameterSweep {
    points: Vec<ReflectionPoint>,
}

impl SParameterSweep {
    pub fn new(points: Vec<ReflectionPoint>) -> MeasureResult<Self> {
        check_frequencies(points.iter().map(|p| p.frequency_hz))?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ReflectionPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Complex impedance versus frequency, one entry per accepted sweep point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceSweep {
    points: Vec<ImpedancePoint>,
}

impl ImpedanceSweep {
    pub fn new(points: Vec<ImpedancePoint>) -> MeasureResult<Self> {
        check_frequencies(points.iter().map(|p| p.frequency_hz))?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ImpedancePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Frequency stepping of the analyzer sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SweepScale {
    Linear,
    Log,
}

impl fmt::Display for SweepScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepScale::Linear => f.write_str("lin"),
            SweepScale::Log => f.write_str("log"),
        }
    }
}

/// Scattering parameter requested from the analyzer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SParameter {
    S11,
    S21,
    S12,
    S22,
}

impl fmt::Display for SParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SParameter::S11 => "s11",
            SParameter::S21 => "s21",
            SParameter::S12 => "s12",
            SParameter::S22 => "s22",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_requires_increasing_frequency() {
        let points = vec![
            ReflectionPoint {
                frequency_hz: 2.0e6,
                gamma: Complex64::new(0.0, 0.0),
            },
            ReflectionPoint {
                frequency_hz: 1.0e6,
                gamma: Complex64::new(0.0, 0.0),
            },
        ];
        assert!(SParameterSweep::new(points).is_err());
    }

    #[test]
    fn scale_formats_for_script() {
        assert_eq!(SweepScale::Log.to_string(), "log");
        assert_eq!(SParameter::S11.to_string(), "s11");
    }
}
