use serde::{Deserialize, Serialize};

use crate::bench_interface::SParameterSweep;
use crate::prelude::{MeasureError, MeasureResult, ProcessingStage};
use crate::processing::impedance::{ImpedanceConverter, DEFAULT_REFERENCE_OHMS};
use crate::telemetry::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacitanceSettings {
    pub reference_ohms: f64,
    pub probe_hz: f64,
}

impl Default for CapacitanceSettings {
    fn default() -> Self {
        Self {
            reference_ohms: DEFAULT_REFERENCE_OHMS,
            probe_hz: 8.0e5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacitanceReading {
    pub farads: f64,
    pub probe_hz: f64,
    /// Sweep points dropped because their reflection was singular.
    pub excluded_points: usize,
}

/// S11 sweep to series capacitance at the probe frequency.
pub struct CapacitanceStage {
    settings: Option<CapacitanceSettings>,
    logger: LogManager,
}

impl CapacitanceStage {
    pub fn new() -> Self {
        Self {
            settings: None,
            logger: LogManager::new(),
        }
    }
}

impl Default for CapacitanceStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for CapacitanceStage {
    type Config = CapacitanceSettings;
    type Input = SParameterSweep;
    type Output = CapacitanceReading;

    fn initialize(&mut self, config: &CapacitanceSettings) -> MeasureResult<()> {
        if !(config.reference_ohms > 0.0) || !(config.probe_hz > 0.0) {
            return Err(MeasureError::InvalidConfig(format!(
                "reference {} ohm and probe {} Hz must be positive",
                config.reference_ohms, config.probe_hz
            )));
        }
        self.settings = Some(*config);
        Ok(())
    }

    fn execute(&mut self, sweep: SParameterSweep) -> MeasureResult<CapacitanceReading> {
        let settings = self
            .settings
            .ok_or_else(|| MeasureError::InvalidConfig("capacitance stage not initialized".into()))?;

        let (impedance, excluded) =
            ImpedanceConverter::to_impedance_excluding(&sweep, settings.reference_ohms)?;
        for point in &excluded {
            self.logger.caution(&format!(
                "excluding sweep point at {:.0} Hz: {}",
                point.frequency_hz, point.reason
            ));
        }

        let farads = ImpedanceConverter::capacitance_at(&impedance, settings.probe_hz)?;
        self.logger.record(&format!(
            "Capacitance {:.2} pF at {:.0} kHz",
            farads * 1e12,
            settings.probe_hz * 1e-3
        ));
        Ok(CapacitanceReading {
            farads,
            probe_hz: settings.probe_hz,
            excluded_points: excluded.len(),
        })
    }

    fn cleanup(&mut self) {
        self.settings = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench_interface::ReflectionPoint;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    fn capacitor(capacitance: f64, freqs: &[f64]) -> Vec<ReflectionPoint> {
        freqs
            .iter()
            .map(|&f| {
                let z = Complex64::new(0.0, -1.0 / (2.0 * PI * f * capacitance));
                ReflectionPoint {
                    frequency_hz: f,
                    gamma: (z - 50.0) / (z + 50.0),
                }
            })
            .collect()
    }

    #[test]
    fn reads_capacitance_and_skips_singular_points() {
        let mut points = capacitor(800e-12, &[6.0e5, 7.0e5, 8.0e5, 9.0e5]);
        points[0].gamma = Complex64::new(1.0, 0.0);
        let mut stage = CapacitanceStage::new();
        stage.initialize(&CapacitanceSettings::default()).unwrap();
        let reading = stage.execute(SParameterSweep::new(points).unwrap()).unwrap();
        assert!((reading.farads - 800e-12).abs() < 1e-15);
        assert_eq!(reading.excluded_points, 1);
    }

    #[test]
    fn probe_outside_sweep_is_not_swept() {
        let mut stage = CapacitanceStage::new();
        stage
            .initialize(&CapacitanceSettings {
                reference_ohms: 50.0,
                probe_hz: 5.0e6,
            })
            .unwrap();
        let sweep = SParameterSweep::new(capacitor(800e-12, &[7.0e5, 8.0e5, 9.0e5])).unwrap();
        assert!(matches!(
            stage.execute(sweep),
            Err(MeasureError::FrequencyNotSwept { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_reference() {
        let mut stage = CapacitanceStage::new();
        let err = stage
            .initialize(&CapacitanceSettings {
                reference_ohms: 0.0,
                probe_hz: 8.0e5,
            })
            .unwrap_err();
        assert!(!err.is_recoverable());
    }
}
