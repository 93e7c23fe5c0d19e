use serde::{Deserialize, Serialize};

use crate::bench_interface::Waveform;
use crate::config::PulseEchoSettings;
use crate::math::StatsHelper;
use crate::prelude::{MeasureError, MeasureResult, ProcessingStage};
use crate::processing::spectral::{Band, SpectralFeatureExtractor};
use crate::processing::window::WaveformWindow;
use crate::telemetry::LogManager;

/// Features reduced from one pulse-echo capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseEchoFeatures {
    pub vpp: f64,
    pub band: Band,
}

impl PulseEchoFeatures {
    /// Bandwidth as a percentage of the peak frequency.
    pub fn fractional_bandwidth_pct(&self) -> f64 {
        if self.band.peak_hz > 0.0 {
            100.0 * self.band.bandwidth_hz / self.band.peak_hz
        } else {
            0.0
        }
    }
}

/// Time window, Vpp, spectrum, frequency window, band search.
pub struct PulseEchoStage {
    settings: Option<PulseEchoSettings>,
    logger: LogManager,
}

impl PulseEchoStage {
    pub fn new() -> Self {
        Self {
            settings: None,
            logger: LogManager::new(),
        }
    }
}

impl Default for PulseEchoStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for PulseEchoStage {
    type Config = PulseEchoSettings;
    type Input = Waveform;
    type Output = PulseEchoFeatures;

    fn initialize(&mut self, config: &PulseEchoSettings) -> MeasureResult<()> {
        config.validate()?;
        self.settings = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, wave: Waveform) -> MeasureResult<PulseEchoFeatures> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| MeasureError::InvalidConfig("pulse-echo stage not initialized".into()))?;

        let echo = WaveformWindow::by_time(
            &wave,
            settings.acquisition_start_s,
            settings.acquisition_width_s,
        )?;
        let vpp = StatsHelper::peak_to_peak(echo.voltage()).ok_or_else(|| {
            MeasureError::DegenerateWaveform("acquisition window holds no samples".into())
        })?;

        let spectrum = SpectralFeatureExtractor::extract(&echo)?;
        let in_band =
            WaveformWindow::by_frequency(&spectrum, settings.fft_start_hz, settings.fft_width_hz)?;
        let band =
            SpectralFeatureExtractor::find_band(&in_band, settings.cutoff_db, settings.smoothing)?;

        self.logger.record(&format!(
            "PulseEcho vpp {:.4} V, peak {:.3} MHz, bandwidth {:.3} MHz",
            vpp,
            band.peak_hz * 1e-6,
            band.bandwidth_hz * 1e-6
        ));
        Ok(PulseEchoFeatures { vpp, band })
    }

    fn cleanup(&mut self) {
        self.settings = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Gaussian-enveloped 6 MHz burst whose -6 dB band spans roughly 5..7 MHz.
    fn burst(vpp: f64) -> Waveform {
        let dt = 1.0e-9;
        let center = 2.0e-6;
        let sigma = 187.1e-9;
        let amplitude = vpp / 1.9056;
        let voltage = (0..8000)
            .map(|i| {
                let t = i as f64 * dt - center;
                amplitude * (-t * t / (2.0 * sigma * sigma)).exp() * (2.0 * PI * 6.0e6 * t).cos()
            })
            .collect();
        Waveform::from_samples(0.0, dt, voltage).unwrap()
    }

    #[test]
    fn execute_requires_initialize() {
        let mut stage = PulseEchoStage::new();
        assert!(matches!(
            stage.execute(burst(0.15)),
            Err(MeasureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn burst_features_match_construction() {
        let mut stage = PulseEchoStage::new();
        stage.initialize(&PulseEchoSettings::default()).unwrap();
        let features = stage.execute(burst(0.15)).unwrap();
        assert!((features.vpp - 0.15).abs() < 0.15 * 0.05);
        assert!((features.band.peak_hz - 6.0e6).abs() < 2.0e5);
        assert!((features.band.bandwidth_hz - 2.0e6).abs() < 5.0e5);
        assert!((features.fractional_bandwidth_pct() - 33.3).abs() < 10.0);
    }

    #[test]
    fn short_capture_is_out_of_range() {
        let mut stage = PulseEchoStage::new();
        stage.initialize(&PulseEchoSettings::default()).unwrap();
        let wave = Waveform::from_samples(0.0, 1.0e-9, vec![0.0; 1000]).unwrap();
        assert!(matches!(
            stage.execute(wave),
            Err(MeasureError::WindowOutOfRange { .. })
        ));
    }

    #[test]
    fn cleanup_forgets_settings() {
        let mut stage = PulseEchoStage::new();
        stage.initialize(&PulseEchoSettings::default()).unwrap();
        stage.cleanup();
        assert!(stage.execute(burst(0.15)).is_err());
    }

    #[test]
    fn zero_peak_has_zero_fractional_bandwidth() {
        let features = PulseEchoFeatures {
            vpp: 0.0,
            band: Band {
                lower_hz: 0.0,
                upper_hz: 0.0,
                peak_hz: 0.0,
                bandwidth_hz: 0.0,
            },
        };
        assert_eq!(features.fractional_bandwidth_pct(), 0.0);
    }
}
