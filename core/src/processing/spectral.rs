use serde::{Deserialize, Serialize};

use crate::bench_interface::{Spectrum, Waveform};
use crate::math::{FftHelper, StatsHelper, ZeroPhaseLowpass};
use crate::prelude::{MeasureError, MeasureResult};

pub const DEFAULT_CUTOFF_DB: f64 = -6.0;

/// Floor applied to dB values so empty bins stay finite.
const DB_FLOOR: f64 = -300.0;

/// Low-pass applied to the dB spectrum before searching for band edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Smoothing {
    pub order: usize,
    /// Normalized to Nyquist of the bin index axis.
    pub cutoff: f64,
}

/// Band found around the spectral peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower_hz: f64,
    pub upper_hz: f64,
    pub peak_hz: f64,
    pub bandwidth_hz: f64,
}

pub struct SpectralFeatureExtractor;

impl SpectralFeatureExtractor {
    /// Real-input FFT magnitude spectrum of `wave`.
    pub fn extract(wave: &Waveform) -> MeasureResult<Spectrum> {
        let interval = wave.sample_interval()?;
        let helper = FftHelper::new(wave.len());
        let amplitude = helper.real_magnitudes(wave.voltage());
        let frequency = FftHelper::real_frequencies(wave.len(), interval);
        Spectrum::new(frequency, amplitude)
    }

    /// Amplitudes in dB relative to the spectrum's own maximum.
    pub fn relative_db(spec: &Spectrum) -> Vec<f64> {
        let peak = StatsHelper::max(spec.amplitude()).unwrap_or(0.0);
        if !(peak > 0.0) || !peak.is_finite() {
            return vec![0.0; spec.len()];
        }
        spec.amplitude()
            .iter()
            .map(|&amp| (20.0 * (amp / peak).log10()).max(DB_FLOOR))
            .collect()
    }

    pub fn find_band(
        spec: &Spectrum,
        cutoff_db: f64,
        smoothing: Option<Smoothing>,
    ) -> MeasureResult<Band> {
        if spec.is_empty() {
            return Err(MeasureError::DegenerateWaveform(
                "cannot search an empty spectrum".into(),
            ));
        }

        let mut db = Self::relative_db(spec);
        if let Some(smoothing) = smoothing {
            let filter = ZeroPhaseLowpass::butterworth(smoothing.order, smoothing.cutoff)?;
            db = filter.filtfilt(&db);
        }

        let peak = StatsHelper::argmax(&db).ok_or_else(|| {
            MeasureError::DegenerateWaveform("spectrum has no comparable bins".into())
        })?;

        let mut lower = peak;
        while lower > 0 && db[lower] > cutoff_db {
            lower -= 1;
        }
        let last = db.len() - 1;
        let mut upper = peak;
        while upper < last && db[upper] > cutoff_db {
            upper += 1;
        }

        let freq = spec.frequency();
        Ok(Band {
            lower_hz: freq[lower],
            upper_hz: freq[upper],
            peak_hz: freq[peak],
            bandwidth_hz: freq[upper] - freq[lower],
        })
    }
}
