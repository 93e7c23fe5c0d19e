use crate::bench_interface::{Spectrum, Waveform};
use crate::prelude::{MeasureError, MeasureResult};

/// Converts an axis offset and width into a checked `[start, end)` sample range.
fn index_range(
    origin: f64,
    step: f64,
    start: f64,
    width: f64,
    available: usize,
) -> MeasureResult<(usize, usize)> {
    let first = ((start - origin) / step).round();
    let count = (width / step).round();
    if !first.is_finite() || !count.is_finite() {
        return Err(MeasureError::WindowOutOfRange {
            start: 0,
            end: 0,
            available,
        });
    }

    let first = first as i64;
    let end = first + count as i64;
    if first < 0 || count < 0.0 || end > available as i64 {
        return Err(MeasureError::WindowOutOfRange {
            start: first,
            end,
            available,
        });
    }
    Ok((first as usize, end as usize))
}

/// Extracts sub-ranges of acquisitions without touching the originals.
pub struct WaveformWindow;

impl WaveformWindow {
    pub fn by_time(
        wave: &Waveform,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> MeasureResult<Waveform> {
        let interval = wave.sample_interval()?;
        let (start, end) = index_range(
            wave.time()[0],
            interval,
            start_seconds,
            duration_seconds,
            wave.len(),
        )?;
        Ok(wave.slice(start, end))
    }

    pub fn by_frequency(spec: &Spectrum, start_hz: f64, width_hz: f64) -> MeasureResult<Spectrum> {
        let bin = spec.bin_width()?;
        let (start, end) = index_range(spec.frequency()[0], bin, start_hz, width_hz, spec.len())?;
        Ok(spec.slice(start, end))
    }
}
