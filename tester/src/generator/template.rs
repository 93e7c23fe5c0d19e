use std::f64::consts::PI;

/// Gaussian-enveloped tone burst scaled to `vpp` peak-to-peak.
///
/// The envelope width is chosen so the -6 dB spectral band is `bandwidth_hz`
/// wide around `center_hz`.
pub fn tone_burst(
    samples: usize,
    sample_interval_s: f64,
    delay_s: f64,
    center_hz: f64,
    bandwidth_hz: f64,
    vpp: f64,
) -> Vec<f64> {
    let half_width = (2.0 * 10f64.powf(6.0 / 20.0).ln()).sqrt();
    let sigma = half_width / (PI * bandwidth_hz);
    let unit: Vec<f64> = (0..samples)
        .map(|i| {
            let t = i as f64 * sample_interval_s - delay_s;
            (-t * t / (2.0 * sigma * sigma)).exp() * (2.0 * PI * center_hz * t).cos()
        })
        .collect();

    let (lo, hi) = unit
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    if !(span > 0.0) {
        return unit;
    }
    unit.into_iter().map(|v| v * vpp / span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_has_requested_peak_to_peak() {
        let burst = tone_burst(8000, 1.0e-9, 2.0e-6, 6.0e6, 2.0e6, 0.15);
        let hi = burst.iter().cloned().fold(f64::MIN, f64::max);
        let lo = burst.iter().cloned().fold(f64::MAX, f64::min);
        assert!((hi - lo - 0.15).abs() < 1e-12);
        assert!((burst[2000] - hi).abs() < 1e-12);
    }

    #[test]
    fn empty_burst_is_empty() {
        assert!(tone_burst(0, 1.0e-9, 0.0, 6.0e6, 2.0e6, 0.15).is_empty());
    }
}
