//! Zero-phase Butterworth low-pass used to smooth dB spectra before band-edge search.
//!
//! The design is a cascade of bilinear-transformed second-order sections
//! (plus one first-order section for odd orders). `filtfilt` runs the cascade
//! forward and backward over an odd-reflected extension of the input, so the
//! output has no group delay and the edges settle quickly.

use std::f64::consts::PI;

use crate::prelude::{MeasureError, MeasureResult};

const MAX_ORDER: usize = 12;

/// Direct Form II transposed section, `a0` normalized to 1.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Runs the section over `data`, starting from the steady state for `data[0]`.
    fn run(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };
        let settled = first * self.dc_gain();
        let mut s1 = settled - self.b[0] * first;
        let mut s2 = self.b[2] * first - self.a[1] * settled;

        for sample in data.iter_mut() {
            let x = *sample;
            let y = self.b[0] * x + s1;
            s1 = self.b[1] * x - self.a[0] * y + s2;
            s2 = self.b[2] * x - self.a[1] * y;
            *sample = y;
        }
    }
}

/// Butterworth low-pass applied forward and backward.
#[derive(Debug, Clone)]
pub struct ZeroPhaseLowpass {
    sections: Vec<Biquad>,
    order: usize,
}

impl ZeroPhaseLowpass {
    /// `cutoff` is normalized to Nyquist and must lie strictly between 0 and 1.
    pub fn butterworth(order: usize, cutoff: f64) -> MeasureResult<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(MeasureError::InvalidConfig(format!(
                "smoothing order {} outside 1..={}",
                order, MAX_ORDER
            )));
        }
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(MeasureError::InvalidConfig(format!(
                "smoothing cutoff {} must be inside (0, 1)",
                cutoff
            )));
        }

        // Pre-warped analog cutoff for the bilinear transform s = (z - 1) / (z + 1).
        let wc = (PI * cutoff / 2.0).tan();
        let wc2 = wc * wc;
        let mut sections = Vec::with_capacity(order / 2 + 1);

        for k in 0..order / 2 {
            let angle = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            let damping = 2.0 * angle.sin() * wc;
            let a0 = 1.0 + damping + wc2;
            sections.push(Biquad {
                b: [wc2 / a0, 2.0 * wc2 / a0, wc2 / a0],
                a: [(2.0 * wc2 - 2.0) / a0, (1.0 - damping + wc2) / a0],
            });
        }

        if order % 2 == 1 {
            let a0 = 1.0 + wc;
            sections.push(Biquad {
                b: [wc / a0, wc / a0, 0.0],
                a: [(wc - 1.0) / a0, 0.0],
            });
        }

        Ok(Self { sections, order })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn run_cascade(&self, data: &mut [f64]) {
        for section in &self.sections {
            section.run(data);
        }
    }

    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n < 2 {
            return data.to_vec();
        }

        let pad = (3 * (self.order + 1)).min(n - 1);
        let mut extended = Vec::with_capacity(n + 2 * pad);
        let (head, tail) = (data[0], data[n - 1]);
        extended.extend((1..=pad).rev().map(|i| 2.0 * head - data[i]));
        extended.extend_from_slice(data);
        extended.extend((1..=pad).map(|i| 2.0 * tail - data[n - 1 - i]));

        self.run_cascade(&mut extended);
        extended.reverse();
        self.run_cascade(&mut extended);
        extended.reverse();

        extended[pad..pad + n].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_domain_parameters() {
        assert!(ZeroPhaseLowpass::butterworth(0, 0.2).is_err());
        assert!(ZeroPhaseLowpass::butterworth(2, 0.0).is_err());
        assert!(ZeroPhaseLowpass::butterworth(2, 1.0).is_err());
    }

    #[test]
    fn sections_have_unity_dc_gain() {
        for order in 1..=6 {
            let filter = ZeroPhaseLowpass::butterworth(order, 0.3).unwrap();
            for section in &filter.sections {
                assert!((section.dc_gain() - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn constant_input_passes_unchanged() {
        let filter = ZeroPhaseLowpass::butterworth(3, 0.2).unwrap();
        let output = filter.filtfilt(&[-12.0; 40]);
        assert!(output.iter().all(|v| (v + 12.0).abs() < 1e-9));
    }

    #[test]
    fn linear_ramp_is_preserved() {
        let ramp: Vec<f64> = (0..60).map(|i| i as f64 * 0.5).collect();
        let filter = ZeroPhaseLowpass::butterworth(2, 0.25).unwrap();
        let output = filter.filtfilt(&ramp);
        for i in 20..40 {
            assert!((ramp[i] - output[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn isolated_spike_is_attenuated() {
        let mut data = vec![0.0; 81];
        data[40] = -10.0;
        let filter = ZeroPhaseLowpass::butterworth(2, 0.1).unwrap();
        let output = filter.filtfilt(&data);
        assert!(output[40] > -3.0);
        assert!(output[40] < 0.0);
    }
}
